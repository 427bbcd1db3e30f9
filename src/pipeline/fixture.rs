//! Harness for running one stage against a scratch data root.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::StageContext;
use crate::config::{EngineConfig, Tool};
use crate::layout::{BuildLayout, ProjectLayout};
use crate::log::BuildLog;
use crate::model::{Build, Project, SourceFormat};
use crate::testutil::{build, project, recording_script, NoChecks};

pub struct StageFixture {
    pub temp: TempDir,
    pub config: EngineConfig,
    pub project: Project,
    pub build: Build,
    pub dirs: BuildLayout,
}

impl StageFixture {
    /// Fresh data root with empty outgoing and sources directories.
    pub fn new(format: SourceFormat) -> Self {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::new(temp.path().join("data"));
        let project = project(format, "https://example.com/font.git");
        let build = build("abc");
        let dirs = ProjectLayout::new(&config.data_root, &project)
            .unwrap()
            .build(&build)
            .unwrap();
        dirs.recreate().unwrap();
        Self {
            temp,
            config,
            project,
            build,
            dirs,
        }
    }

    pub fn incoming(&self) -> PathBuf {
        ProjectLayout::new(&self.config.data_root, &self.project)
            .unwrap()
            .incoming()
    }

    /// Replace `tool`'s command with a script that records its arguments
    /// to `<key>.calls` and then runs `body`. Returns the record path.
    pub fn fake_tool(&mut self, tool: Tool, body: &str) -> PathBuf {
        let record = self.temp.path().join(format!("{}.calls", tool.key()));
        let script = recording_script(&self.temp.path().join("bin"), tool.key(), &record, body);
        self.config
            .tools
            .set(tool, vec![script.to_string_lossy().into_owned()]);
        record
    }

    pub fn write_outgoing(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dirs.outgoing.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Run `stage` with a fresh log; returns the stage result and the log.
    pub fn run(
        &self,
        stage: fn(&StageContext<'_>, &mut BuildLog) -> Result<()>,
    ) -> (Result<()>, String) {
        let mut log = BuildLog::create(&self.dirs.log).unwrap();
        let ctx = StageContext {
            config: &self.config,
            checker: &NoChecks,
            project: &self.project,
            build: &self.build,
            incoming: self.incoming(),
            dirs: self.dirs.clone(),
        };
        let result = stage(&ctx, &mut log);
        log.close().unwrap();
        (result, fs::read_to_string(&self.dirs.log).unwrap())
    }
}

pub fn has_file(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file()
}

pub fn calls(record: &Path) -> Vec<String> {
    fs::read_to_string(record)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
