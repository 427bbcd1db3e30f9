//! Shared fixtures: a scratch data root with stand-in tool scripts.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use font_bakery::config::{EngineConfig, Tool};
use font_bakery::layout::ProjectLayout;
use font_bakery::model::{Build, Project, ProjectConfig, SourceFormat};
use font_bakery::store::MemoryStore;
use tempfile::TempDir;

pub const PROJECT_ID: u64 = 42;
pub const BUILD_ID: u64 = 7;
pub const REVISION: &str = "abc123";

pub struct Bakery {
    pub temp: TempDir,
    pub config: EngineConfig,
    pub store: MemoryStore,
    pub project: Project,
    pub build: Build,
}

impl Bakery {
    /// A set-up UFO project whose tools all succeed without doing anything.
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = EngineConfig::new(temp.path().join("data"));
        for tool in Tool::ALL {
            let script = write_script(&temp.path().join("bin"), tool.key(), "exit 0");
            config
                .tools
                .set(*tool, vec![script.to_string_lossy().into_owned()]);
        }

        let mut project_config = ProjectConfig::default();
        project_config.local.setup = true;
        let project = Project {
            id: PROJECT_ID,
            login: "alice".into(),
            clone: "https://example.com/alice/font.git".into(),
            source_format: SourceFormat::Ufo,
            is_ready: true,
            config: project_config,
        };
        let build = Build {
            id: BUILD_ID,
            project_id: PROJECT_ID,
            revision: REVISION.into(),
            is_done: false,
        };

        Self {
            temp,
            config,
            store: MemoryStore::new(),
            project,
            build,
        }
    }

    /// Install `body` as the script behind `tool`.
    pub fn tool(&mut self, tool: Tool, body: &str) {
        let script = write_script(&self.temp.path().join("bin"), tool.key(), body);
        self.config
            .tools
            .set(tool, vec![script.to_string_lossy().into_owned()]);
    }

    /// Register the records in the store and return the layout.
    pub fn register(&self) -> ProjectLayout {
        self.store.insert_project(self.project.clone()).unwrap();
        self.store.insert_build(self.build.clone()).unwrap();
        ProjectLayout::new(&self.config.data_root, &self.project).unwrap()
    }

    /// Write an upstream UFO with the given names into the incoming tree.
    pub fn upstream_ufo(&self, relative: &str, family: &str, style: &str) -> PathBuf {
        let ufo = self.incoming().join(relative);
        fs::create_dir_all(ufo.join("glyphs")).unwrap();
        fs::write(
            ufo.join("fontinfo.plist"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>familyName</key>
  <string>{family}</string>
  <key>styleName</key>
  <string>{style}</string>
</dict>
</plist>
"#
            ),
        )
        .unwrap();
        ufo
    }

    pub fn incoming(&self) -> PathBuf {
        ProjectLayout::new(&self.config.data_root, &self.project)
            .unwrap()
            .incoming()
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Byte offset of `needle` in `haystack`, panicking with the log if absent.
pub fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("'{needle}' not found in:\n{haystack}"))
}
