use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::ProjectStore;
use crate::fsutil::write_atomic;
use crate::model::{Build, Project};

const RECORDS_DIR: &str = ".records";

/// JSON records under `{data_root}/.records/{projects,builds}/{id}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(data_root: &Path) -> Result<Self> {
        let root = data_root.join(RECORDS_DIR);
        fs::create_dir_all(root.join("projects"))
            .with_context(|| format!("creating record store '{}'", root.display()))?;
        fs::create_dir_all(root.join("builds"))
            .with_context(|| format!("creating record store '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn put_project(&self, project: &Project) -> Result<()> {
        write_json_atomic(&self.project_path(project.id), project)
    }

    pub fn put_build(&self, build: &Build) -> Result<()> {
        write_json_atomic(&self.build_path(build.id), build)
    }

    fn project_path(&self, id: u64) -> PathBuf {
        self.root.join("projects").join(format!("{id}.json"))
    }

    fn build_path(&self, id: u64) -> PathBuf {
        self.root.join("builds").join(format!("{id}.json"))
    }
}

impl ProjectStore for FileStore {
    fn load_project(&self, project_id: u64) -> Result<Project> {
        read_json(&self.project_path(project_id))
            .with_context(|| format!("loading project {project_id}"))
    }

    fn load_build(&self, build_id: u64) -> Result<Build> {
        read_json(&self.build_path(build_id)).with_context(|| format!("loading build {build_id}"))
    }

    fn set_project_ready(&self, project_id: u64, ready: bool) -> Result<()> {
        let mut project = self.load_project(project_id)?;
        project.is_ready = ready;
        self.put_project(&project)
    }

    fn set_build_done(&self, build_id: u64) -> Result<()> {
        let mut build = self.load_build(build_id)?;
        build.is_done = true;
        self.put_build(&build)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading record '{}'", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing record '{}'", path.display()))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec_pretty(value).context("serializing record")?;
    write_atomic(path, &payload)
}
