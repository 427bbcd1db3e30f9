//! Persistence port.
//!
//! The engine reads project and build records and flips exactly two flags:
//! `Project::is_ready` around synchronization and `Build::is_done` when the
//! stage sequence ends. Everything goes through [`ProjectStore`]; there is no
//! ambient database handle.

mod file;

pub use file::FileStore;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::model::{Build, Project};

pub trait ProjectStore: Send + Sync {
    fn load_project(&self, project_id: u64) -> Result<Project>;

    fn load_build(&self, build_id: u64) -> Result<Build>;

    fn set_project_ready(&self, project_id: u64, ready: bool) -> Result<()>;

    fn set_build_done(&self, build_id: u64) -> Result<()>;
}

/// In-process store, used by tests and by embedders that keep records
/// elsewhere and only need the flag updates.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: Mutex<HashMap<u64, Project>>,
    builds: Mutex<HashMap<u64, Build>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&self, project: Project) -> Result<()> {
        lock(&self.projects)?.insert(project.id, project);
        Ok(())
    }

    pub fn insert_build(&self, build: Build) -> Result<()> {
        lock(&self.builds)?.insert(build.id, build);
        Ok(())
    }
}

impl ProjectStore for MemoryStore {
    fn load_project(&self, project_id: u64) -> Result<Project> {
        lock(&self.projects)?
            .get(&project_id)
            .cloned()
            .ok_or_else(|| anyhow!("project {project_id} not found"))
    }

    fn load_build(&self, build_id: u64) -> Result<Build> {
        lock(&self.builds)?
            .get(&build_id)
            .cloned()
            .ok_or_else(|| anyhow!("build {build_id} not found"))
    }

    fn set_project_ready(&self, project_id: u64, ready: bool) -> Result<()> {
        let mut projects = lock(&self.projects)?;
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| anyhow!("project {project_id} not found"))?;
        project.is_ready = ready;
        Ok(())
    }

    fn set_build_done(&self, build_id: u64) -> Result<()> {
        let mut builds = lock(&self.builds)?;
        let build = builds
            .get_mut(&build_id)
            .ok_or_else(|| anyhow!("build {build_id} not found"))?;
        build.is_done = true;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow!("record store lock poisoned"))
}
