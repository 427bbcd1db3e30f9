//! Fixtures shared by unit tests: stand-in tool scripts and records.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::cache::{Checker, TestSuite};
use crate::model::{Build, Project, ProjectConfig, SourceFormat};

/// Write an executable `sh` script named `name` into `dir`.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A script that appends its arguments to `record` and runs `body`.
pub fn recording_script(dir: &Path, name: &str, record: &Path, body: &str) -> PathBuf {
    script(
        dir,
        name,
        &format!("echo \"$@\" >> '{}'\n{body}", record.display()),
    )
}

pub fn project(format: SourceFormat, clone: &str) -> Project {
    Project {
        id: 42,
        login: "alice".into(),
        clone: clone.into(),
        source_format: format,
        is_ready: false,
        config: ProjectConfig::default(),
    }
}

pub fn build(revision: &str) -> Build {
    Build {
        id: 7,
        project_id: 42,
        revision: revision.into(),
        is_done: false,
    }
}

/// Checker that reports nothing for every unit.
pub struct NoChecks;

impl Checker for NoChecks {
    fn check(&self, _suite: TestSuite, _target: &Path) -> Value {
        Value::Null
    }
}
