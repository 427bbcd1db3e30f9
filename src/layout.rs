//! Working-directory layout under the data root.
//!
//! ```text
//! {root}/{login}/{id}.in/                              incoming clone (shared)
//! {root}/{login}/{id}.out/{build}.{rev}/               outgoing (per build)
//! {root}/{login}/{id}.out/{build}.{rev}/sources/       intermediate artifacts
//! {root}/{login}/{id}.out/{build}.{rev}.process.log    build log
//! {root}/{login}/{id}.out/{build}.{rev}.rtests.yaml    result test cache
//! {root}/{login}/{id}.out/utests/{rev}.yaml            upstream test cache
//! {root}/{login}/{id}.bakery.yaml                      dashboard data
//! {root}/{login}/{id}.lock                             per-project lock
//! ```

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};

use crate::model::{Build, Project};

pub const SOURCES_DIR: &str = "sources";
pub const UPSTREAM_TESTS_DIR: &str = "utests";

/// Directories shared by every build of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    account_dir: PathBuf,
    project_id: u64,
}

impl ProjectLayout {
    pub fn new(data_root: &Path, project: &Project) -> Result<Self> {
        validate_segment(&project.login, "account login")?;
        Ok(Self {
            account_dir: data_root.join(&project.login),
            project_id: project.id,
        })
    }

    /// Synchronized clone of the upstream repository.
    pub fn incoming(&self) -> PathBuf {
        self.account_dir.join(format!("{}.in", self.project_id))
    }

    pub fn outgoing_root(&self) -> PathBuf {
        self.account_dir.join(format!("{}.out", self.project_id))
    }

    pub fn upstream_tests_dir(&self) -> PathBuf {
        self.outgoing_root().join(UPSTREAM_TESTS_DIR)
    }

    /// Cache file for upstream tests at `revision`.
    pub fn upstream_cache(&self, revision: &str) -> Result<PathBuf> {
        validate_segment(revision, "revision")?;
        Ok(self.upstream_tests_dir().join(format!("{revision}.yaml")))
    }

    pub fn dashboard_yaml(&self) -> PathBuf {
        self.account_dir
            .join(format!("{}.bakery.yaml", self.project_id))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.account_dir.join(format!("{}.lock", self.project_id))
    }

    /// Cache file for result tests of build `build_id` at `revision`.
    pub fn result_cache(&self, build_id: u64, revision: &str) -> Result<PathBuf> {
        validate_segment(revision, "revision")?;
        Ok(self
            .outgoing_root()
            .join(format!("{build_id}.{revision}.rtests.yaml")))
    }

    pub fn build(&self, build: &Build) -> Result<BuildLayout> {
        let result_cache = self.result_cache(build.id, &build.revision)?;
        let stem = format!("{}.{}", build.id, build.revision);
        let out_root = self.outgoing_root();
        let outgoing = out_root.join(&stem);
        Ok(BuildLayout {
            sources: outgoing.join(SOURCES_DIR),
            log: out_root.join(format!("{stem}.process.log")),
            result_cache,
            outgoing,
        })
    }
}

/// Directories and files owned by one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub outgoing: PathBuf,
    pub sources: PathBuf,
    pub log: PathBuf,
    pub result_cache: PathBuf,
}

impl BuildLayout {
    /// Remove any previous output for this build and create empty
    /// outgoing and sources directories.
    pub fn recreate(&self) -> Result<()> {
        if self.outgoing.exists() {
            fs::remove_dir_all(&self.outgoing).with_context(|| {
                format!(
                    "removing previous build output '{}'",
                    self.outgoing.display()
                )
            })?;
        }
        fs::create_dir_all(&self.sources)
            .with_context(|| format!("creating sources directory '{}'", self.sources.display()))
    }
}

/// Join a project-supplied relative path onto `base`, refusing absolute
/// paths and `..` traversal.
pub fn join_relative(base: &Path, raw: &str) -> Result<PathBuf> {
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        bail!("project path must be relative, got absolute path '{}'", raw);
    }
    for component in candidate.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            bail!("project path contains invalid traversal in '{}'", raw);
        }
    }
    Ok(base.join(candidate))
}

fn validate_segment(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{what} must not be empty");
    }
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        bail!("{what} must be a safe filename segment: {value}");
    }
    Ok(())
}

/// Exclusive lock over one project's incoming directory.
///
/// The engine never takes this itself; schedulers hold it around sync,
/// bake and upstream-test operations of the same project.
#[derive(Debug)]
pub struct ProjectLock {
    _file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Try to take the lock without blocking.
    pub fn acquire(layout: &ProjectLayout) -> Result<Self> {
        let path = layout.lock_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating lock directory '{}'", parent.display()))?;
        }
        // Never unlink the lock file: a second process could then lock a
        // fresh inode at the same path.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening project lock '{}'", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            bail!(
                "project is busy: another sync, bake or test run holds {}",
                path.display()
            );
        }
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectConfig, SourceFormat};
    use tempfile::TempDir;

    fn project(login: &str) -> Project {
        Project {
            id: 42,
            login: login.into(),
            clone: "https://example.com/font.git".into(),
            source_format: SourceFormat::Ufo,
            is_ready: true,
            config: ProjectConfig::default(),
        }
    }

    fn build(revision: &str) -> Build {
        Build {
            id: 3,
            project_id: 42,
            revision: revision.into(),
            is_done: false,
        }
    }

    #[test]
    fn test_paths_follow_layout() {
        let layout = ProjectLayout::new(Path::new("/data"), &project("alice")).unwrap();
        assert_eq!(layout.incoming(), PathBuf::from("/data/alice/42.in"));
        assert_eq!(
            layout.upstream_cache("abc123").unwrap(),
            PathBuf::from("/data/alice/42.out/utests/abc123.yaml")
        );
        assert_eq!(
            layout.dashboard_yaml(),
            PathBuf::from("/data/alice/42.bakery.yaml")
        );

        let b = layout.build(&build("abc123")).unwrap();
        assert_eq!(b.outgoing, PathBuf::from("/data/alice/42.out/3.abc123"));
        assert_eq!(
            b.sources,
            PathBuf::from("/data/alice/42.out/3.abc123/sources")
        );
        assert_eq!(
            b.log,
            PathBuf::from("/data/alice/42.out/3.abc123.process.log")
        );
        assert_eq!(
            b.result_cache,
            PathBuf::from("/data/alice/42.out/3.abc123.rtests.yaml")
        );
    }

    #[test]
    fn test_rejects_unsafe_segments() {
        assert!(ProjectLayout::new(Path::new("/data"), &project("../etc")).is_err());
        let layout = ProjectLayout::new(Path::new("/data"), &project("alice")).unwrap();
        assert!(layout.build(&build("../../x")).is_err());
        assert!(layout.upstream_cache("").is_err());
    }

    #[test]
    fn test_join_relative_rejects_traversal() {
        let base = Path::new("/data/alice/42.in");
        assert!(join_relative(base, "../etc/passwd").is_err());
        assert!(join_relative(base, "/etc/passwd").is_err());
        assert_eq!(
            join_relative(base, "src/Test.ufo").unwrap(),
            base.join("src/Test.ufo")
        );
    }

    #[test]
    fn test_recreate_clears_previous_output() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), &project("alice")).unwrap();
        let b = layout.build(&build("abc")).unwrap();
        fs::create_dir_all(&b.outgoing).unwrap();
        fs::write(b.outgoing.join("stale.ttf"), "old").unwrap();

        b.recreate().unwrap();

        assert!(b.sources.is_dir());
        assert!(!b.outgoing.join("stale.ttf").exists());
    }

    #[test]
    fn test_project_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), &project("alice")).unwrap();

        let lock = ProjectLock::acquire(&layout).unwrap();
        assert!(lock.path().exists());
        assert!(ProjectLock::acquire(&layout).is_err());

        drop(lock);
        assert!(ProjectLock::acquire(&layout).is_ok());
    }
}
