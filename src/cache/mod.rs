//! Result cache for upstream and result tests.
//!
//! A cached report is a YAML mapping from unit key (a path or a fixed
//! label) to whatever the checker reported for that unit. A report is
//! computed once per key: if the file exists it is returned as stored,
//! with no staleness check. Changing sources without changing the
//! revision therefore serves the old report.

mod checker;

pub use checker::{failure, Checker, TestSuite, ToolChecker};

use anyhow::{bail, Context, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{EngineConfig, Tool};
use crate::fsutil::{file_name, files_with_suffix, write_atomic};
use crate::layout::ProjectLayout;
use crate::model::{Build, Project};
use crate::process::capture;

/// Key of the bulk entry in an upstream report.
pub const BULK_KEY: &str = "Properties tests";

/// Unit key to checker report.
pub type TestResults = BTreeMap<String, Value>;

/// Identity of a cached report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// Tests of the upstream tree at a revision.
    Upstream { revision: String },
    /// Tests of one build's outgoing binaries.
    Result { build_id: u64, revision: String },
}

/// Reports of one project, stored beside its outgoing directories.
#[derive(Debug, Clone)]
pub struct ResultCache {
    layout: ProjectLayout,
}

impl ResultCache {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self, key: &CacheKey) -> Result<PathBuf> {
        match key {
            CacheKey::Upstream { revision } => self.layout.upstream_cache(revision),
            CacheKey::Result { build_id, revision } => {
                self.layout.result_cache(*build_id, revision)
            }
        }
    }

    /// Return the stored report for `key`, or compute, store and reload it.
    ///
    /// The returned value is always what was read back from disk.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<TestResults>
    where
        F: FnOnce() -> Result<TestResults>,
    {
        let path = self.path(key)?;
        if path.exists() {
            debug!(path = %path.display(), "test cache hit");
            return load(&path);
        }
        debug!(path = %path.display(), "test cache miss");

        let results = compute()?;
        let yaml = serde_yaml::to_string(&results).context("serializing test results")?;
        write_atomic(&path, yaml.as_bytes())
            .with_context(|| format!("storing test results '{}'", path.display()))?;
        load(&path)
    }
}

fn load(path: &Path) -> Result<TestResults> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading test results '{}'", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("parsing test results '{}'", path.display()))
}

/// One checker invocation: report key, suite and target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUnit {
    pub key: String,
    pub suite: TestSuite,
    pub target: PathBuf,
}

/// Units of the upstream tree: every `.ufo` directory, every
/// `METADATA.json`, every `.ttx` file, then the whole tree.
///
/// Keys are paths relative to `incoming`; `.git` is not descended into.
pub fn upstream_units(incoming: &Path) -> Result<Vec<TestUnit>> {
    let mut ufo = Vec::new();
    let mut metadata = Vec::new();
    let mut ttx = Vec::new();

    let walker = WalkDir::new(incoming)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry =
            entry.with_context(|| format!("walking upstream tree '{}'", incoming.display()))?;
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let key = entry
            .path()
            .strip_prefix(incoming)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let unit = |suite| TestUnit {
            key: key.clone(),
            suite,
            target: entry.path().to_path_buf(),
        };

        if entry.file_type().is_dir() {
            if name.ends_with(".ufo") {
                ufo.push(unit(TestSuite::Upstream));
            }
        } else if name == "metadata.json" {
            metadata.push(unit(TestSuite::Metadata));
        } else if name.ends_with(".ttx") {
            ttx.push(unit(TestSuite::UpstreamTtx));
        }
    }

    let mut units = ufo;
    units.extend(metadata);
    units.extend(ttx);
    units.push(TestUnit {
        key: BULK_KEY.to_string(),
        suite: TestSuite::UpstreamBulk,
        target: incoming.to_path_buf(),
    });
    Ok(units)
}

/// Every `.ttf` directly inside a build's outgoing directory.
pub fn result_units(outgoing: &Path) -> Result<Vec<TestUnit>> {
    Ok(files_with_suffix(outgoing, ".ttf")?
        .into_iter()
        .map(|target| TestUnit {
            key: file_name(&target),
            suite: TestSuite::Result,
            target,
        })
        .collect())
}

fn run_units(checker: &dyn Checker, units: &[TestUnit]) -> TestResults {
    units
        .iter()
        .map(|unit| {
            debug!(unit = %unit.key, suite = unit.suite.as_str(), "running checks");
            (unit.key.clone(), checker.check(unit.suite, &unit.target))
        })
        .collect()
}

/// Tests of the upstream tree at `revision`.
///
/// On a cache miss this checks `revision` out in the shared incoming
/// directory; callers must serialize it with syncs of the same project.
pub fn upstream_revision_tests(
    config: &EngineConfig,
    checker: &dyn Checker,
    project: &Project,
    revision: &str,
) -> Result<TestResults> {
    let layout = ProjectLayout::new(&config.data_root, project)?;
    let incoming = layout.incoming();
    let cache = ResultCache::new(layout);
    let key = CacheKey::Upstream {
        revision: revision.to_string(),
    };

    cache.get_or_compute(&key, || {
        if !incoming.is_dir() {
            bail!(
                "project {} has no incoming directory at {}; sync it first",
                project.id,
                incoming.display()
            );
        }
        let checkout = capture(
            &config.tool(Tool::Git)?.arg("checkout").arg(revision),
            &incoming,
        );
        if !checkout.success() {
            bail!(
                "git checkout {revision} failed in {}:\n{}",
                incoming.display(),
                checkout.combined.trim_end()
            );
        }

        let units = upstream_units(&incoming)?;
        info!(project = project.id, revision, units = units.len(), "running upstream tests");
        Ok(run_units(checker, &units))
    })
}

/// Tests of the binaries a build produced.
pub fn result_tests(
    config: &EngineConfig,
    checker: &dyn Checker,
    project: &Project,
    build: &Build,
) -> Result<TestResults> {
    let layout = ProjectLayout::new(&config.data_root, project)?;
    let outgoing = layout.build(build)?.outgoing;
    let cache = ResultCache::new(layout);
    let key = CacheKey::Result {
        build_id: build.id,
        revision: build.revision.clone(),
    };

    cache.get_or_compute(&key, || {
        let units = result_units(&outgoing)?;
        info!(build = build.id, units = units.len(), "running result tests");
        Ok(run_units(checker, &units))
    })
}
