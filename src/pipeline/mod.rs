//! The bake: a fixed sequence of stages turning an incoming working copy
//! into distributable fonts.
//!
//! ```text
//! git checkout <revision>
//! ### Bake Begins!
//!   1 copy & rename sources    sources.rs
//!   2 hint                     hint.rs
//!   3 compact                  compact.rs
//!   4 subset                   subset.rs
//!   5 generate metadata        metadata.rs
//!   6 coverage                 coverage.rs
//!   7 result tests             checks.rs
//!   8 result fixes             checks.rs
//! ### Bake Succeeded!
//! ```
//!
//! The first failing stage aborts the rest. Whatever happens after the
//! setup gate, the build is marked done before the error reaches the
//! caller: "done" means the bake ran, and only the log says whether it
//! succeeded.

mod checks;
mod compact;
mod coverage;
#[cfg(test)]
mod fixture;
mod hint;
mod metadata;
mod sources;
mod subset;

pub use checks::discover_dashboard;
pub use sources::canonical_license_name;
pub use subset::strip_latin_suffix;

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::Checker;
use crate::config::{EngineConfig, Tool};
use crate::layout::{BuildLayout, ProjectLayout};
use crate::log::BuildLog;
use crate::model::{Build, Project};
use crate::process::{self, CommandError, ToolCommand};
use crate::store::ProjectStore;
use crate::sync::sync_project;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    CopySources = 1,
    Hint = 2,
    Compact = 3,
    Subset = 4,
    Metadata = 5,
    Coverage = 6,
    ResultTests = 7,
    ResultFixes = 8,
}

impl Stage {
    pub const ORDER: &'static [Stage] = &[
        Stage::CopySources,
        Stage::Hint,
        Stage::Compact,
        Stage::Subset,
        Stage::Metadata,
        Stage::Coverage,
        Stage::ResultTests,
        Stage::ResultFixes,
    ];

    fn run(self, ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
        match self {
            Stage::CopySources => sources::run(ctx, log),
            Stage::Hint => hint::run(ctx, log),
            Stage::Compact => compact::run(ctx, log),
            Stage::Subset => subset::run(ctx, log),
            Stage::Metadata => metadata::run(ctx, log),
            Stage::Coverage => coverage::run(ctx, log),
            Stage::ResultTests => checks::run_tests(ctx, log),
            Stage::ResultFixes => checks::run_fixes(ctx, log),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CopySources => "copy-sources",
            Stage::Hint => "hint",
            Stage::Compact => "compact",
            Stage::Subset => "subset",
            Stage::Metadata => "metadata",
            Stage::Coverage => "coverage",
            Stage::ResultTests => "result-tests",
            Stage::ResultFixes => "result-fixes",
        };
        f.write_str(name)
    }
}

/// How a [`run_pipeline`] call ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The project has not finished its initial setup; nothing ran.
    Skipped,
    /// Every stage ran.
    Completed,
}

/// Everything a stage needs besides the log.
pub struct StageContext<'a> {
    pub config: &'a EngineConfig,
    pub checker: &'a dyn Checker,
    pub project: &'a Project,
    pub build: &'a Build,
    /// Shared working copy; read-only for stages.
    pub incoming: PathBuf,
    pub dirs: BuildLayout,
}

impl StageContext<'_> {
    fn tool(&self, tool: Tool) -> Result<ToolCommand> {
        self.config.tool(tool)
    }

    fn outgoing(&self) -> &Path {
        &self.dirs.outgoing
    }

    fn sources(&self) -> &Path {
        &self.dirs.sources
    }
}

/// Bake `build` of `project`.
///
/// With `force_sync` the working copy is synchronized first. Projects whose
/// setup is not finished are left untouched.
pub fn run_pipeline(
    store: &dyn ProjectStore,
    config: &EngineConfig,
    checker: &dyn Checker,
    project: &Project,
    build: &Build,
    force_sync: bool,
) -> Result<PipelineOutcome> {
    if force_sync {
        sync_project(store, config, project)
            .with_context(|| format!("synchronizing project {} before bake", project.id))?;
    }

    if !project.config.local.setup {
        info!(
            project = project.id,
            build = build.id,
            "project setup not finished, skipping bake"
        );
        return Ok(PipelineOutcome::Skipped);
    }

    let result = bake(config, checker, project, build);
    let done = mark_build_done(store, build);

    match &result {
        Ok(()) => info!(build = build.id, "bake succeeded"),
        Err(err) => warn!(build = build.id, "bake failed: {err:#}"),
    }
    result?;
    done?;
    Ok(PipelineOutcome::Completed)
}

/// Mark `build` done without running it.
pub fn mark_build_done(store: &dyn ProjectStore, build: &Build) -> Result<()> {
    store
        .set_build_done(build.id)
        .with_context(|| format!("marking build {} done", build.id))
}

fn bake(
    config: &EngineConfig,
    checker: &dyn Checker,
    project: &Project,
    build: &Build,
) -> Result<()> {
    let layout = ProjectLayout::new(&config.data_root, project)?;
    let dirs = layout.build(build)?;
    dirs.recreate()?;
    let mut log = BuildLog::create(&dirs.log)?;

    let ctx = StageContext {
        config,
        checker,
        project,
        build,
        incoming: layout.incoming(),
        dirs,
    };
    let result = run_stages(&ctx, &mut log);

    if let Err(err) = &result {
        // Command failures already wrote their own `Fatal:` line.
        if !err.chain().any(|cause| cause.is::<CommandError>()) {
            if let Err(log_err) = log.write(&format!("Fatal: {err:#}\n")) {
                warn!(build = build.id, "could not record failure in build log: {log_err}");
            }
        }
    }
    let closed = log.close();
    result?;
    closed?;
    Ok(())
}

fn run_stages(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    let checkout = ctx
        .tool(Tool::Git)?
        .arg("checkout")
        .arg(&ctx.build.revision);
    process::run(&checkout, &ctx.incoming, log)
        .with_context(|| format!("checking out revision {}", ctx.build.revision))?;

    log.section("Bake Begins!")?;
    for stage in Stage::ORDER {
        debug!(build = ctx.build.id, %stage, "running stage");
        stage
            .run(ctx, log)
            .with_context(|| format!("stage {stage} failed"))?;
    }
    log.section("Bake Succeeded!")?;
    Ok(())
}

/// Write a line describing a filesystem step taken by the engine itself.
fn note(log: &mut BuildLog, text: &str) -> Result<()> {
    log.write(&format!("{text}\n"))?;
    Ok(())
}
