//! Working-copy synchronizer.
//!
//! Reconciles a project's incoming directory with its upstream repository:
//!
//! | State          | Action                                                  |
//! |----------------|---------------------------------------------------------|
//! | missing        | create the directory, then clone                        |
//! | existing git   | `reset --hard`, `clean --force`, `pull origin master`   |
//! | not yet cloned | shallow clone of `master`                               |
//!
//! A failed clone of a local source (`file://` URL or absolute path) falls
//! back to copying the tree and bootstrapping a fresh repository. A failed
//! clone of a remote source is a [`SyncError::RemoteCloneFailed`].
//!
//! The project's readiness flag is cleared before any work and set again
//! once the attempt is over, whatever its outcome.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{EngineConfig, Tool};
use crate::fsutil::copy_dir_recursive;
use crate::layout::ProjectLayout;
use crate::model::Project;
use crate::process::{capture, Captured, ToolCommand};
use crate::store::ProjectStore;

pub const CLONE_DEPTH: &str = "--depth=100";
pub const UPSTREAM_BRANCH: &str = "master";
pub const BOOTSTRAP_COMMIT_MESSAGE: &str = "Initial commit made automatically by Font Bakery";
const BOOTSTRAP_AUTHOR_NAME: &str = "Font Bakery";
const BOOTSTRAP_AUTHOR_EMAIL: &str = "bakery@localhost";

/// Shape of the incoming directory before synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Missing,
    ExistingGit,
    NotYetCloned,
}

impl SyncState {
    pub fn inspect(incoming: &Path) -> Self {
        if !incoming.exists() {
            SyncState::Missing
        } else if incoming.join(".git").exists() {
            SyncState::ExistingGit
        } else {
            SyncState::NotYetCloned
        }
    }
}

/// What a completed synchronization did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Existing clone was reset and pulled.
    Pulled,
    /// Existing clone was reset but `git pull` failed; the working copy is
    /// left at its previous revision.
    PullFailed { output: String },
    /// Fresh shallow clone.
    Cloned,
    /// Clone failed for a local source; the tree was copied and committed.
    Bootstrapped,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cloning '{url}' failed and the source is not local, no fallback is possible:\n{output}")]
    RemoteCloneFailed { url: String, output: String },
    #[error("cloning local source '{}' failed and the copy fallback failed: {reason}", .path.display())]
    LocalFallbackFailed { path: PathBuf, reason: String },
    #[error("creating incoming directory '{}': {source}", .path.display())]
    CreateIncoming {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preparing synchronization: {0:#}")]
    Setup(anyhow::Error),
    #[error("updating project readiness: {0:#}")]
    Store(anyhow::Error),
}

/// Result of a clone attempt, discriminated by where the source lives.
#[derive(Debug)]
enum CloneResult {
    Cloned,
    FailedLocal { path: PathBuf },
    FailedRemote { output: String },
}

/// Synchronize `project`'s incoming directory with its clone URL.
///
/// Callers must not run this concurrently with another sync or upstream
/// test run of the same project.
pub fn sync_project(
    store: &dyn ProjectStore,
    config: &EngineConfig,
    project: &Project,
) -> Result<SyncOutcome, SyncError> {
    store
        .set_project_ready(project.id, false)
        .map_err(SyncError::Store)?;

    let result = synchronize(config, project);

    store
        .set_project_ready(project.id, true)
        .map_err(SyncError::Store)?;

    match &result {
        Ok(outcome) => info!(project = project.id, ?outcome, "sync finished"),
        Err(err) => warn!(project = project.id, "sync failed: {err}"),
    }
    result
}

fn synchronize(config: &EngineConfig, project: &Project) -> Result<SyncOutcome, SyncError> {
    let layout =
        ProjectLayout::new(&config.data_root, project).map_err(SyncError::Setup)?;
    let incoming = layout.incoming();
    let git = config.tool(Tool::Git).map_err(SyncError::Setup)?;

    let state = SyncState::inspect(&incoming);
    debug!(project = project.id, ?state, "incoming directory state");

    match state {
        SyncState::ExistingGit => Ok(update_existing(&git, &incoming)),
        SyncState::Missing | SyncState::NotYetCloned => {
            if state == SyncState::Missing {
                fs::create_dir_all(&incoming).map_err(|source| SyncError::CreateIncoming {
                    path: incoming.clone(),
                    source,
                })?;
            }
            match clone(&git, project, &incoming) {
                CloneResult::Cloned => Ok(SyncOutcome::Cloned),
                CloneResult::FailedLocal { path } => {
                    bootstrap_local(&git, &path, &incoming)?;
                    Ok(SyncOutcome::Bootstrapped)
                }
                CloneResult::FailedRemote { output } => Err(SyncError::RemoteCloneFailed {
                    url: project.clone.clone(),
                    output,
                }),
            }
        }
    }
}

fn update_existing(git: &ToolCommand, incoming: &Path) -> SyncOutcome {
    // Discard anything that is not checked in before pulling.
    for args in [&["reset", "--hard"][..], &["clean", "--force"][..]] {
        let result = capture(&git.clone().args(args), incoming);
        if !result.success() {
            warn!("git {} failed: {}", args.join(" "), result.combined.trim());
        }
    }

    let pull = capture(
        &git.clone().args(["pull", "origin", UPSTREAM_BRANCH]),
        incoming,
    );
    if pull.success() {
        SyncOutcome::Pulled
    } else {
        SyncOutcome::PullFailed {
            output: pull.combined,
        }
    }
}

fn clone(git: &ToolCommand, project: &Project, incoming: &Path) -> CloneResult {
    let result = capture(
        &git.clone()
            .arg("clone")
            .arg(CLONE_DEPTH)
            .arg("--quiet")
            .arg(format!("--branch={UPSTREAM_BRANCH}"))
            .arg("--")
            .arg(&project.clone)
            .arg("."),
        incoming,
    );
    if result.success() {
        return CloneResult::Cloned;
    }

    match project.local_source_path() {
        Some(path) => {
            debug!(project = project.id, "clone failed, falling back to local copy");
            CloneResult::FailedLocal {
                path: PathBuf::from(path),
            }
        }
        None => CloneResult::FailedRemote {
            output: result.combined,
        },
    }
}

/// Copy a local source tree into `incoming` and commit it as a new repo.
fn bootstrap_local(git: &ToolCommand, source: &Path, incoming: &Path) -> Result<(), SyncError> {
    let failed = |reason: String| SyncError::LocalFallbackFailed {
        path: source.to_path_buf(),
        reason,
    };

    if !source.is_dir() {
        return Err(failed("source directory does not exist".to_string()));
    }
    copy_dir_recursive(source, incoming).map_err(|err| failed(format!("{err:#}")))?;

    let identity = [
        "-c".to_string(),
        format!("user.name={BOOTSTRAP_AUTHOR_NAME}"),
        "-c".to_string(),
        format!("user.email={BOOTSTRAP_AUTHOR_EMAIL}"),
    ];
    let steps = [
        git.clone().args(["init", "."]),
        git.clone().args(["add", "--all"]),
        git.clone()
            .args(&identity)
            .args(["commit", "--allow-empty", "-m", BOOTSTRAP_COMMIT_MESSAGE]),
    ];
    for step in &steps {
        let result: Captured = capture(step, incoming);
        if !result.success() {
            return Err(failed(format!("`{step}` failed: {}", result.combined.trim())));
        }
    }
    Ok(())
}
