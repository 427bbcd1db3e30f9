//! Build engine for font projects.
//!
//! Turns a font project's upstream repository into distributable fonts:
//!
//! - **Synchronizer** - keeps `{login}/{id}.in` in step with the clone URL
//! - **Pipeline** - copy & rename, hint, compact, subset, metadata,
//!   coverage, result tests and fixes, in that order
//! - **Naming** - canonical `{family}-{style}` names from UFO and TTX sources
//! - **Result cache** - checker reports stored as YAML, computed once per key
//! - **Build log** - the append-only per-build record external viewers tail
//!
//! # Architecture
//!
//! ```text
//! scheduler (bin/bakery.rs, or an embedding service)
//!     │
//!     ├── sync::sync_project ──────────── git via process::capture
//!     └── pipeline::run_pipeline
//!             ├── git checkout <revision>
//!             ├── stages ─────────────── tools via process::run → BuildLog
//!             └── cache::result_tests ── Checker → {id}.out/*.rtests.yaml
//!
//! store::ProjectStore: readiness and completion flags, injected
//! ```
//!
//! The engine never locks: callers serialize sync, bake and upstream tests
//! of the same project, for instance with [`layout::ProjectLock`].

pub mod cache;
pub mod config;
pub mod fsutil;
pub mod layout;
pub mod log;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testutil;

pub use cache::{result_tests, upstream_revision_tests, Checker, ToolChecker};
pub use config::EngineConfig;
pub use pipeline::{discover_dashboard, mark_build_done, run_pipeline, PipelineOutcome};
pub use store::{FileStore, MemoryStore, ProjectStore};
pub use sync::{sync_project, SyncOutcome};
