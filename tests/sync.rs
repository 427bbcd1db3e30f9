mod common;

use std::fs;

use common::{Bakery, PROJECT_ID};
use font_bakery::config::Tool;
use font_bakery::preflight::command_exists;
use font_bakery::store::ProjectStore;
use font_bakery::sync::{sync_project, SyncError, SyncOutcome};

#[test]
fn test_remote_clone_failure_still_leaves_project_ready() {
    let mut bakery = Bakery::new();
    bakery.tool(Tool::Git, "echo 'fatal: repository not found' >&2\nexit 128");
    bakery.project.is_ready = false;
    bakery.register();

    let err = sync_project(&bakery.store, &bakery.config, &bakery.project).unwrap_err();

    assert!(matches!(err, SyncError::RemoteCloneFailed { .. }));
    assert!(err.to_string().contains("repository not found"));
    assert!(bakery.store.load_project(PROJECT_ID).unwrap().is_ready);
}

#[test]
fn test_local_source_bootstraps_then_pulls_with_real_git() {
    if !command_exists("git") {
        eprintln!("git not installed, skipping");
        return;
    }
    let mut bakery = Bakery::new();
    bakery.config.tools.set(Tool::Git, vec!["git".into()]);

    // A plain directory, not a repository: cloning it fails.
    let upstream = bakery.temp.path().join("upstream");
    fs::create_dir_all(upstream.join("src")).unwrap();
    fs::write(upstream.join("src/OFL.txt"), "license").unwrap();
    bakery.project.clone = format!("file://{}", upstream.display());
    bakery.register();

    let first = sync_project(&bakery.store, &bakery.config, &bakery.project).unwrap();

    assert_eq!(first, SyncOutcome::Bootstrapped);
    let incoming = bakery.incoming();
    assert!(incoming.join(".git").is_dir());
    assert_eq!(
        fs::read_to_string(incoming.join("src/OFL.txt")).unwrap(),
        "license"
    );
    assert!(bakery.store.load_project(PROJECT_ID).unwrap().is_ready);

    // The bootstrapped repository has no `origin`, so the pull fails but
    // the existing working copy is kept.
    let second = sync_project(&bakery.store, &bakery.config, &bakery.project).unwrap();

    assert!(matches!(second, SyncOutcome::PullFailed { .. }));
    assert!(incoming.join("src/OFL.txt").is_file());
    assert!(bakery.store.load_project(PROJECT_ID).unwrap().is_ready);
}
