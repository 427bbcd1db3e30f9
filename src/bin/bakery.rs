use anyhow::{bail, Context, Result};
use font_bakery::cache::{result_tests, upstream_revision_tests, TestResults, ToolChecker};
use font_bakery::config::EngineConfig;
use font_bakery::layout::{ProjectLayout, ProjectLock};
use font_bakery::model::{Build, Project};
use font_bakery::pipeline::{discover_dashboard, run_pipeline, PipelineOutcome};
use font_bakery::preflight::check_required_tools;
use font_bakery::store::{FileStore, ProjectStore};
use font_bakery::sync::{sync_project, SyncOutcome};
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "Usage:\n  bakery sync <project-id>\n  bakery bake <build-id> [--force-sync]\n  bakery upstream-tests <project-id> <revision>\n  bakery result-tests <build-id>\n  bakery dashboard <build-id>\n  bakery preflight\n\nConfiguration: $BAKERY_CONFIG, ./bakery.toml or <config dir>/font-bakery/bakery.toml;\n$BAKERY_DATA_ROOT overrides data_root. Console verbosity follows $RUST_LOG."
}

fn main() -> Result<()> {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [cmd] if cmd == "preflight" => preflight(),
        [cmd, id] if cmd == "sync" => sync(parse_id(id)?),
        [cmd, id] if cmd == "bake" => bake(parse_id(id)?, false),
        [cmd, id, flag] if cmd == "bake" && flag == "--force-sync" => bake(parse_id(id)?, true),
        [cmd, id, revision] if cmd == "upstream-tests" => upstream_tests(parse_id(id)?, revision),
        [cmd, id] if cmd == "result-tests" => build_result_tests(parse_id(id)?),
        [cmd, id] if cmd == "dashboard" => dashboard(parse_id(id)?),
        [help] if help == "-h" || help == "--help" || help == "help" => {
            println!("{}", usage());
            Ok(())
        }
        _ => bail!(usage()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_id(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("'{raw}' is not a numeric id"))
}

struct Session {
    config: EngineConfig,
    store: FileStore,
}

impl Session {
    fn open() -> Result<Self> {
        let config = EngineConfig::discover()?;
        let store = FileStore::open(&config.data_root)?;
        Ok(Self { config, store })
    }

    fn build(&self, build_id: u64) -> Result<(Project, Build)> {
        let build = self.store.load_build(build_id)?;
        let project = self.store.load_project(build.project_id)?;
        Ok((project, build))
    }

    fn lock(&self, project: &Project) -> Result<ProjectLock> {
        ProjectLock::acquire(&ProjectLayout::new(&self.config.data_root, project)?)
    }
}

fn preflight() -> Result<()> {
    let config = EngineConfig::discover()?;
    check_required_tools(&config)?;
    println!("[preflight] all tools found");
    Ok(())
}

fn sync(project_id: u64) -> Result<()> {
    let session = Session::open()?;
    let project = session.store.load_project(project_id)?;
    let _lock = session.lock(&project)?;

    let outcome = sync_project(&session.store, &session.config, &project)?;
    match outcome {
        SyncOutcome::PullFailed { output } => {
            println!("[sync:{project_id}] pull failed, working copy unchanged:\n{output}")
        }
        other => println!("[sync:{project_id}] {other:?}"),
    }
    Ok(())
}

fn bake(build_id: u64, force_sync: bool) -> Result<()> {
    let session = Session::open()?;
    let (project, build) = session.build(build_id)?;
    let _lock = session.lock(&project)?;
    let checker = ToolChecker::from_config(&session.config)?;

    let outcome = run_pipeline(
        &session.store,
        &session.config,
        &checker,
        &project,
        &build,
        force_sync,
    )
    .with_context(|| format!("baking build {build_id}"))?;
    match outcome {
        PipelineOutcome::Skipped => {
            println!("[bake:{build_id}] project {} is not set up, nothing to do", project.id)
        }
        PipelineOutcome::Completed => println!("[bake:{build_id}] done"),
    }
    Ok(())
}

fn upstream_tests(project_id: u64, revision: &str) -> Result<()> {
    let session = Session::open()?;
    let project = session.store.load_project(project_id)?;
    let _lock = session.lock(&project)?;
    let checker = ToolChecker::from_config(&session.config)?;

    let results = upstream_revision_tests(&session.config, &checker, &project, revision)?;
    print_results(&results)
}

fn build_result_tests(build_id: u64) -> Result<()> {
    let session = Session::open()?;
    let (project, build) = session.build(build_id)?;
    let checker = ToolChecker::from_config(&session.config)?;

    let results = result_tests(&session.config, &checker, &project, &build)?;
    print_results(&results)
}

fn dashboard(build_id: u64) -> Result<()> {
    let session = Session::open()?;
    let (project, build) = session.build(build_id)?;
    discover_dashboard(&session.config, &project, &build)?;
    let yaml = ProjectLayout::new(&session.config.data_root, &project)?.dashboard_yaml();
    println!("[dashboard:{build_id}] {}", yaml.display());
    Ok(())
}

fn print_results(results: &TestResults) -> Result<()> {
    print!("{}", serde_yaml::to_string(results).context("rendering test results")?);
    Ok(())
}
