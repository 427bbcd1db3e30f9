//! Stages 7 and 8: result tests and fixes, plus dashboard discovery.

use anyhow::Result;

use super::{note, StageContext};
use crate::cache::result_tests;
use crate::config::{EngineConfig, Tool};
use crate::layout::ProjectLayout;
use crate::log::BuildLog;
use crate::model::{Build, Project};
use crate::process;

pub(super) fn run_tests(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Result tests")?;
    let results = result_tests(ctx.config, ctx.checker, ctx.project, ctx.build)?;
    note(
        log,
        &format!(
            "Tested {} font(s), report in {}",
            results.len(),
            ctx.dirs.result_cache.display()
        ),
    )
}

pub(super) fn run_fixes(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Apply fixes")?;
    let cmd = ctx
        .tool(Tool::Fixer)?
        .arg(&ctx.dirs.result_cache)
        .arg(ctx.outgoing());
    process::run(&cmd, ctx.outgoing(), log)?;
    Ok(())
}

/// Feed a finished build's outgoing directory to the discovery tool, which
/// writes the project's dashboard data (`{projectId}.bakery.yaml`).
///
/// Not part of the default stage order; the output is appended to the
/// build log.
pub fn discover_dashboard(config: &EngineConfig, project: &Project, build: &Build) -> Result<()> {
    let layout = ProjectLayout::new(&config.data_root, project)?;
    let dirs = layout.build(build)?;
    let mut log = BuildLog::append(&dirs.log)?;

    let result = (|| -> Result<()> {
        log.section("Discovery Dashboard data")?;
        let cmd = config
            .tool(Tool::Discovery)?
            .arg(&dirs.outgoing)
            .arg(layout.dashboard_yaml());
        process::run(&cmd, &dirs.outgoing, &mut log)?;
        Ok(())
    })();
    let closed = log.close();
    result?;
    closed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{calls, StageFixture};
    use super::*;
    use crate::model::SourceFormat;
    use std::fs;

    #[test]
    fn test_result_tests_write_cache() {
        let fx = StageFixture::new(SourceFormat::Ufo);
        fx.write_outgoing("A-Regular.ttf", "");

        let (result, log) = fx.run(run_tests);

        result.unwrap();
        assert!(fx.dirs.result_cache.is_file());
        assert!(log.contains("Tested 1 font(s)"));
    }

    #[test]
    fn test_fixer_gets_cache_and_outgoing() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        let record = fx.fake_tool(Tool::Fixer, "");

        let (result, log) = fx.run(run_fixes);

        result.unwrap();
        assert_eq!(
            calls(&record),
            vec![format!(
                "{} {}",
                fx.dirs.result_cache.display(),
                fx.dirs.outgoing.display()
            )]
        );
        assert!(log.contains("### Apply fixes"));
    }

    #[test]
    fn test_discover_dashboard_appends_to_build_log() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        let record = fx.fake_tool(Tool::Discovery, "echo discovered");
        fs::write(&fx.dirs.log, "### Bake Succeeded!\n").unwrap();

        discover_dashboard(&fx.config, &fx.project, &fx.build).unwrap();

        let log = fs::read_to_string(&fx.dirs.log).unwrap();
        assert!(log.starts_with("### Bake Succeeded!\n### Discovery Dashboard data\n"));
        assert!(log.contains("discovered\n"));
        let expected_yaml = fx.config.data_root.join("alice/42.bakery.yaml");
        assert_eq!(
            calls(&record),
            vec![format!(
                "{} {}",
                fx.dirs.outgoing.display(),
                expected_yaml.display()
            )]
        );
    }
}
