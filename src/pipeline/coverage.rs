//! Stage 6: Unicode coverage report for every TTF.

use anyhow::Result;

use super::StageContext;
use crate::config::Tool;
use crate::fsutil::{file_name, files_with_suffix};
use crate::log::BuildLog;
use crate::process;

/// Report file inside `sources/`; every font's report is appended to it.
pub const COVERAGE_REPORT: &str = "fontaine.txt";

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Coverage report (fontaine)")?;
    let report = ctx.sources().join(COVERAGE_REPORT);

    for font in files_with_suffix(ctx.outgoing(), ".ttf")? {
        let cmd = ctx
            .tool(Tool::Fontaine)?
            .arg("--text")
            .arg(file_name(&font));
        process::run_appending_stdout(&cmd, ctx.outgoing(), log, &report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixture::StageFixture;
    use super::*;
    use crate::model::SourceFormat;
    use std::fs;

    #[test]
    fn test_reports_appended_per_font() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        fx.fake_tool(Tool::Fontaine, r#"echo "coverage of $2""#);
        fx.write_outgoing("A-Bold.ttf", "");
        fx.write_outgoing("A-Regular.ttf", "");

        let (result, log) = fx.run(run);

        result.unwrap();
        assert_eq!(
            fs::read_to_string(fx.dirs.sources.join(COVERAGE_REPORT)).unwrap(),
            "coverage of A-Bold.ttf\ncoverage of A-Regular.ttf\n"
        );
        assert!(!log.contains("coverage of"));
    }

    #[test]
    fn test_unwritable_report_fails_with_fatal_line() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        fx.fake_tool(Tool::Fontaine, "echo covered");
        fx.write_outgoing("A-Regular.ttf", "");
        fs::create_dir_all(fx.dirs.sources.join(COVERAGE_REPORT)).unwrap();

        let (result, log) = fx.run(run);

        assert!(result.is_err());
        assert!(log.contains("fontaine.txt\n"));
        assert!(log.contains("Fatal: could not open output file"));
    }
}
