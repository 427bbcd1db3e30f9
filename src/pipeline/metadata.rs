//! Stage 5: regenerate `METADATA.json` from the built fonts.

use anyhow::Result;

use super::StageContext;
use crate::config::Tool;
use crate::log::BuildLog;
use crate::process;

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Generate METADATA.json (genmetadata)")?;
    let cmd = ctx.tool(Tool::Genmetadata)?.arg(ctx.outgoing());
    process::run(&cmd, ctx.outgoing(), log)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{calls, StageFixture};
    use super::*;
    use crate::model::SourceFormat;

    #[test]
    fn test_runs_against_outgoing() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        let record = fx.fake_tool(Tool::Genmetadata, "echo '{}' > METADATA.json");

        let (result, log) = fx.run(run);

        result.unwrap();
        assert_eq!(calls(&record), vec![fx.dirs.outgoing.display().to_string()]);
        assert!(fx.dirs.outgoing.join("METADATA.json").is_file());
        assert!(log.contains("### Generate METADATA.json (genmetadata)"));
    }
}
