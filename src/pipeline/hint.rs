//! Stage 2: autohint every TTF in place.

use anyhow::{Context, Result};
use std::fs;

use super::{note, StageContext};
use crate::config::Tool;
use crate::fsutil::{file_name, files_with_suffix, move_file};
use crate::log::BuildLog;
use crate::process;

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    let Some(params) = ctx.project.config.state.hinting_args() else {
        return Ok(());
    };
    log.section("Autohint TTFs (ttfautohint)")?;

    for font in files_with_suffix(ctx.outgoing(), ".ttf")? {
        let name = file_name(&font);
        let stem = name.trim_end_matches(".ttf");
        let aside_name = format!("{stem}.autohint.ttf");
        let aside = ctx.outgoing().join(&aside_name);

        move_file(&font, &aside)?;
        note(log, &format!("Moved {name} to {aside_name}"))?;

        let cmd = ctx
            .tool(Tool::Ttfautohint)?
            .args(&params)
            .arg(&aside_name)
            .arg(&name);
        process::run(&cmd, ctx.outgoing(), log)?;

        fs::remove_file(&aside)
            .with_context(|| format!("removing {}", aside.display()))?;
        note(log, &format!("Removed {aside_name}"))?;
    }
    Ok(())
}
