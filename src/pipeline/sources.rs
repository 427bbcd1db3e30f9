//! Stage 1: copy sources into the build under canonical names, convert them
//! to binaries, and copy the ancillary project files.

use anyhow::{Context, Result};

use super::{note, StageContext};
use crate::config::Tool;
use crate::fsutil::{copy_dir_recursive, copy_path, entries_with_suffix, file_name, move_file};
use crate::layout::join_relative;
use crate::log::BuildLog;
use crate::model::SourceFormat;
use crate::naming::{
    apply_canonical_names, read_fontinfo, read_ttx, resolve_ttx_names, resolve_ufo_names,
    SfntFlavor,
};
use crate::process;

const OFL_LICENSE: &str = "OFL.txt";
const APACHE_LICENSE: &str = "LICENSE.txt";
const OFL_VARIANTS: &[&str] = &["Open Font License.markdown", "OFL.txt", "OFL.md"];
const APACHE_VARIANTS: &[&str] = &["APACHE.txt", "LICENSE"];

/// Published file name for a license file, given its upstream name.
///
/// Known OFL and Apache file names are canonicalized; anything else keeps
/// its name.
pub fn canonical_license_name(upstream_name: &str) -> &str {
    if OFL_VARIANTS.contains(&upstream_name) {
        OFL_LICENSE
    } else if APACHE_VARIANTS.contains(&upstream_name) {
        APACHE_LICENSE
    } else {
        upstream_name
    }
}

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    match ctx.project.source_format {
        SourceFormat::Ufo => copy_ufo_sources(ctx, log)?,
        SourceFormat::Ttx => copy_ttx_sources(ctx, log)?,
    }
    copy_ancillary_files(ctx, log)
}

fn copy_ufo_sources(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Copy [and Rename] UFOs")?;
    let state = &ctx.project.config.state;

    for listed in state.process_files_with(".ufo") {
        let source = join_relative(&ctx.incoming, listed)?;
        let info = read_fontinfo(&source)?;
        let names = resolve_ufo_names(&info, state.family_name_override(), &source)?;

        let dest = ctx.sources().join(format!("{}.ufo", names.base_filename()));
        copy_dir_recursive(&source, &dest)
            .with_context(|| format!("copying {} into the build", source.display()))?;
        apply_canonical_names(&dest, &names)?;
        note(
            log,
            &format!("Copied {listed} to sources/{}", file_name(&dest)),
        )?;
    }

    log.section("Convert UFOs to TTFs (ufo2ttf)")?;
    for ufo in entries_with_suffix(ctx.sources(), ".ufo")? {
        let base = file_name(&ufo).trim_end_matches(".ufo").to_string();
        let cmd = ctx
            .tool(Tool::Ufo2Ttf)?
            .arg(&ufo)
            .arg(ctx.outgoing().join(format!("{base}.ttf")))
            .arg(ctx.sources().join(format!("{base}.otf")));
        process::run(&cmd, ctx.sources(), log)?;
    }
    Ok(())
}

fn copy_ttx_sources(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Copy [and Rename] TTXs")?;

    for listed in ctx.project.config.state.process_files_with(".ttx") {
        let source = join_relative(&ctx.incoming, listed)?;
        if !source.is_file() {
            log.error(&format!("file '{}' not found", source.display()))?;
            continue;
        }

        let font = read_ttx(&source)?;
        let names = resolve_ttx_names(&font.names, &source)?;
        let base = names.base_filename();
        let extension = font.flavor.binary_extension();

        let ttx_name = format!("{base}.{extension}.ttx");
        let binary_name = format!("{base}.{extension}");
        copy_path(&source, &ctx.sources().join(&ttx_name))?;
        note(log, &format!("Copied {listed} to sources/{ttx_name}"))?;

        let compile = ctx
            .tool(Tool::Ttx)?
            .args(["-i", "-q", "-o"])
            .arg(&binary_name)
            .arg(&ttx_name);
        process::run(&compile, ctx.sources(), log)?;

        let target = ctx.outgoing().join(format!("{base}.ttf"));
        match font.flavor {
            SfntFlavor::TrueType => {
                move_file(&ctx.sources().join(&binary_name), &target)?;
                note(log, &format!("Moved sources/{binary_name} to {base}.ttf"))?;
            }
            SfntFlavor::Cff => {
                let convert = ctx
                    .tool(Tool::Autoconvert)?
                    .arg(ctx.sources().join(&binary_name))
                    .arg(&target);
                process::run(&convert, ctx.sources(), log)?;
            }
        }
    }
    Ok(())
}

/// Copy license, FONTLOG, description, metadata and operator-selected text
/// files. Missing files are logged, never fatal.
fn copy_ancillary_files(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    let state = &ctx.project.config.state;

    match state.license_file.as_deref().filter(|name| !name.is_empty()) {
        Some(license) => {
            let upstream_name = license.rsplit('/').next().unwrap_or(license);
            let published = canonical_license_name(upstream_name);
            copy_optional(
                ctx,
                log,
                license,
                published,
                &format!("License file '{license}' does not exist upstream"),
            )?;
        }
        None => log.error("License file not copied")?,
    }

    copy_optional(
        ctx,
        log,
        "FONTLOG.txt",
        "FONTLOG.txt",
        "FONTLOG.txt does not exist",
    )?;
    copy_optional(
        ctx,
        log,
        "DESCRIPTION.en_us.html",
        "DESCRIPTION.en_us.html",
        "DESCRIPTION.en_us.html does not exist upstream, will generate one later",
    )?;
    copy_optional(
        ctx,
        log,
        "METADATA.json",
        "METADATA.json",
        "METADATA.json does not exist upstream, will generate one later",
    )?;

    for name in &state.txt_files_copied {
        copy_optional(
            ctx,
            log,
            name,
            name,
            &format!("{name} does not exist upstream"),
        )?;
    }
    Ok(())
}

fn copy_optional(
    ctx: &StageContext<'_>,
    log: &mut BuildLog,
    upstream: &str,
    published: &str,
    missing: &str,
) -> Result<()> {
    let source = join_relative(&ctx.incoming, upstream)?;
    if !source.is_file() {
        log.error(missing)?;
        return Ok(());
    }
    let dest = join_relative(ctx.outgoing(), published)?;
    copy_path(&source, &dest)?;
    note(log, &format!("Copied {upstream} to {published}"))
}
