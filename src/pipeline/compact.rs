//! Stage 3: round-trip every TTF through TTX to normalize its tables.
//!
//! The original binary stays aside as `.ttf.orig` until the rebuilt one
//! exists; the `.ttx` dump is kept in `sources/`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::{note, StageContext};
use crate::config::Tool;
use crate::fsutil::{file_name, files_with_suffix, move_file};
use crate::log::BuildLog;
use crate::process;

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Compact TTFs with ttx")?;

    for font in files_with_suffix(ctx.outgoing(), ".ttf")? {
        let name = file_name(&font);
        let stem = name.trim_end_matches(".ttf");
        let ttx_name = format!("{stem}.ttx");
        let orig_name = format!("{name}.orig");
        let out = ctx.outgoing();

        let dump = ctx
            .tool(Tool::Ttx)?
            .args(["-i", "-q", "-o"])
            .arg(&ttx_name)
            .arg(&name);
        process::run(&dump, out, log)?;

        move_file(&font, &out.join(&orig_name))?;
        note(log, &format!("Moved {name} to {orig_name}"))?;

        let rebuild = ctx
            .tool(Tool::Ttx)?
            .args(["-i", "-q", "-o"])
            .arg(&name)
            .arg(&ttx_name);
        process::run(&rebuild, out, log)?;

        let before = file_size(&out.join(&orig_name))?;
        let after = file_size(&font)?;
        note(
            log,
            &format!("{name}: {before} bytes before compaction, {after} bytes after"),
        )?;

        fs::remove_file(out.join(&orig_name))
            .with_context(|| format!("removing {orig_name}"))?;
        move_file(&out.join(&ttx_name), &ctx.sources().join(&ttx_name))?;
        note(log, &format!("Moved {ttx_name} to sources/{ttx_name}"))?;
    }
    Ok(())
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)
        .with_context(|| format!("reading size of {}", path.display()))?
        .len())
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{calls, has_file, StageFixture};
    use super::*;
    use crate::model::SourceFormat;

    #[test]
    fn test_round_trip_keeps_dump_in_sources() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        // `ttx -i -q -o <out> <in>`: copy, trimming one byte.
        let record = fx.fake_tool(Tool::Ttx, r#"head -c 3 "$5" > "$4""#);
        fx.write_outgoing("A-Regular.ttf", "12345");

        let (result, log) = fx.run(run);

        result.unwrap();
        assert_eq!(
            calls(&record),
            vec![
                "-i -q -o A-Regular.ttx A-Regular.ttf",
                "-i -q -o A-Regular.ttf A-Regular.ttx",
            ]
        );
        let out = &fx.dirs.outgoing;
        assert!(has_file(out, "A-Regular.ttf"));
        assert!(!has_file(out, "A-Regular.ttf.orig"));
        assert!(!has_file(out, "A-Regular.ttx"));
        assert!(has_file(&fx.dirs.sources, "A-Regular.ttx"));
        assert!(log.contains("A-Regular.ttf: 5 bytes before compaction, 3 bytes after"));
    }

    #[test]
    fn test_original_kept_when_rebuild_fails() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        fx.fake_tool(
            Tool::Ttx,
            r#"case "$5" in
  *.ttx) exit 1 ;;
  *) cp "$5" "$4" ;;
esac"#,
        );
        fx.write_outgoing("A-Regular.ttf", "font");

        let (result, _) = fx.run(run);

        assert!(result.is_err());
        assert!(has_file(&fx.dirs.outgoing, "A-Regular.ttf.orig"));
    }
}
