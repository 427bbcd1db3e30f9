//! Stage 4: build subsets of every TTF.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::{note, StageContext};
use crate::config::Tool;
use crate::fsutil::{file_name, files_with_suffix, move_file};
use crate::log::BuildLog;
use crate::process;

/// Token elided from public file names: the default subset.
const DEFAULT_SUBSET_TOKEN: &str = "+latin";

pub(super) fn run(ctx: &StageContext<'_>, log: &mut BuildLog) -> Result<()> {
    log.section("Subset TTFs (subset)")?;

    let fonts = files_with_suffix(ctx.outgoing(), ".ttf")?;
    for subset in &ctx.project.config.state.subset {
        for font in &fonts {
            let name = file_name(font);
            let stem = name.trim_end_matches(".ttf");
            for opentype in [false, true] {
                let mut cmd = ctx
                    .tool(Tool::Subset)?
                    .arg(format!("--subset={subset}"))
                    .args(["--null", "--nmr", "--roundtrip", "--script"]);
                let mut output = format!("{stem}.{subset}");
                if opentype {
                    cmd = cmd.arg("--opentype-features");
                    output.push_str("-opentype");
                }
                let cmd = cmd.arg(&name).arg(&output);
                process::run(&cmd, ctx.outgoing(), log)?;
            }
        }
    }

    for (from, to) in strip_latin_suffix(ctx.outgoing())? {
        note(
            log,
            &format!("Renamed {} to {}", file_name(&from), file_name(&to)),
        )?;
    }
    Ok(())
}

/// Rename every file in `dir` whose name contains `+latin` to the same name
/// without it. Returns the `(from, to)` pairs.
pub fn strip_latin_suffix(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut renamed = Vec::new();
    for path in files_with_suffix(dir, "")? {
        let name = file_name(&path);
        if !name.contains(DEFAULT_SUBSET_TOKEN) {
            continue;
        }
        let target = dir.join(name.replace(DEFAULT_SUBSET_TOKEN, ""));
        move_file(&path, &target)?;
        renamed.push((path, target));
    }
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{calls, has_file, StageFixture};
    use super::*;
    use crate::model::SourceFormat;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_strip_latin_suffix() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Family-Regular+latin.ttf"), "").unwrap();
        fs::write(temp.path().join("Family-Regular+cyrillic.ttf"), "").unwrap();

        let renamed = strip_latin_suffix(temp.path()).unwrap();

        assert_eq!(renamed.len(), 1);
        assert!(has_file(temp.path(), "Family-Regular.ttf"));
        assert!(!has_file(temp.path(), "Family-Regular+latin.ttf"));
        assert!(has_file(temp.path(), "Family-Regular+cyrillic.ttf"));
    }

    #[test]
    fn test_two_runs_per_subset_and_font() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        let record = fx.fake_tool(Tool::Subset, "");
        fx.project.config.state.subset = vec!["latin".into(), "cyrillic".into()];
        fx.write_outgoing("A-Regular.ttf", "");

        let (result, log) = fx.run(run);

        result.unwrap();
        assert_eq!(
            calls(&record),
            vec![
                "--subset=latin --null --nmr --roundtrip --script A-Regular.ttf A-Regular.latin",
                "--subset=latin --null --nmr --roundtrip --script --opentype-features A-Regular.ttf A-Regular.latin-opentype",
                "--subset=cyrillic --null --nmr --roundtrip --script A-Regular.ttf A-Regular.cyrillic",
                "--subset=cyrillic --null --nmr --roundtrip --script --opentype-features A-Regular.ttf A-Regular.cyrillic-opentype",
            ]
        );
        assert!(log.contains("### Subset TTFs (subset)"));
    }

    #[test]
    fn test_no_subsets_configured() {
        let mut fx = StageFixture::new(SourceFormat::Ufo);
        let record = fx.fake_tool(Tool::Subset, "");
        fx.write_outgoing("A-Regular.ttf", "");

        let (result, _) = fx.run(run);

        result.unwrap();
        assert!(calls(&record).is_empty());
    }
}
