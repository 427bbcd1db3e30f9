//! Design sources: `fontinfo.plist` inside a `.ufo` directory.

use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};

use super::{FontNames, NamingError};

pub const FONTINFO: &str = "fontinfo.plist";

/// Read the `fontinfo.plist` dictionary of a `.ufo` directory.
pub fn read_fontinfo(ufo_dir: &Path) -> Result<Dictionary, NamingError> {
    let path = ufo_dir.join(FONTINFO);
    let value = Value::from_file(&path).map_err(|source| NamingError::Plist {
        path: path.clone(),
        source,
    })?;
    value
        .into_dictionary()
        .ok_or(NamingError::NotADictionary { path })
}

/// Family from the override or `familyName`, style from `styleName`.
///
/// A missing `styleName` resolves to an empty style.
pub fn resolve_ufo_names(
    info: &Dictionary,
    family_override: Option<&str>,
    source: &Path,
) -> Result<FontNames, NamingError> {
    let family = match family_override {
        Some(name) => name.to_string(),
        None => string_field(info, "familyName").ok_or_else(|| NamingError::MissingFamily {
            path: source.to_path_buf(),
        })?,
    };
    let style = string_field(info, "styleName").unwrap_or_default();
    Ok(FontNames::new(family, style))
}

/// Write `familyName`, `postscriptFontName` and `postscriptFullName` into
/// the `fontinfo.plist` of the copied `.ufo` directory.
pub fn apply_canonical_names(ufo_dir: &Path, names: &FontNames) -> Result<PathBuf, NamingError> {
    let path = ufo_dir.join(FONTINFO);
    let mut info = read_fontinfo(ufo_dir)?;
    info.insert("familyName".into(), Value::String(names.family.clone()));
    info.insert(
        "postscriptFontName".into(),
        Value::String(names.postscript_name()),
    );
    info.insert("postscriptFullName".into(), Value::String(names.full_name()));
    Value::Dictionary(info)
        .to_file_xml(&path)
        .map_err(|source| NamingError::Plist {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

fn string_field(info: &Dictionary, key: &str) -> Option<String> {
    info.get(key)
        .and_then(Value::as_string)
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_ufo(dir: &Path, family: Option<&str>, style: Option<&str>) {
        fs::create_dir_all(dir).unwrap();
        let mut entries = String::new();
        if let Some(family) = family {
            entries.push_str(&format!("<key>familyName</key><string>{family}</string>"));
        }
        if let Some(style) = style {
            entries.push_str(&format!("<key>styleName</key><string>{style}</string>"));
        }
        fs::write(
            dir.join(FONTINFO),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0"><dict>{entries}<key>unitsPerEm</key><integer>1000</integer></dict></plist>"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_names_from_fontinfo() {
        let temp = TempDir::new().unwrap();
        let ufo = temp.path().join("Test.ufo");
        write_ufo(&ufo, Some("Test Family"), Some("Normal"));

        let info = read_fontinfo(&ufo).unwrap();
        let names = resolve_ufo_names(&info, None, &ufo).unwrap();

        assert_eq!(names, FontNames::new("Test Family", "Regular"));
        assert_eq!(names.base_filename(), "TestFamily-Regular");
    }

    #[test]
    fn test_override_wins_and_missing_style_is_empty() {
        let temp = TempDir::new().unwrap();
        let ufo = temp.path().join("Test.ufo");
        write_ufo(&ufo, Some("Upstream"), None);

        let info = read_fontinfo(&ufo).unwrap();
        let names = resolve_ufo_names(&info, Some("Operator Family"), &ufo).unwrap();

        assert_eq!(names.family, "Operator Family");
        assert_eq!(names.style, "");
    }

    #[test]
    fn test_missing_family_without_override_fails() {
        let temp = TempDir::new().unwrap();
        let ufo = temp.path().join("Test.ufo");
        write_ufo(&ufo, None, Some("Bold"));

        let info = read_fontinfo(&ufo).unwrap();
        let err = resolve_ufo_names(&info, None, &ufo).unwrap_err();
        assert!(matches!(err, NamingError::MissingFamily { .. }));
    }

    #[test]
    fn test_apply_canonical_names_rewrites_copy() {
        let temp = TempDir::new().unwrap();
        let ufo = temp.path().join("Test.ufo");
        write_ufo(&ufo, Some("Test Family"), Some("Bold Italic"));

        let names = FontNames::new("Test Family", "Bold Italic");
        apply_canonical_names(&ufo, &names).unwrap();

        let info = read_fontinfo(&ufo).unwrap();
        let get = |key: &str| info.get(key).and_then(Value::as_string).unwrap().to_string();
        assert_eq!(get("familyName"), "Test Family");
        assert_eq!(get("postscriptFontName"), "TestFamily-BoldItalic");
        assert_eq!(get("postscriptFullName"), "Test Family Bold Italic");
        assert_eq!(get("styleName"), "Bold Italic");
        assert!(info.get("unitsPerEm").is_some());
    }
}
