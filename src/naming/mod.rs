//! Canonical family/style naming.
//!
//! Both source formats end up as a [`FontNames`] pair, from which every
//! output file name is derived:
//!
//! - design sources (`.ufo`) read `familyName`/`styleName` from
//!   `fontinfo.plist`, with the project's family-name override winning;
//! - compiled sources (`.ttx`) read the `name` table, preferring the
//!   typographic family/subfamily entries (IDs 16/17) over the legacy
//!   ones (IDs 1/2).
//!
//! A style called `Normal` is always published as `Regular`.

pub mod ttx;
pub mod ufo;

use std::path::PathBuf;

pub use ttx::{read_ttx, resolve_ttx_names, NameRecord, SfntFlavor, TtxFont};
pub use ufo::{apply_canonical_names, read_fontinfo, resolve_ufo_names};

#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("'{}' has no family name (nameID 16 or 1 / familyName)", .path.display())]
    MissingFamily { path: PathBuf },
    #[error("'{}' has unsupported sfntVersion '{version}'", .path.display())]
    UnknownSfntVersion { path: PathBuf, version: String },
    #[error("reading '{}': {source}", .path.display())]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },
    #[error("'{}' is not a fontinfo dictionary", .path.display())]
    NotADictionary { path: PathBuf },
    #[error("parsing TTX '{}': {message}", .path.display())]
    Ttx { path: PathBuf, message: String },
    #[error("reading '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Human-readable family and style of one font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontNames {
    pub family: String,
    pub style: String,
}

impl FontNames {
    pub fn new(family: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            style: canonical_style(style.into()),
        }
    }

    /// Family with all whitespace removed.
    pub fn family_id(&self) -> String {
        strip_whitespace(&self.family)
    }

    /// Style with all whitespace removed.
    pub fn style_id(&self) -> String {
        strip_whitespace(&self.style)
    }

    /// `{family}-{style}` without whitespace: the stem of every output file.
    pub fn base_filename(&self) -> String {
        format!("{}-{}", self.family_id(), self.style_id())
    }

    pub fn postscript_name(&self) -> String {
        self.base_filename()
    }

    /// `{family} {style}` with the original spacing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.family, self.style)
    }
}

fn canonical_style(style: String) -> String {
    if style == "Normal" {
        "Regular".to_string()
    } else {
        style
    }
}

pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}
