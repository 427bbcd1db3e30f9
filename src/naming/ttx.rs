//! Compiled sources: the `name` table and sfnt flavor of a `.ttx` dump.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

use super::{FontNames, NamingError};

const TYPOGRAPHIC_FAMILY: u16 = 16;
const FONT_FAMILY: u16 = 1;
const TYPOGRAPHIC_SUBFAMILY: u16 = 17;
const FONT_SUBFAMILY: u16 = 2;

/// Outline flavor declared by the `ttFont sfntVersion` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfntFlavor {
    /// `\x00\x01\x00\x00`: glyf outlines, compiles to `.ttf`.
    TrueType,
    /// `OTTO`: CFF outlines, compiles to `.otf`.
    Cff,
}

impl SfntFlavor {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "\\x00\\x01\\x00\\x00" | "\u{0}\u{1}\u{0}\u{0}" | "true" => Some(SfntFlavor::TrueType),
            "OTTO" => Some(SfntFlavor::Cff),
            _ => None,
        }
    }

    /// Binary extension `ttx` produces for this flavor.
    pub fn binary_extension(self) -> &'static str {
        match self {
            SfntFlavor::TrueType => "ttf",
            SfntFlavor::Cff => "otf",
        }
    }
}

/// One `namerecord`, holding the string as the font stores it.
///
/// Unicode and Windows platform records are kept as UTF-16BE bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub name_id: u16,
    pub platform_id: u16,
    pub string: Vec<u8>,
}

impl NameRecord {
    /// Build a record from its text, encoding it the way the platform does.
    pub fn from_text(name_id: u16, platform_id: u16, text: &str) -> Self {
        let string = if is_unicode_platform(platform_id) {
            text.encode_utf16().flat_map(u16::to_be_bytes).collect()
        } else {
            text.as_bytes().to_vec()
        };
        Self {
            name_id,
            platform_id,
            string,
        }
    }

    pub fn is_unicode(&self) -> bool {
        is_unicode_platform(self.platform_id)
    }

    /// The record as UTF-8. A string containing a NUL byte is treated as
    /// UTF-16BE.
    pub fn decoded(&self) -> String {
        if self.string.contains(&0) {
            let units: Vec<u16> = self
                .string
                .chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            String::from_utf8_lossy(&self.string).into_owned()
        }
    }
}

fn is_unicode_platform(platform_id: u16) -> bool {
    platform_id == 0 || platform_id == 3
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtxFont {
    pub flavor: SfntFlavor,
    pub names: Vec<NameRecord>,
}

/// Parse the sfnt flavor and every `namerecord` of a `.ttx` file.
pub fn read_ttx(path: &Path) -> Result<TtxFont, NamingError> {
    let content = fs::read_to_string(path).map_err(|source| NamingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_ttx(&content, path)
}

fn parse_ttx(content: &str, path: &Path) -> Result<TtxFont, NamingError> {
    let xml_error = |message: String| NamingError::Ttx {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = Reader::from_str(content);
    let mut buf = Vec::new();
    let mut flavor = None;
    let mut names = Vec::new();
    // (nameID, platformID, accumulated text) of the open namerecord
    let mut current: Option<(u16, u16, String)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"ttFont" => {
                    let raw = attribute(&e, "sfntVersion").map_err(xml_error)?;
                    let raw = raw.unwrap_or_default();
                    flavor = Some(SfntFlavor::parse(&raw).ok_or_else(|| {
                        NamingError::UnknownSfntVersion {
                            path: path.to_path_buf(),
                            version: raw.clone(),
                        }
                    })?);
                }
                b"namerecord" => {
                    let name_id = numeric_attribute(&e, "nameID").map_err(xml_error)?;
                    let platform_id = numeric_attribute(&e, "platformID").map_err(xml_error)?;
                    current = Some((name_id, platform_id, String::new()));
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some((_, _, text)) = current.as_mut() {
                    let chunk = t.unescape().map_err(|e| xml_error(e.to_string()))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, _, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"namerecord" {
                    if let Some((name_id, platform_id, text)) = current.take() {
                        names.push(NameRecord::from_text(name_id, platform_id, text.trim()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let flavor = flavor.ok_or_else(|| xml_error("missing ttFont element".to_string()))?;
    Ok(TtxFont { flavor, names })
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn numeric_attribute(element: &BytesStart<'_>, key: &str) -> Result<u16, String> {
    let raw = attribute(element, key)?.ok_or_else(|| format!("namerecord without {key}"))?;
    raw.trim()
        .parse()
        .map_err(|_| format!("namerecord {key} is not a number: '{raw}'"))
}

/// First record for `name_id`, Unicode platforms first.
fn lookup(records: &[NameRecord], name_id: u16) -> Option<String> {
    records
        .iter()
        .filter(|record| record.name_id == name_id)
        .min_by_key(|record| !record.is_unicode())
        .map(NameRecord::decoded)
}

/// Family from name ID 16 or 1, style from 17 or 2.
///
/// Missing family is an error; missing style resolves to an empty style.
pub fn resolve_ttx_names(records: &[NameRecord], source: &Path) -> Result<FontNames, NamingError> {
    let family = lookup(records, TYPOGRAPHIC_FAMILY)
        .or_else(|| lookup(records, FONT_FAMILY))
        .ok_or_else(|| NamingError::MissingFamily {
            path: source.to_path_buf(),
        })?;
    let style = lookup(records, TYPOGRAPHIC_SUBFAMILY)
        .or_else(|| lookup(records, FONT_SUBFAMILY))
        .unwrap_or_default();
    Ok(FontNames::new(family, style))
}
