//! Project and build records as the engine sees them.
//!
//! Both records are owned by the web layer; the engine reads them and only
//! flips `Project::is_ready` and `Build::is_done` through a
//! [`ProjectStore`](crate::store::ProjectStore).

use serde::{Deserialize, Serialize};

/// The two source representations a project can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Design sources: `.ufo` directories with a `fontinfo.plist`.
    Ufo,
    /// Compiled fonts dumped as `.ttx` XML.
    Ttx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    /// Owning account; first path component under the data root.
    pub login: String,
    /// Clone URL of the upstream repository.
    pub clone: String,
    #[serde(rename = "source_files_type")]
    pub source_format: SourceFormat,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub config: ProjectConfig,
}

impl Project {
    /// Filesystem path of a local clone URL (`file://...` or absolute path).
    pub fn local_source_path(&self) -> Option<&str> {
        if let Some(path) = self.clone.strip_prefix("file://") {
            return Some(path);
        }
        self.clone.starts_with('/').then_some(self.clone.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub state: ProjectState,
    pub local: LocalState,
}

/// Operator-chosen build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub familyname: Option<String>,
    pub process_files: Vec<String>,
    pub license_file: Option<String>,
    pub txt_files_copied: Vec<String>,
    pub ttfautohint: Option<HintingArgs>,
    pub subset: Vec<String>,
}

impl ProjectState {
    /// Family name override, if one is set and not blank.
    pub fn family_name_override(&self) -> Option<&str> {
        self.familyname
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Configured sources ending with `extension` (e.g. `.ufo`).
    pub fn process_files_with(&self, extension: &str) -> Vec<&str> {
        self.process_files
            .iter()
            .map(String::as_str)
            .filter(|file| file.ends_with(extension))
            .collect()
    }

    /// Hinting arguments, or `None` when hinting is not configured.
    pub fn hinting_args(&self) -> Option<Vec<String>> {
        self.ttfautohint
            .as_ref()
            .map(HintingArgs::to_args)
            .filter(|args| !args.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalState {
    /// Set once the operator finished the project's initial setup.
    pub setup: bool,
}

/// Hinting parameters: one command-line string or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HintingArgs {
    Line(String),
    List(Vec<String>),
}

impl HintingArgs {
    /// Split into an argument vector the way a shell splits words: single or
    /// double quotes group text containing spaces, and `""` or `''` yield an
    /// empty argument. No escapes or expansions.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            HintingArgs::List(items) => items.clone(),
            HintingArgs::Line(line) => split_words(line),
        }
    }
}

fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    // A quoted empty string still counts as a word.
    let mut started = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                started = true;
            }
            None if c.is_whitespace() => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            None => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    pub project_id: u64,
    /// Upstream revision this build targets.
    pub revision: String,
    #[serde(default)]
    pub is_done: bool,
}
