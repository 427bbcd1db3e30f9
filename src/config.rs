//! Engine configuration.
//!
//! Resolution order for the config file:
//! 1. `BAKERY_CONFIG` env var (path to a TOML file)
//! 2. `./bakery.toml`
//! 3. `<user config dir>/font-bakery/bakery.toml`
//! 4. Built-in defaults (data root `./data`)
//!
//! `BAKERY_DATA_ROOT` overrides `data_root` after the file is loaded.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::ToolCommand;

pub const CONFIG_FILENAME: &str = "bakery.toml";
const DEFAULT_DATA_ROOT: &str = "data";

/// External programs driven by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Git,
    Ttfautohint,
    Ttx,
    Ufo2Ttf,
    Autoconvert,
    Subset,
    Genmetadata,
    Fontaine,
    Checker,
    Fixer,
    Discovery,
}

impl Tool {
    pub const ALL: &'static [Tool] = &[
        Tool::Git,
        Tool::Ttfautohint,
        Tool::Ttx,
        Tool::Ufo2Ttf,
        Tool::Autoconvert,
        Tool::Subset,
        Tool::Genmetadata,
        Tool::Fontaine,
        Tool::Checker,
        Tool::Fixer,
        Tool::Discovery,
    ];

    /// Key of this tool in the `[tools]` table.
    pub fn key(self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::Ttfautohint => "ttfautohint",
            Tool::Ttx => "ttx",
            Tool::Ufo2Ttf => "ufo2ttf",
            Tool::Autoconvert => "autoconvert",
            Tool::Subset => "subset",
            Tool::Genmetadata => "genmetadata",
            Tool::Fontaine => "fontaine",
            Tool::Checker => "checker",
            Tool::Fixer => "fixer",
            Tool::Discovery => "discovery",
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Argv prefix for every external tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ToolsConfig {
    pub git: Vec<String>,
    pub ttfautohint: Vec<String>,
    pub ttx: Vec<String>,
    pub ufo2ttf: Vec<String>,
    pub autoconvert: Vec<String>,
    pub subset: Vec<String>,
    pub genmetadata: Vec<String>,
    pub fontaine: Vec<String>,
    pub checker: Vec<String>,
    pub fixer: Vec<String>,
    pub discovery: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: argv(&["git"]),
            ttfautohint: argv(&["ttfautohint"]),
            ttx: argv(&["ttx"]),
            ufo2ttf: argv(&["ufo2ttf.py"]),
            autoconvert: argv(&["autoconvert.py"]),
            subset: argv(&["subset.py"]),
            genmetadata: argv(&["genmetadata.py"]),
            fontaine: argv(&["pyfontaine"]),
            checker: argv(&["bakery-check"]),
            fixer: argv(&["bakery-fix"]),
            discovery: argv(&["discovery.py"]),
        }
    }
}

impl ToolsConfig {
    pub fn set(&mut self, tool: Tool, argv: Vec<String>) {
        match tool {
            Tool::Git => self.git = argv,
            Tool::Ttfautohint => self.ttfautohint = argv,
            Tool::Ttx => self.ttx = argv,
            Tool::Ufo2Ttf => self.ufo2ttf = argv,
            Tool::Autoconvert => self.autoconvert = argv,
            Tool::Subset => self.subset = argv,
            Tool::Genmetadata => self.genmetadata = argv,
            Tool::Fontaine => self.fontaine = argv,
            Tool::Checker => self.checker = argv,
            Tool::Fixer => self.fixer = argv,
            Tool::Discovery => self.discovery = argv,
        }
    }

    pub fn get(&self, tool: Tool) -> &[String] {
        match tool {
            Tool::Git => &self.git,
            Tool::Ttfautohint => &self.ttfautohint,
            Tool::Ttx => &self.ttx,
            Tool::Ufo2Ttf => &self.ufo2ttf,
            Tool::Autoconvert => &self.autoconvert,
            Tool::Subset => &self.subset,
            Tool::Genmetadata => &self.genmetadata,
            Tool::Fontaine => &self.fontaine,
            Tool::Checker => &self.checker,
            Tool::Fixer => &self.fixer,
            Tool::Discovery => &self.discovery,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EngineToml {
    data_root: Option<PathBuf>,
    tool_root: Option<PathBuf>,
    #[serde(default)]
    tools: ToolsConfig,
}

/// Settings shared by every pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root of the `{account}/{projectId}.in|.out` tree.
    pub data_root: PathBuf,
    /// Directory searched before `PATH` for tool programs.
    pub tool_root: Option<PathBuf>,
    pub tools: ToolsConfig,
}

impl EngineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            tool_root: None,
            tools: ToolsConfig::default(),
        }
    }

    pub fn with_tool_root(mut self, tool_root: impl Into<PathBuf>) -> Self {
        self.tool_root = Some(tool_root.into());
        self
    }

    /// Parse a TOML document. Relative paths are resolved against `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let parsed: EngineToml = toml::from_str(content).context("parsing engine config")?;
        for tool in Tool::ALL {
            if parsed.tools.get(*tool).is_empty() {
                bail!(
                    "invalid engine config: tools.{} must name a program",
                    tool.key()
                );
            }
        }
        let data_root = parsed
            .data_root
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));
        Ok(Self {
            data_root: resolve_relative(base_dir, &data_root),
            tool_root: parsed
                .tool_root
                .map(|root| resolve_relative(base_dir, &root)),
            tools: parsed.tools,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config '{}'", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
            .with_context(|| format!("loading engine config '{}'", path.display()))
    }

    /// Locate and load the config using the documented resolution order.
    pub fn discover() -> Result<Self> {
        let cwd = env::current_dir().context("resolving current directory")?;
        let mut config = if let Ok(path) = env::var("BAKERY_CONFIG") {
            Self::load(Path::new(&path))?
        } else if cwd.join(CONFIG_FILENAME).is_file() {
            Self::load(&cwd.join(CONFIG_FILENAME))?
        } else if let Some(path) = user_config_path().filter(|p| p.is_file()) {
            Self::load(&path)?
        } else {
            Self::new(cwd.join(DEFAULT_DATA_ROOT))
        };

        if let Ok(root) = env::var("BAKERY_DATA_ROOT") {
            config.data_root = resolve_relative(&cwd, Path::new(&root));
        }
        Ok(config)
    }

    /// Build the command for `tool`, resolving its program against
    /// `tool_root` first.
    pub fn tool(&self, tool: Tool) -> Result<ToolCommand> {
        let argv = self.tools.get(tool);
        let cmd = ToolCommand::from_argv(argv)
            .with_context(|| format!("resolving tool '{}'", tool.key()))?;
        let Some(root) = &self.tool_root else {
            return Ok(cmd);
        };
        let candidate = root.join(cmd.program());
        if candidate.is_file() {
            return Ok(ToolCommand::new(candidate).args(cmd.get_args()));
        }
        Ok(cmd)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("font-bakery").join(CONFIG_FILENAME))
}

fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
