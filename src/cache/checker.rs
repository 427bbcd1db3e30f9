//! Correctness-checker seam.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::config::{EngineConfig, Tool};
use crate::process::{capture, ToolCommand};

/// Named group of checks the checker runs against one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestSuite {
    /// One `.ufo` directory of the upstream tree.
    Upstream,
    /// One `METADATA.json` of the upstream tree.
    Metadata,
    /// One `.ttx` file of the upstream tree.
    UpstreamTtx,
    /// The whole upstream tree at once.
    UpstreamBulk,
    /// One compiled `.ttf` in a build's outgoing directory.
    Result,
}

impl TestSuite {
    pub fn as_str(self) -> &'static str {
        match self {
            TestSuite::Upstream => "upstream",
            TestSuite::Metadata => "metadata",
            TestSuite::UpstreamTtx => "upstream-ttx",
            TestSuite::UpstreamBulk => "upstream-bulk",
            TestSuite::Result => "result",
        }
    }
}

/// Runs one suite against one target and returns its report.
///
/// Implementations never fail: problems are reported inside the returned
/// value so that one broken unit does not hide the results of the others.
pub trait Checker {
    fn check(&self, suite: TestSuite, target: &Path) -> Value;
}

/// Invokes `<checker> --suite <suite> <target>` and parses stdout as YAML.
#[derive(Debug, Clone)]
pub struct ToolChecker {
    command: ToolCommand,
}

impl ToolChecker {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.tool(Tool::Checker)?))
    }
}

impl Checker for ToolChecker {
    fn check(&self, suite: TestSuite, target: &Path) -> Value {
        let cwd = if target.is_dir() {
            target
        } else {
            target.parent().unwrap_or_else(|| Path::new("."))
        };
        let cmd = self
            .command
            .clone()
            .arg("--suite")
            .arg(suite.as_str())
            .arg(target);
        let output = capture(&cmd, cwd);
        if !output.success() {
            let code = output
                .code
                .map_or_else(|| "none".to_string(), |code| code.to_string());
            return failure(
                format!("checker exited with return code {code}"),
                output.combined,
            );
        }
        match serde_yaml::from_str::<Value>(&output.stdout) {
            Ok(report) => report,
            Err(err) => failure(format!("unparsable checker output: {err}"), output.stdout),
        }
    }
}

/// `{error: <message>, output: <text>}`
pub fn failure(message: String, output: String) -> Value {
    let mut report = Mapping::new();
    report.insert(Value::from("error"), Value::from(message));
    report.insert(Value::from("output"), Value::from(output));
    Value::Mapping(report)
}
