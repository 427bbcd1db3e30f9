//! External command execution.
//!
//! Every tool the pipeline drives goes through this module. Commands are
//! argument vectors, never shell strings: family names, file names and clone
//! URLs come from project configuration and are passed through untouched.
//!
//! Two variants exist:
//! - [`run`] streams stdout/stderr into the build log while the process runs
//!   and turns a spawn failure or non-zero exit into a [`CommandError`];
//! - [`capture`] collects the combined output and never fails, for read-only
//!   queries where the caller decides what a failure means.
//!
//! Both echo the invocation to the console trace (`tracing`).

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::log::{BuildLog, LogError, ERROR_PREFIX};

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Build a command from a configured argv prefix such as
    /// `["python", "scripts/subset.py"]`.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, rest)) = argv.split_first() else {
            bail!("tool command is empty");
        };
        Ok(Self::new(program).args(rest))
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(cwd).stdin(Stdio::null());
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

/// Render an argument for display only; nothing is ever run through a shell.
fn quote(value: &OsStr) -> String {
    let text = value.to_string_lossy();
    let plain = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+:,@%".contains(c));
    if plain {
        text.into_owned()
    } else {
        format!("'{}'", text.replace('\'', r"'\''"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with return code {}", describe_code(.code))]
    Exit { command: String, code: Option<i32> },
    #[error("waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Log(#[from] LogError),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Stdout,
    Stderr,
}

/// Run `cmd` in `cwd`, streaming its output into `log`.
///
/// Stdout lines are written as-is, stderr lines with the `Error: ` prefix.
/// A spawn failure or non-zero exit writes a `Fatal:` line and returns an
/// error that aborts the calling stage.
pub fn run(cmd: &ToolCommand, cwd: &Path, log: &mut BuildLog) -> Result<(), CommandError> {
    run_inner(cmd, cwd, log, None)
}

/// Like [`run`], but stdout is appended to `stdout_path` instead of the log.
pub fn run_appending_stdout(
    cmd: &ToolCommand,
    cwd: &Path,
    log: &mut BuildLog,
    stdout_path: &Path,
) -> Result<(), CommandError> {
    let file = match File::options().create(true).append(true).open(stdout_path) {
        Ok(file) => file,
        Err(source) => {
            let rendered = format!("{cmd} >> {}", stdout_path.display());
            log.write(&format!("\n$ {rendered}\n"))?;
            log.write(&format!("Fatal: could not open output file: {source}\n"))?;
            return Err(CommandError::Spawn {
                command: rendered,
                source,
            });
        }
    };
    run_inner(cmd, cwd, log, Some(file))
}

fn run_inner(
    cmd: &ToolCommand,
    cwd: &Path,
    log: &mut BuildLog,
    stdout_file: Option<File>,
) -> Result<(), CommandError> {
    let rendered = cmd.to_string();
    info!(cwd = %cwd.display(), "{rendered}");
    log.write(&format!("\n$ {rendered}\n"))?;

    let mut command = cmd.command(cwd);
    command.stderr(Stdio::piped());
    match stdout_file {
        Some(file) => command.stdout(Stdio::from(file)),
        None => command.stdout(Stdio::piped()),
    };

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(source) => {
            log.write(&format!("Fatal: could not start command: {source}\n"))?;
            return Err(CommandError::Spawn {
                command: rendered,
                source,
            });
        }
    };

    let lines = pump_output(&mut child);
    let mut log_failure = None;
    for (channel, bytes) in lines {
        let written = match channel {
            Channel::Stdout => log.write_bytes("", &bytes),
            Channel::Stderr => {
                warn!("{}", String::from_utf8_lossy(&bytes).trim_end());
                log.write_bytes(ERROR_PREFIX, &bytes)
            }
        };
        if let Err(err) = written {
            let _ = child.kill();
            log_failure = Some(err);
            break;
        }
    }

    let status = child.wait().map_err(|source| CommandError::Wait {
        command: rendered.clone(),
        source,
    })?;
    if let Some(err) = log_failure {
        return Err(err.into());
    }

    if !status.success() {
        log.write(&format!(
            "Fatal: Exited with return code {}\n",
            describe_code(&status.code())
        ))?;
        return Err(CommandError::Exit {
            command: rendered,
            code: status.code(),
        });
    }
    Ok(())
}

/// Result of a [`capture`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// Exit code; `None` if the process could not be started or was killed.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Stdout and stderr interleaved in arrival order.
    pub combined: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `cmd` in `cwd` and return its output without raising.
///
/// A spawn failure is reported like a non-zero exit: `code` is `None` and the
/// error text is placed in `stderr`/`combined`.
pub fn capture(cmd: &ToolCommand, cwd: &Path) -> Captured {
    let rendered = cmd.to_string();
    info!(cwd = %cwd.display(), "{rendered}");

    let mut command = cmd.command(cwd);
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            let message = format!("failed to start `{rendered}`: {err}\n");
            return Captured {
                code: None,
                stdout: String::new(),
                stderr: message.clone(),
                combined: message,
            };
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut combined = Vec::new();
    for (channel, bytes) in pump_output(&mut child) {
        match channel {
            Channel::Stdout => stdout.extend_from_slice(&bytes),
            Channel::Stderr => stderr.extend_from_slice(&bytes),
        }
        combined.extend_from_slice(&bytes);
    }

    let code = match child.wait() {
        Ok(status) => status.code(),
        Err(err) => {
            combined.extend_from_slice(format!("waiting for `{rendered}`: {err}\n").as_bytes());
            None
        }
    };

    Captured {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        combined: String::from_utf8_lossy(&combined).into_owned(),
    }
}

/// Read the child's piped stdout and stderr concurrently, one thread per
/// stream, delivering lines in arrival order. The receiver is exhausted once
/// both streams hit EOF.
fn pump_output(child: &mut Child) -> Receiver<(Channel, Vec<u8>)> {
    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Channel::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Channel::Stderr, tx.clone());
    }
    rx
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    channel: Channel,
    tx: mpsc::Sender<(Channel, Vec<u8>)>,
) {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send((channel, line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
