//! A thin handle around an external program.
//!
//! [`Executable`] binds a program path to default arguments and environment
//! overrides, runs it with captured output and reports non-zero exits as
//! [`ModuleError::CommandFailed`] unless the caller opts out.

use duct::cmd;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::common::shell;
use crate::modules::error::ModuleError;
use crate::modules::logging::ModuleCommandLogger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    program: PathBuf,
    default_args: Vec<String>,
    default_env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr; Tcl modulecmd writes `show` and `avail` to stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

/// Per-invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    fail_on_error: bool,
    /// `None` removes the variable from the child's environment.
    env: BTreeMap<String, Option<String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fail_on_error: true,
            env: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    /// Return the exit status in the output instead of failing on it.
    pub fn no_fail() -> Self {
        Self {
            fail_on_error: false,
            ..Self::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), Some(value.into()));
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env.insert(key.into(), None);
        self
    }
}

impl Executable {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            default_args: Vec::new(),
            default_env: BTreeMap::new(),
        }
    }

    /// Find `name` on the current `PATH`.
    pub fn which(name: &str) -> Result<Self, ModuleError> {
        which::which(name)
            .map(Self::new)
            .map_err(|_| ModuleError::ExecutableNotFound(name.to_string()))
    }

    /// Find `name` on an explicit search path (`None` means the current `PATH`).
    pub fn which_in(name: &str, search_path: Option<&OsStr>) -> Result<Self, ModuleError> {
        let Some(search_path) = search_path else {
            return Self::which(name);
        };
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(name, Some(search_path), cwd)
            .map(Self::new)
            .map_err(|_| ModuleError::ExecutableNotFound(name.to_string()))
    }

    pub fn add_default_arg(&mut self, arg: impl Into<String>) {
        self.default_args.push(arg.into());
    }

    pub fn add_default_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.default_env.insert(key.into(), value.into());
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn default_args(&self) -> &[String] {
        &self.default_args
    }

    /// The full command line this executable would run for `args`.
    pub fn command_line(&self, args: &[&str]) -> String {
        let all: Vec<&str> = self
            .default_args
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied())
            .collect();
        shell::command_line(&self.program.to_string_lossy(), &all)
    }

    pub fn run(&self, args: &[&str], options: &RunOptions) -> Result<CommandOutput, ModuleError> {
        let mut all_args = self.default_args.clone();
        all_args.extend(args.iter().map(|a| a.to_string()));

        let mut expr = cmd(&self.program, &all_args)
            .stdin_null()
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        for (key, value) in &self.default_env {
            expr = expr.env(key, value);
        }
        for (key, value) in &options.env {
            expr = match value {
                Some(value) => expr.env(key, value),
                None => expr.env_remove(key),
            };
        }

        let raw = expr.run().map_err(|source| ModuleError::Spawn {
            command: self.command_line(args),
            source,
        })?;

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&raw.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&raw.stderr).into_owned(),
            exit_code: raw.status.code(),
        };

        ModuleCommandLogger::record(&self.program.to_string_lossy(), &all_args, &output);

        if options.fail_on_error && !output.success() {
            return Err(ModuleError::CommandFailed {
                command: self.command_line(args),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Run a harmless query and require a zero exit status.
    pub fn probe(&self, args: &[&str]) -> Result<(), ModuleError> {
        let output = self.run(args, &RunOptions::no_fail())?;
        if output.success() {
            Ok(())
        } else {
            Err(ModuleError::ProbeFailed {
                command: self.command_line(args),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}
