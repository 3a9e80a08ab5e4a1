//! Turning a `module` shell function into a standalone executable.
//!
//! Environment Modules and Lmod usually reach the user as a shell function
//! along the lines of
//!
//! ```sh
//! module () { eval `/usr/bin/modulecmd bash $*`; }
//! ```
//!
//! The function only exists inside an initialized shell, so the command it
//! evaluates is recovered from the shell itself: the definition is printed by a
//! login shell, the evaluated command line is cut off before its `bash $*`
//! suffix, and its words are expanded by that same shell.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::common::shell::shell_quote;
use crate::modules::error::ModuleError;
use crate::modules::executable::{CommandOutput, Executable, RunOptions};

/// `eval `cmd``
static EVAL_BACKTICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"eval\s+`([^`]*)`").expect("valid regex"));

/// `eval $(cmd)` or `eval "$(cmd)"`
static EVAL_SUBSTITUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"eval\s+"?\$\(([^()]*)\)"#).expect("valid regex"));

/// The evaluated command up to the shell-name argument that selects bash output.
static SHELL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(.*?)\s+(?:bash|sh)(?:\s.*)?$").expect("valid regex"));

/// Separates login-shell noise from the expanded words.
const WORDS_MARKER: &str = "__modshim_words__";

#[derive(Debug, Clone)]
pub struct ShellFunctionExtractor {
    shell: PathBuf,
    flags: Vec<String>,
    probe_args: Vec<String>,
}

impl ShellFunctionExtractor {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            flags: vec!["-l".to_string(), "-i".to_string()],
            probe_args: vec!["python".to_string(), "list".to_string()],
        }
    }

    /// Flags passed before `-c`; `-l -i` reads the login and interactive init files.
    pub fn with_flags<S: Into<String>>(mut self, flags: impl IntoIterator<Item = S>) -> Self {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments used to check that the extracted command works.
    pub fn with_probe_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    fn run_script(&self, script: &str) -> Result<CommandOutput, ModuleError> {
        let mut shell = Executable::new(&self.shell);
        for flag in &self.flags {
            shell.add_default_arg(flag.as_str());
        }
        shell.add_default_arg("-c");
        shell.run(&[script], &RunOptions::no_fail())
    }

    /// The textual definition of function `name`.
    pub fn definition(&self, name: &str) -> Result<String, ModuleError> {
        let output = self.run_script(&format!("typeset -f {}", shell_quote(name)))?;
        if !output.success() || output.stdout.trim().is_empty() {
            return Err(ModuleError::FunctionNotDefined(name.to_string()));
        }
        Ok(output.stdout)
    }

    /// Expand the words of `command` the way the shell would.
    fn expand_words(&self, command: &str) -> Result<Vec<String>, ModuleError> {
        let script = format!(
            "printf '%s\\0' {WORDS_MARKER}; for word in {command}; do printf '%s\\0' \"$word\"; done"
        );
        let output = self.run_script(&script)?;
        let words = output
            .stdout
            .split_once(&format!("{WORDS_MARKER}\0"))
            .map(|(_, words)| words)
            .unwrap_or_default()
            .split('\0')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Ok(words)
    }

    pub fn extract(&self, name: &str) -> Result<Executable, ModuleError> {
        let definition = self.definition(name)?;
        crate::ui::debug(
            "module.function.definition",
            &format!("Definition of '{name}':\n{}", definition.trim_end()),
        );

        let command = evaluated_command(&definition).ok_or_else(|| {
            ModuleError::UnexpectedFunctionShape {
                name: name.to_string(),
                definition: definition.trim().to_string(),
            }
        })?;

        let words = self.expand_words(&command)?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| ModuleError::FunctionExecutable {
                name: name.to_string(),
                reason: format!("`{command}` expanded to nothing"),
            })?;

        let mut executable =
            Executable::which(program).map_err(|_| ModuleError::FunctionExecutable {
                name: name.to_string(),
                reason: format!("'{program}' is not an executable"),
            })?;
        for arg in args {
            executable.add_default_arg(arg.as_str());
        }

        let probe: Vec<&str> = self.probe_args.iter().map(String::as_str).collect();
        executable
            .probe(&probe)
            .map_err(|e| ModuleError::FunctionExecutable {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(executable)
    }
}

/// The command line a function definition evaluates, without its `bash $*` suffix.
pub fn evaluated_command(definition: &str) -> Option<String> {
    EVAL_BACKTICK
        .captures_iter(definition)
        .chain(EVAL_SUBSTITUTION.captures_iter(definition))
        .find_map(|caps| {
            SHELL_SUFFIX
                .captures(&caps[1])
                .map(|inner| inner[1].trim().to_string())
        })
        .filter(|command| !command.is_empty())
}
