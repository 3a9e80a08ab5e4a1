use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    #[error(
        "modshim requires '{command}' executable or a defined shell function '{function}'. \
         Make sure {command} is in your PATH or the function '{function}' is defined in your \
         login shell"
    )]
    NotFound { command: String, function: String },

    #[error("no shell found to inspect function '{0}' (set SHELL or `shell` in the config)")]
    NoShell(String),

    #[error("shell function '{0}' is not defined")]
    FunctionNotDefined(String),

    #[error("failed to determine the module command from shell function '{name}': {definition}")]
    UnexpectedFunctionShape { name: String, definition: String },

    #[error("failed to create executable based on shell function '{name}': {reason}")]
    FunctionExecutable { name: String, reason: String },

    #[error("'{0}' was not found on the search path")]
    ExecutableNotFound(String),

    #[error("module command probe `{command}` failed: {stderr}")]
    ProbeFailed { command: String, stderr: String },

    #[error("module command `{command}` failed with {}: {stderr}", exit_status(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cannot parse module line '{line}': {reason}")]
    Parse { line: String, reason: String },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

impl ModuleError {
    pub fn parse(line: &str, reason: impl Into<String>) -> Self {
        ModuleError::Parse {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Discovery errors mean "no module support here", not a broken invocation.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(
            self,
            ModuleError::NotFound { .. }
                | ModuleError::NoShell(_)
                | ModuleError::FunctionNotDefined(_)
                | ModuleError::UnexpectedFunctionShape { .. }
                | ModuleError::FunctionExecutable { .. }
                | ModuleError::ExecutableNotFound(_)
                | ModuleError::ProbeFailed { .. }
        )
    }
}
