//! Finding the module command once and handing out the cached handle.

use regex::Regex;
use serde::Serialize;
use std::ffi::OsString;
use std::collections::BTreeMap;
use std::sync::{LazyLock, OnceLock};

use crate::common::config::ModshimConfig;
use crate::modules::error::ModuleError;
use crate::modules::executable::{CommandOutput, Executable, RunOptions};
use crate::modules::shell_function::ShellFunctionExtractor;

/// Sub-mode that makes the module tool print python instead of shell code.
pub const PYTHON_MODE: &str = "python";

static LEGACY_TCL_BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Modules Release Tcl 3\.").expect("valid regex"));

static LEGACY_EXEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^exec\s+["']([\w/]*modulescript_[0-9_]+)["'](\n?)$"#).expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandSource {
    SearchPath,
    ShellFunction,
    Custom,
}

/// One way of finding the module command.
pub trait DiscoveryStrategy: Send + Sync {
    fn describe(&self) -> String;
    fn source(&self) -> CommandSource;
    fn discover(&self) -> Result<Executable, ModuleError>;
}

/// `modulecmd` on the search path.
#[derive(Debug, Clone)]
pub struct SearchPathStrategy {
    command: String,
    search_path: Option<OsString>,
    probe_args: Vec<String>,
}

impl SearchPathStrategy {
    pub fn new(command: impl Into<String>, probe_args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            search_path: None,
            probe_args,
        }
    }

    /// Search these directories instead of `$PATH`.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }
}

impl DiscoveryStrategy for SearchPathStrategy {
    fn describe(&self) -> String {
        format!("executable '{}' on the search path", self.command)
    }

    fn source(&self) -> CommandSource {
        CommandSource::SearchPath
    }

    fn discover(&self) -> Result<Executable, ModuleError> {
        let executable = Executable::which_in(&self.command, self.search_path.as_deref())?;
        let probe: Vec<&str> = std::iter::once(PYTHON_MODE)
            .chain(self.probe_args.iter().map(String::as_str))
            .collect();
        executable.probe(&probe)?;
        Ok(executable)
    }
}

/// The `module` function of the user's login shell.
#[derive(Debug, Clone)]
pub struct ShellFunctionStrategy {
    function: String,
    extractor: Option<ShellFunctionExtractor>,
}

impl ShellFunctionStrategy {
    pub fn new(function: impl Into<String>, extractor: Option<ShellFunctionExtractor>) -> Self {
        Self {
            function: function.into(),
            extractor,
        }
    }
}

impl DiscoveryStrategy for ShellFunctionStrategy {
    fn describe(&self) -> String {
        match &self.extractor {
            Some(extractor) => format!(
                "shell function '{}' in {}",
                self.function,
                extractor.shell().display()
            ),
            None => format!("shell function '{}'", self.function),
        }
    }

    fn source(&self) -> CommandSource {
        CommandSource::ShellFunction
    }

    fn discover(&self) -> Result<Executable, ModuleError> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or_else(|| ModuleError::NoShell(self.function.clone()))?;
        extractor.extract(&self.function)
    }
}

/// A located module command, bound to the `python` sub-mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCmd {
    executable: Executable,
    source: CommandSource,
    legacy_tcl: bool,
}

impl ModuleCmd {
    /// Wrap `executable`, appending the `python` sub-mode to its default arguments.
    pub fn new(mut executable: Executable, source: CommandSource) -> Self {
        executable.add_default_arg(PYTHON_MODE);
        Self {
            executable,
            source,
            legacy_tcl: false,
        }
    }

    /// Old Tcl releases print `exec '<script>'`; flag them so their output gets fixed up.
    fn detect_legacy_tcl(&mut self) {
        if let Ok(output) = self.executable.run(&[], &RunOptions::no_fail()) {
            self.legacy_tcl = LEGACY_TCL_BANNER.is_match(&output.stderr);
        }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn source(&self) -> CommandSource {
        self.source
    }

    pub fn is_legacy_tcl(&self) -> bool {
        self.legacy_tcl
    }

    pub fn command_line(&self, args: &[&str]) -> String {
        self.executable.command_line(args)
    }

    pub fn run_with(&self, args: &[&str], options: &RunOptions) -> Result<CommandOutput, ModuleError> {
        let mut output = self.executable.run(args, options)?;
        if self.legacy_tcl {
            output.stdout = legacy_tcl_fixup(&output.stdout);
        }
        Ok(output)
    }

    /// Run a query and return its stdout, failing on a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<String, ModuleError> {
        Ok(self.run_with(args, &RunOptions::default())?.stdout)
    }

    /// `show <module>`; Tcl writes it to stderr and Lmod to stdout, so both are returned.
    pub fn show(&self, module: &str) -> Result<String, ModuleError> {
        Ok(self.run_with(&["show", module], &RunOptions::default())?.combined())
    }
}

/// Rewrite the `exec '<file>'` that Tcl 3.x emits into valid python.
pub fn legacy_tcl_fixup(stdout: &str) -> String {
    LEGACY_EXEC
        .replace(stdout, "exec(open('${1}').read())${2}")
        .into_owned()
}

/// Discovers the module command on first use and caches the outcome.
///
/// Each strategy runs at most once per locator: a failed discovery is
/// remembered and reported again without probing.
pub struct ModuleCmdLocator {
    command: String,
    function: String,
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
    default_env: BTreeMap<String, String>,
    outcome: OnceLock<Option<ModuleCmd>>,
}

impl ModuleCmdLocator {
    pub fn new(
        command: impl Into<String>,
        function: impl Into<String>,
        strategies: Vec<Box<dyn DiscoveryStrategy>>,
    ) -> Self {
        Self {
            command: command.into(),
            function: function.into(),
            strategies,
            default_env: BTreeMap::new(),
            outcome: OnceLock::new(),
        }
    }

    /// Environment variables set for every run of the discovered command.
    pub fn with_default_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.default_env = env;
        self
    }

    /// Search path first, then the login shell's function.
    pub fn from_config(config: &ModshimConfig) -> anyhow::Result<Self> {
        let extractor = config.shell_path()?.map(|shell| {
            let probe = std::iter::once(PYTHON_MODE.to_string()).chain(config.probe_args.clone());
            ShellFunctionExtractor::new(shell)
                .with_flags(config.shell_flags.clone())
                .with_probe_args(probe)
        });

        let mut search_path = SearchPathStrategy::new(&config.command, config.probe_args.clone());
        if let Some(dirs) = config.search_path()? {
            search_path = search_path.with_search_path(dirs);
        }

        let strategies: Vec<Box<dyn DiscoveryStrategy>> = vec![
            Box::new(search_path),
            Box::new(ShellFunctionStrategy::new(&config.function, extractor)),
        ];
        Ok(Self::new(&config.command, &config.function, strategies)
            .with_default_env(config.env.clone()))
    }

    /// The module command, discovering it on the first call.
    ///
    /// Concurrent first calls block until one discovery finishes.
    pub fn get(&self) -> Result<&ModuleCmd, ModuleError> {
        self.outcome
            .get_or_init(|| self.discover())
            .as_ref()
            .ok_or_else(|| ModuleError::NotFound {
                command: self.command.clone(),
                function: self.function.clone(),
            })
    }

    fn discover(&self) -> Option<ModuleCmd> {
        for strategy in &self.strategies {
            match strategy.discover() {
                Ok(mut executable) => {
                    for (key, value) in &self.default_env {
                        executable.add_default_env(key, value);
                    }
                    crate::ui::debug(
                        "module.locate.found",
                        &format!(
                            "Using {} ({})",
                            strategy.describe(),
                            executable.command_line(&[])
                        ),
                    );
                    let mut cmd = ModuleCmd::new(executable, strategy.source());
                    cmd.detect_legacy_tcl();
                    return Some(cmd);
                }
                Err(e) => crate::ui::debug(
                    "module.locate.skip",
                    &format!("No module command from {}: {e}", strategy.describe()),
                ),
            }
        }
        None
    }
}
