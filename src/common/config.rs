//! modshim configuration
//!
//! Settings live in a TOML file at `~/.config/modshim/config.toml` (or the file
//! named by `--config` / `$MODSHIM_CONFIG`). Every key is optional: a missing
//! file, or a file that only sets a few keys, falls back to the defaults that
//! match a stock Environment Modules / Lmod installation.
//!
//! ```toml
//! command = "modulecmd"
//! search_path = "/opt/modules/default/bin:/usr/share/Modules/libexec"
//! function = "module"
//! shell = "$HOME/bin/bash"
//! shell_flags = ["-l", "-i"]
//! probe_args = ["list"]
//!
//! [env]
//! MODULES_COLOR = "never"
//!
//! [[prefix.library]]
//! variable = "LD_LIBRARY_PATH"
//! segment = "lib"
//!
//! [[prefix.binary]]
//! variable = "PATH"
//! segment = "bin"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{paths, shell};
use crate::modules::query::PrefixRules;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModshimConfig {
    /// Executable looked up on the PATH
    pub command: String,
    /// Directories searched for `command` instead of PATH
    pub search_path: Option<String>,
    /// Shell function inspected when no executable is found
    pub function: String,
    /// Shell used to inspect the function; `$SHELL` when unset
    pub shell: Option<String>,
    /// Flags that make the shell read the user's login and interactive init files
    pub shell_flags: Vec<String>,
    /// Query used to validate a candidate module command
    pub probe_args: Vec<String>,
    /// Per-variable rules for deriving an install prefix from a module
    pub prefix: PrefixRules,
    /// Variables set for every module command run
    pub env: BTreeMap<String, String>,
}

impl Default for ModshimConfig {
    fn default() -> Self {
        Self {
            command: "modulecmd".to_string(),
            search_path: None,
            function: "module".to_string(),
            shell: None,
            shell_flags: vec!["-l".to_string(), "-i".to_string()],
            probe_args: vec!["list".to_string()],
            prefix: PrefixRules::default(),
            env: BTreeMap::new(),
        }
    }
}

impl ModshimConfig {
    /// The shell to inspect functions with, with `~` and `$VAR` expanded.
    pub fn shell_path(&self) -> Result<Option<PathBuf>> {
        match &self.shell {
            Some(raw) => {
                let expanded = shellexpand::full(raw)
                    .with_context(|| format!("expanding shell path '{raw}'"))?;
                Ok(Some(PathBuf::from(expanded.as_ref())))
            }
            None => Ok(shell::user_shell()),
        }
    }

    /// `search_path` with `~` and `$VAR` expanded.
    pub fn search_path(&self) -> Result<Option<String>> {
        self.search_path
            .as_deref()
            .map(|raw| {
                shellexpand::full(raw)
                    .map(|expanded| expanded.into_owned())
                    .with_context(|| format!("expanding search path '{raw}'"))
            })
            .transpose()
    }
}

/// Resolve which config file to read.
///
/// Returns the path and whether it was requested explicitly.
fn config_location(explicit: Option<&Path>) -> Result<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(path) = std::env::var(paths::CONFIG_ENV)
        && !path.is_empty()
    {
        return Ok((PathBuf::from(path), true));
    }
    Ok((paths::default_config_file()?, false))
}

pub fn load_config(explicit: Option<&Path>) -> Result<ModshimConfig> {
    let (config_path, required) = config_location(explicit)?;

    if !config_path.exists() {
        if required {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }
        return Ok(ModshimConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;

    parse_config(&content).with_context(|| format!("Failed to parse config {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<ModshimConfig> {
    Ok(toml::from_str(content)?)
}
