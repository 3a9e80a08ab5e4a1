//! The Cray Linux Environment: every compiler comes from the default modules.

use regex::Regex;
use std::env;
use std::path::PathBuf;

use super::{DetectedCompiler, SUITES};
use crate::modules::ModuleError;
use crate::modules::executable::RunOptions;
use crate::modules::locator::ModuleCmd;
use crate::modules::query::join_paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrayOs {
    version: String,
}

impl CrayOs {
    pub const NAME: &'static str = "CLE";

    /// `None` unless `CRAYOS_VERSION` is set.
    pub fn from_env() -> Option<Self> {
        env::var("CRAYOS_VERSION")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|version| Self { version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn find_compilers(
        &self,
        cmd: &ModuleCmd,
        modulepaths: &[PathBuf],
        replace: bool,
    ) -> Result<Vec<DetectedCompiler>, ModuleError> {
        let mod_list = avail_modules(cmd, modulepaths, replace)?;
        Ok(compilers_in_mod_list(&mod_list))
    }
}

/// Terse `avail` listing; `modulepaths` replace or extend `MODULEPATH` for the child only.
pub fn avail_modules(
    cmd: &ModuleCmd,
    modulepaths: &[PathBuf],
    replace: bool,
) -> Result<String, ModuleError> {
    let mut options = RunOptions::default();
    if !modulepaths.is_empty() {
        let extra = join_paths(modulepaths);
        let modulepath = match env::var("MODULEPATH") {
            Ok(current) if !replace && !current.is_empty() => format!("{current}:{extra}"),
            _ => extra,
        };
        options = options.env("MODULEPATH", modulepath);
    }

    // Terse listings go to stderr
    Ok(cmd.run_with(&["avail", "-t"], &options)?.stderr)
}

/// Compilers of every suite whose `PrgEnv` module is in `mod_list`.
pub fn compilers_in_mod_list(mod_list: &str) -> Vec<DetectedCompiler> {
    let mut compilers = Vec::new();
    for suite in &SUITES {
        let has_suite = mod_list
            .lines()
            .any(|line| line.starts_with(&format!("{}/", suite.prg_env)));
        if !has_suite {
            continue;
        }

        let Ok(versions) = Regex::new(&format!(r"(?m)^{}/([\d.]+)", regex::escape(suite.compiler)))
        else {
            continue;
        };
        for caps in versions.captures_iter(mod_list) {
            compilers.push(DetectedCompiler::new(suite, suite.compiler, &caps[1]));
        }
    }
    compilers
}
