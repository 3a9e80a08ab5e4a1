//! Compute Node Linux, the OS of Cray XC compute nodes.

use regex::Regex;
use std::path::PathBuf;

use super::{DetectedCompiler, SUITES};
use crate::modules::ModuleError;
use crate::modules::env_guard::EnvOverride;
use crate::modules::locator::ModuleCmd;
use crate::modules::query::join_paths;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cnl;

impl Cnl {
    pub const NAME: &'static str = "CNL";
    pub const VERSION: &'static str = "10";

    /// Every `<compiler>/<version>` module `avail` lists, suite by suite.
    ///
    /// `paths` are searched for module files instead of `MODULEPATH`.
    pub fn find_compilers(
        &self,
        cmd: &ModuleCmd,
        paths: &[PathBuf],
    ) -> Result<Vec<DetectedCompiler>, ModuleError> {
        let mut compilers = Vec::new();
        for suite in &SUITES {
            let _modulepath = (!paths.is_empty())
                .then(|| EnvOverride::set_var("MODULEPATH", format!(":{}", join_paths(paths))));

            let output = cmd.run_with(&["avail", suite.compiler], &Default::default())?;
            let Ok(versions) =
                Regex::new(&format!(r"({})/([\d.]+\d)", regex::escape(suite.compiler)))
            else {
                continue;
            };
            for caps in versions.captures_iter(&output.combined()) {
                compilers.push(DetectedCompiler::new(suite, &caps[1], &caps[2]));
            }
        }
        Ok(compilers)
    }
}

impl std::fmt::Display for Cnl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::NAME)
    }
}
