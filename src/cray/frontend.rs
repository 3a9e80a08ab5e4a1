//! Login and service nodes, used as a plain Linux without the Cray wrappers.

use std::env;
use std::path::PathBuf;

use crate::modules::ModuleError;
use crate::modules::env_guard::EnvOverride;
use crate::modules::load::unload_module;
use crate::modules::locator::ModuleCmd;

/// Compiler executables looked for on a frontend.
pub const FRONTEND_COMPILERS: [&str; 10] = [
    "gcc", "g++", "gfortran", "icc", "icpc", "ifort", "pgcc", "pgc++", "pgfortran", "clang",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrayFrontend;

impl CrayFrontend {
    /// The programming environment module `PE_ENV` says is loaded.
    pub fn loaded_prg_env() -> Option<String> {
        env::var("PE_ENV")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|pe_env| format!("PrgEnv-{}", pe_env.to_lowercase()))
    }

    /// Run `discover` with the Cray compiler wrappers disabled.
    ///
    /// With a `PrgEnv-*` module loaded the wrappers would be detected as Cray
    /// compilers, so `PE_ENV` is removed and the module's unload script is
    /// applied until `discover` returns.
    pub fn without_wrappers<T, E>(
        &self,
        cmd: Option<&ModuleCmd>,
        discover: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<ModuleError>,
    {
        let mut guard = EnvOverride::new();
        if let Some(prg_env) = Self::loaded_prg_env() {
            if let Some(cmd) = cmd {
                crate::ui::debug(
                    "cray.frontend.unload",
                    &format!("Unloading {prg_env} for frontend discovery"),
                );
                for line in unload_module(cmd, &prg_env)? {
                    guard.apply(&line);
                }
            }
            guard.remove("PE_ENV");
        }

        discover()
    }

    /// Compiler executables visible on `PATH` once the wrappers are disabled.
    pub fn find_compilers(&self, cmd: Option<&ModuleCmd>) -> Result<Vec<PathBuf>, ModuleError> {
        self.without_wrappers(cmd, || {
            Ok(FRONTEND_COMPILERS
                .iter()
                .filter_map(|name| which::which(name).ok())
                .collect())
        })
    }
}
