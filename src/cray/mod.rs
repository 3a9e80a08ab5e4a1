//! Compiler discovery on Cray systems, where compilers come from modules.

pub mod cli;
pub mod cnl;
pub mod frontend;
pub mod os;

use serde::Serialize;

/// A `PrgEnv-*` programming environment and the compiler module it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSuite {
    pub prg_env: &'static str,
    pub compiler: &'static str,
}

pub const SUITES: [CompilerSuite; 4] = [
    CompilerSuite {
        prg_env: "PrgEnv-gnu",
        compiler: "gcc",
    },
    CompilerSuite {
        prg_env: "PrgEnv-intel",
        compiler: "intel",
    },
    CompilerSuite {
        prg_env: "PrgEnv-cray",
        compiler: "cce",
    },
    CompilerSuite {
        prg_env: "PrgEnv-pgi",
        compiler: "pgi",
    },
];

/// Wrapper executables every Cray programming environment provides.
pub const WRAPPERS: [&str; 3] = ["cc", "CC", "ftn"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedCompiler {
    pub name: String,
    pub version: String,
    /// Executables that invoke this compiler once its modules are loaded
    pub wrappers: Vec<String>,
    /// Modules to load, in order, to use this compiler
    pub modules: Vec<String>,
}

impl DetectedCompiler {
    pub fn new(suite: &CompilerSuite, name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            wrappers: WRAPPERS.iter().map(|w| w.to_string()).collect(),
            modules: vec![suite.prg_env.to_string(), format!("{name}/{version}")],
        }
    }

    /// `gcc@8.1.0`
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}
