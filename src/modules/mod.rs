//! Interoperability with environment-module tools (Environment Modules, Lmod).
//!
//! A [`locator::ModuleCmdLocator`] finds the module command once, either as an
//! executable or through the user's `module` shell function. The resulting
//! [`locator::ModuleCmd`] always runs in `python` mode, so module tools print
//! the changes they would make instead of making them; [`parser`] turns that
//! text into [`parser::ModuleLine`]s.

pub mod cli;
pub mod env_guard;
pub mod error;
pub mod executable;
pub mod load;
pub mod locator;
pub mod logging;
pub mod parser;
pub mod query;
pub mod shell_function;

pub use error::ModuleError;
pub use locator::{ModuleCmd, ModuleCmdLocator};
pub use parser::{EnvironmentMutationList, ModuleLine, Operation};
