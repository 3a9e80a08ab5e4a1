use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use serde_json::json;
use std::path::PathBuf;

use super::DetectedCompiler;
use super::cnl::Cnl;
use super::frontend::CrayFrontend;
use super::os::CrayOs;
use crate::modules::locator::ModuleCmdLocator;
use crate::ui::prelude::*;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrayTarget {
    /// Cray Linux Environment (default PrgEnv modules)
    Cle,
    /// Compute Node Linux (every available compiler module)
    Cnl,
    /// Login nodes, with the compiler wrappers disabled
    Frontend,
}

#[derive(Args, Debug, Clone)]
pub struct CompilersArgs {
    #[arg(long, value_enum, default_value = "cle")]
    pub target: CrayTarget,
    /// Additional directories holding module files
    #[arg(long = "modulepath", value_name = "DIR")]
    pub modulepath: Vec<PathBuf>,
    /// Replace MODULEPATH with --modulepath instead of extending it (cle only)
    #[arg(long)]
    pub replace: bool,
}

fn compiler_table(compilers: &[DetectedCompiler]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Compiler", "Wrappers", "Modules"]);
    for compiler in compilers {
        table.add_row(vec![
            compiler.label(),
            compiler.wrappers.join(" "),
            compiler.modules.join(" "),
        ]);
    }
    table
}

fn emit_compilers(target: &str, compilers: &[DetectedCompiler]) {
    if compilers.is_empty() {
        emit(
            Level::Warn,
            "cray.compilers.none",
            &format!("{} No compilers found for {target}", char::from(NerdFont::Warning)),
            Some(json!({ "target": target, "compilers": [] })),
        );
        return;
    }
    emit(
        Level::Info,
        "cray.compilers",
        &compiler_table(compilers).to_string(),
        Some(json!({ "target": target, "compilers": compilers })),
    );
}

pub fn handle_compilers(locator: &ModuleCmdLocator, args: &CompilersArgs) -> Result<()> {
    match args.target {
        CrayTarget::Cle => {
            let Some(os) = CrayOs::from_env() else {
                bail!("CRAYOS_VERSION is not set; this is not a Cray Linux Environment");
            };
            let compilers = os.find_compilers(locator.get()?, &args.modulepath, args.replace)?;
            emit_compilers(&format!("{} {}", CrayOs::NAME, os.version()), &compilers);
        }
        CrayTarget::Cnl => {
            let compilers = Cnl.find_compilers(locator.get()?, &args.modulepath)?;
            emit_compilers(&format!("{} {}", Cnl::NAME, Cnl::VERSION), &compilers);
        }
        CrayTarget::Frontend => {
            // Without a module command there is nothing to unload
            let cmd = match locator.get() {
                Ok(cmd) => Some(cmd),
                Err(e) if e.is_discovery_failure() => None,
                Err(e) => return Err(e.into()),
            };
            let found = CrayFrontend.find_compilers(cmd)?;
            let message = if found.is_empty() {
                format!("{} No compilers on PATH", char::from(NerdFont::Warning))
            } else {
                found
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            emit(
                Level::Info,
                "cray.frontend.compilers",
                &message,
                Some(json!({ "compilers": found })),
            );
        }
    }
    Ok(())
}
