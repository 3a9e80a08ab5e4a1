use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;

use super::env_guard::EnvOverride;
use super::load::load_module;
use super::locator::ModuleCmdLocator;
use super::logging::ModuleCommandLogger;
use super::parser::{ModuleLine, parse_output};
use super::query::get_path_from_module;
use crate::common::config::ModshimConfig;
use crate::common::shell::shell_quote;
use crate::ui::prelude::*;

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Module to inspect, e.g. `gcc/8.1.0`
    pub module: String,
    /// Search these directories for module files instead of MODULEPATH
    #[arg(long = "modulepath", value_name = "DIR")]
    pub modulepath: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Module to load
    pub module: String,
    /// Print `export`/`unset` commands instead of the operations
    #[arg(long)]
    pub export: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Number of entries to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
    /// Only show commands that failed
    #[arg(long)]
    pub failed: bool,
    /// Delete the command log
    #[arg(long)]
    pub clear: bool,
}

fn format_line(line: &ModuleLine) -> String {
    match &line.value {
        Some(value) => format!("{} {} {}", line.operation, line.variable, value),
        None => format!("{} {}", line.operation, line.variable),
    }
}

fn emit_lines(code: &str, lines: &[ModuleLine]) {
    if matches!(get_output_format(), OutputFormat::Json) {
        emit(
            Level::Info,
            code,
            &format!("{} operations", lines.len()),
            Some(json!({ "lines": lines })),
        );
        return;
    }
    for line in lines {
        emit(Level::Info, code, &format_line(line), None);
    }
}

pub fn handle_locate(locator: &ModuleCmdLocator) -> Result<()> {
    let cmd = locator.get()?;
    let data = json!({
        "program": cmd.executable().program(),
        "default_args": cmd.executable().default_args(),
        "source": cmd.source(),
        "legacy_tcl": cmd.is_legacy_tcl(),
    });
    emit(
        Level::Success,
        "module.locate",
        &format!(
            "{} Module command: {}",
            char::from(NerdFont::Check),
            cmd.command_line(&[])
        ),
        Some(data),
    );
    Ok(())
}

pub fn handle_show(locator: &ModuleCmdLocator, module: &str) -> Result<()> {
    let cmd = locator.get()?;
    let text = cmd.show(module)?;
    let lines = parse_output(&text).with_context(|| format!("parsing `show {module}`"))?;
    emit_lines("module.show.line", &lines);
    Ok(())
}

pub fn handle_path(locator: &ModuleCmdLocator, config: &ModshimConfig, args: &PathArgs) -> Result<()> {
    let cmd = locator.get()?;
    let modulepath = (!args.modulepath.is_empty()).then_some(args.modulepath.as_slice());
    match get_path_from_module(cmd, &args.module, &config.prefix, modulepath)? {
        Some(prefix) => emit(
            Level::Success,
            "module.path.found",
            &prefix.display().to_string(),
            Some(json!({ "module": args.module, "path": prefix })),
        ),
        None => emit(
            Level::Warn,
            "module.path.none",
            &format!(
                "{} Module '{}' does not point at an install prefix",
                char::from(NerdFont::Warning),
                args.module
            ),
            Some(json!({ "module": args.module, "path": null })),
        ),
    }
    Ok(())
}

/// Parse module lines from `file`, or stdin when it is `None` or `-`.
pub fn handle_parse(file: Option<&PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading module output from stdin")?;
            text
        }
    };
    emit_lines("module.parse.line", &parse_output(&text)?);
    Ok(())
}

pub fn handle_avail(locator: &ModuleCmdLocator, query: &[String]) -> Result<()> {
    let cmd = locator.get()?;
    let mut args = vec!["avail"];
    args.extend(query.iter().map(String::as_str));
    let output = cmd.run_with(&args, &Default::default())?;
    let listing = output.combined();

    let data = json!({
        "modules": listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.ends_with(':'))
            .collect::<Vec<_>>(),
    });
    emit(
        Level::Info,
        "module.avail",
        listing.trim_end(),
        Some(data),
    );
    Ok(())
}

pub fn handle_load(locator: &ModuleCmdLocator, args: &LoadArgs) -> Result<()> {
    let cmd = locator.get()?;
    let lines = load_module(cmd, &args.module)?;
    if !args.export {
        emit_lines("module.load.line", &lines);
        return Ok(());
    }

    // Compute the final values by applying the changes in place, then restore
    let guard = EnvOverride::apply_mutations(&lines);
    let script: Vec<String> = guard
        .keys()
        .map(|key| match std::env::var(key) {
            Ok(value) => format!("export {key}={}", shell_quote(&value)),
            Err(_) => format!("unset {key}"),
        })
        .collect();
    drop(guard);

    emit(
        Level::Info,
        "module.load.export",
        &script.join("\n"),
        Some(json!({ "module": args.module, "script": script })),
    );
    Ok(())
}

pub fn handle_logs(args: &LogsArgs) -> Result<()> {
    let logger = ModuleCommandLogger::new()?;
    if args.clear {
        logger.clear_logs()?;
        emit(
            Level::Success,
            "logs.cleared",
            &format!("{} Cleared module command logs", char::from(NerdFont::Check)),
            None,
        );
        return Ok(());
    }
    logger.print_recent_logs(args.limit, args.failed)
}
