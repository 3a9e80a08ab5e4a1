mod common;
mod cray;
mod modules;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::common::config::load_config;
use crate::cray::cli::{CompilersArgs, handle_compilers};
use crate::modules::ModuleCmdLocator;
use crate::modules::cli::{LoadArgs, LogsArgs, PathArgs};
use crate::ui::prelude::*;

/// modshim: locate, run and parse environment-module commands
#[derive(Parser, Debug)]
#[command(name = "modshim", author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode (also records every module command)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file (defaults to ~/.config/modshim/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the module command and show how it is invoked
    Locate,
    /// Show the environment operations of a module
    Show {
        /// Module to show
        module: String,
    },
    /// Print the install prefix a module points at
    Path(PathArgs),
    /// Parse module output from a file or stdin
    Parse {
        /// File to parse; stdin when omitted or `-`
        file: Option<PathBuf>,
    },
    /// List available modules
    Avail {
        /// Arguments passed on to `avail`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Show what loading a module changes, unloading conflicting modules first
    Load(LoadArgs),
    /// Detect compilers provided by Cray programming environments
    Compilers(CompilersArgs),
    /// Show or clear the module command log
    Logs(LogsArgs),
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let locator = ModuleCmdLocator::from_config(&config)?;

    match &cli.command {
        Commands::Locate => modules::cli::handle_locate(&locator),
        Commands::Show { module } => modules::cli::handle_show(&locator, module),
        Commands::Path(args) => modules::cli::handle_path(&locator, &config, args),
        Commands::Parse { file } => modules::cli::handle_parse(file.as_ref()),
        Commands::Avail { query } => modules::cli::handle_avail(&locator, query),
        Commands::Load(args) => modules::cli::handle_load(&locator, args),
        Commands::Compilers(args) => handle_compilers(&locator, args),
        Commands::Logs(args) => modules::cli::handle_logs(args),
    }
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);
    ui::debug("modshim.debug", "Debug mode is on");

    if let Err(e) = run(&cli) {
        emit(
            Level::Error,
            "modshim.error",
            &format!("{} {e:#}", char::from(NerdFont::CrossCircle)),
            None,
        );
        std::process::exit(1);
    }
}
