//! JSONL log of the external commands modshim runs.
//!
//! Every module command, shell probe and function expansion is appended to
//! `<data dir>/modshim/command_logs/module_commands.jsonl` while `--debug` is
//! active, so a failed discovery can be replayed by hand.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::common::{paths, shell};
use crate::modules::executable::CommandOutput;
use crate::modules::locator::PYTHON_MODE;

const LOG_FILE: &str = "module_commands.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleCommandLog {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ModuleCommandLog {
    fn from_output(command: &str, args: &[String], output: &CommandOutput) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_string(),
            args: args.to_vec(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            exit_code: output.exit_code,
            success: output.success(),
        }
    }

    /// The module query (`show gcc`), when this was a python-mode module call.
    pub fn module_query(&self) -> Option<String> {
        let position = self.args.iter().position(|a| a == PYTHON_MODE)?;
        let query = &self.args[position + 1..];
        (!query.is_empty()).then(|| query.join(" "))
    }

    pub fn command_line(&self) -> String {
        shell::command_line(&self.command, &self.args)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleCommandLogger {
    log_dir: PathBuf,
}

impl ModuleCommandLogger {
    pub fn new() -> Result<Self> {
        Ok(Self {
            log_dir: paths::command_logs_dir()?,
        })
    }

    #[cfg(test)]
    pub fn in_dir(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE)
    }

    /// Record a finished command when debug mode is on; failures only warn.
    pub fn record(command: &str, args: &[String], output: &CommandOutput) {
        if !crate::ui::is_debug_enabled() {
            return;
        }
        let entry = ModuleCommandLog::from_output(command, args, output);
        if let Err(e) = Self::new().and_then(|logger| logger.append(&entry)) {
            eprintln!("Warning: Failed to log module command: {e:#}");
        }
    }

    pub fn append(&self, entry: &ModuleCommandLog) -> Result<()> {
        fs::create_dir_all(&self.log_dir).context("Failed to create command log directory")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file())
            .context("Failed to open command log file")?;
        let line = serde_json::to_string(entry).context("Failed to serialize command log")?;
        writeln!(file, "{line}").context("Failed to write to command log file")
    }

    /// Logged commands, newest first.
    pub fn get_logs(&self) -> Result<Vec<ModuleCommandLog>> {
        let log_file = self.log_file();
        if !log_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&log_file).context("Failed to read command log file")?;
        let mut logs = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Failed to parse command log entry"))
            .collect::<Result<Vec<ModuleCommandLog>>>()?;
        logs.reverse();
        Ok(logs)
    }

    pub fn clear_logs(&self) -> Result<()> {
        let log_file = self.log_file();
        if log_file.exists() {
            fs::remove_file(&log_file).context("Failed to remove command log file")?;
        }
        Ok(())
    }

    pub fn print_recent_logs(&self, limit: usize, failed_only: bool) -> Result<()> {
        use crate::ui::prelude::*;

        let logs: Vec<ModuleCommandLog> = self
            .get_logs()?
            .into_iter()
            .filter(|log| !failed_only || !log.success)
            .take(limit)
            .collect();

        if logs.is_empty() {
            emit(
                Level::Info,
                "logs.empty",
                &format!(
                    "{} No module command logs found. Run with --debug to record them.",
                    char::from(NerdFont::Info)
                ),
                None,
            );
            return Ok(());
        }

        emit(
            Level::Info,
            "logs.list.start",
            &format!("{} Recent module commands:", char::from(NerdFont::List)),
            None,
        );
        separator(false);

        for (i, log) in logs.iter().enumerate() {
            let status = if log.success {
                char::from(NerdFont::Check)
            } else {
                char::from(NerdFont::CrossCircle)
            };
            let mut block = format!(
                "#{} {} {} {}\n  {} {}",
                i + 1,
                status,
                char::from(NerdFont::Clock),
                log.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                char::from(NerdFont::Terminal),
                log.command_line(),
            );
            if let Some(code) = log.exit_code.filter(|_| !log.success) {
                block.push_str(&format!("\n  Exit code: {code}"));
            }
            if !log.stdout.trim().is_empty() {
                block.push_str(&format!(
                    "\n  {} stdout:\n{}",
                    char::from(NerdFont::Upload),
                    indent_text(&log.stdout, 4)
                ));
            }
            if !log.stderr.trim().is_empty() {
                block.push_str(&format!(
                    "\n  {} stderr:\n{}",
                    char::from(NerdFont::Download),
                    indent_text(&log.stderr, 4)
                ));
            }

            let data = serde_json::json!({
                "index": i + 1,
                "timestamp": log.timestamp.to_rfc3339(),
                "command": log.command,
                "args": log.args,
                "query": log.module_query(),
                "success": log.success,
                "exit_code": log.exit_code,
                "stdout": log.stdout,
                "stderr": log.stderr,
            });
            emit(Level::Info, "logs.entry", &block, Some(data));
            separator(true);
        }

        Ok(())
    }
}

fn indent_text(text: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
