use anyhow::Result;
use std::io::Write;
use std::process::{Command, Stdio};

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Parse every stdout line as a JSON event.
    pub fn json_events(&self) -> Result<Vec<serde_json::Value>> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Ok(serde_json::from_str(l)?))
            .collect()
    }
}

fn modshim_command(env: &TestEnvironment, args: &[&str], extra_env: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_modshim"));
    cmd.args(args)
        .current_dir(env.path())
        .env_clear()
        .env("PATH", format!("{}:/usr/bin:/bin", env.bin_dir().display()))
        .env("HOME", env.home())
        .env("XDG_CONFIG_HOME", env.config_home())
        .env("XDG_DATA_HOME", env.data_home())
        .env("SHELL", env.shell());
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    cmd
}

fn collect(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

pub fn run_modshim_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    run_modshim_command_with_env(env, args, &[])
}

pub fn run_modshim_command_with_env(
    env: &TestEnvironment,
    args: &[&str],
    extra_env: &[(&str, &str)],
) -> Result<CommandOutput> {
    let output = modshim_command(env, args, extra_env)
        .stdin(Stdio::null())
        .output()?;
    Ok(collect(output))
}

pub fn run_modshim_with_stdin(
    env: &TestEnvironment,
    args: &[&str],
    stdin: &str,
) -> Result<CommandOutput> {
    let mut child = modshim_command(env, args, &[])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut input) = child.stdin.take() {
        input.write_all(stdin.as_bytes())?;
    }
    Ok(collect(child.wait_with_output()?))
}
