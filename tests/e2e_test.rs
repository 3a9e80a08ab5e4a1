mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;

#[test]
fn test_locate_prefers_modulecmd_on_path() -> Result<()> {
    let env = TestEnvironment::new()?;
    let modulecmd = env.install_modulecmd()?;
    env.set_shell_init("module () { eval `/bin/false bash $*`; }")?;

    let output = utils::run_modshim_command(&env, &["--output", "json", "locate"])?;
    assert_eq!(output.exit_code, 0, "locate failed: {}", output.stderr);

    let events = output.json_events()?;
    let data = &events[0]["data"];
    assert_eq!(data["source"], "search-path");
    assert_eq!(data["program"], modulecmd.display().to_string());
    assert_eq!(data["default_args"], serde_json::json!(["python"]));
    Ok(())
}

#[test]
fn test_locate_falls_back_to_shell_function() -> Result<()> {
    let env = TestEnvironment::new()?;
    let hidden = env.tools_dir().join("modulecmd");
    env.write_executable(&hidden, common::FAKE_MODULECMD)?;
    env.set_shell_init(&format!(
        "TOOLS={}\nmodule () {{ eval `$TOOLS/modulecmd bash $*`; }}",
        env.tools_dir().display()
    ))?;

    let output = utils::run_modshim_command(&env, &["--output", "json", "locate"])?;
    assert_eq!(output.exit_code, 0, "locate failed: {}", output.stderr);
    let events = output.json_events()?;
    assert_eq!(events[0]["data"]["source"], "shell-function");
    assert_eq!(events[0]["data"]["program"], hidden.display().to_string());

    let output = utils::run_modshim_command(&env, &["path", "gcc/8.1.0"])?;
    assert_eq!(output.exit_code, 0, "path failed: {}", output.stderr);
    assert!(output.stdout.contains("/opt/gcc/8.1.0"));
    Ok(())
}

#[test]
fn test_missing_module_command_is_fatal() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = utils::run_modshim_command(&env, &["locate"])?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("requires 'modulecmd' executable"),
        "unexpected stderr: {}",
        output.stderr
    );
    Ok(())
}

#[test]
fn test_path_query() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.install_modulecmd()?;

    let output = utils::run_modshim_command(&env, &["path", "gcc/8.1.0"])?;
    assert_eq!(output.exit_code, 0, "path failed: {}", output.stderr);
    assert!(output.stdout.contains("/opt/gcc/8.1.0"));

    let output = utils::run_modshim_command(&env, &["--output", "json", "path", "empty"])?;
    assert_eq!(output.exit_code, 0, "path failed: {}", output.stderr);
    assert!(output.stderr.contains("\"code\":\"module.path.none\""));

    let output = utils::run_modshim_command(&env, &["path", "nosuchmodule"])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("Unable to locate a modulefile"));
    Ok(())
}

#[test]
fn test_show_lists_operations() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.install_modulecmd()?;

    let output = utils::run_modshim_command(&env, &["show", "gcc/8.1.0"])?;
    assert_eq!(output.exit_code, 0, "show failed: {}", output.stderr);
    assert!(
        output
            .stdout
            .contains("prepend-path LD_LIBRARY_PATH /opt/gcc/8.1.0/lib64")
    );
    assert!(output.stdout.contains("prepend-path PATH /opt/gcc/8.1.0/bin"));
    assert!(!output.stdout.contains("-----"));
    Ok(())
}

#[test]
fn test_load_export_script() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.install_modulecmd()?;

    let output = utils::run_modshim_command(&env, &["load", "--export", "gcc/8.1.0"])?;
    assert_eq!(output.exit_code, 0, "load failed: {}", output.stderr);
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "unset INTEL_LICENSE_FILE",
            "export CC=gcc",
            "export MODSHIM_E2E_ROOT=/opt/gcc/8.1.0",
        ]
    );
    Ok(())
}

#[test]
fn test_parse_from_stdin() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = utils::run_modshim_with_stdin(
        &env,
        &["--output", "json", "parse"],
        "prepend_path(\"PATH\",\"/opt/x/bin\")\nsetenv X_DIR /opt/x\n",
    )?;
    assert_eq!(output.exit_code, 0, "parse failed: {}", output.stderr);
    let events = output.json_events()?;
    let lines = events[0]["data"]["lines"].as_array().cloned().unwrap_or_default();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["operation"], "prepend-path");
    assert_eq!(lines[1]["value"], "/opt/x");

    let output = utils::run_modshim_with_stdin(&env, &["parse", "-"], "prepend_path(PATH,/lib/path)\n")?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("cannot parse module line"));
    Ok(())
}

#[test]
fn test_cray_compilers() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.install_modulecmd()?;

    let output = utils::run_modshim_command_with_env(
        &env,
        &["--output", "json", "compilers"],
        &[("CRAYOS_VERSION", "6.0.UP07")],
    )?;
    assert_eq!(output.exit_code, 0, "compilers failed: {}", output.stderr);
    let events = output.json_events()?;
    let compilers = events[0]["data"]["compilers"].as_array().cloned().unwrap_or_default();
    assert_eq!(compilers.len(), 2);
    assert_eq!(compilers[1]["version"], "8.1.0");
    assert_eq!(compilers[1]["wrappers"], serde_json::json!(["cc", "CC", "ftn"]));
    assert_eq!(events[0]["data"]["target"], "CLE 6.0.UP07");

    let output = utils::run_modshim_command(&env, &["compilers"])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("CRAYOS_VERSION"));

    let output = utils::run_modshim_command(&env, &["compilers", "--target", "cnl"])?;
    assert_eq!(output.exit_code, 0, "cnl failed: {}", output.stderr);
    assert!(output.stdout.contains("gcc/7.3.0"));
    Ok(())
}

#[test]
fn test_config_selects_command_name() -> Result<()> {
    let env = TestEnvironment::new()?;
    let lmodcmd = env.bin_dir().join("lmodcmd");
    env.write_executable(&lmodcmd, common::FAKE_MODULECMD)?;
    let config = env.write_file("modshim.toml", "command = \"lmodcmd\"\n")?;

    let output = utils::run_modshim_command(&env, &["locate", "--config", &config.display().to_string()])?;
    assert_eq!(output.exit_code, 0, "locate failed: {}", output.stderr);
    assert!(output.stdout.contains("lmodcmd python"));

    let output = utils::run_modshim_command(&env, &["--config", "/nonexistent/modshim.toml", "locate"])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("Config file not found"));
    Ok(())
}

#[test]
fn test_debug_records_command_log() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.install_modulecmd()?;

    let output = utils::run_modshim_command(&env, &["--debug", "path", "gcc/8.1.0"])?;
    assert_eq!(output.exit_code, 0, "path failed: {}", output.stderr);

    let log = env
        .data_home()
        .join("modshim")
        .join("command_logs")
        .join("module_commands.jsonl");
    assert!(log.exists(), "command log was not written");

    let output = utils::run_modshim_command(&env, &["--output", "json", "logs", "--limit", "1"])?;
    assert_eq!(output.exit_code, 0, "logs failed: {}", output.stderr);
    let events = output.json_events()?;
    let entry = events
        .iter()
        .find(|e| e["code"] == "logs.entry")
        .expect("a log entry");
    assert_eq!(entry["data"]["args"], serde_json::json!(["python", "show", "gcc/8.1.0"]));

    let output = utils::run_modshim_command(&env, &["logs", "--clear"])?;
    assert_eq!(output.exit_code, 0);
    assert!(!log.exists());
    Ok(())
}
