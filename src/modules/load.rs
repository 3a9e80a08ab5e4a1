use crate::modules::error::ModuleError;
use crate::modules::locator::ModuleCmd;
use crate::modules::parser::{EnvironmentMutationList, Operation, parse_output};

/// Modules named by `conflict` lines of a `show` output.
pub fn conflicts(show_output: &str) -> Result<Vec<String>, ModuleError> {
    let conflict = Operation::Other("conflict".to_string());
    let mut names = Vec::new();
    for line in parse_output(show_output)? {
        if line.operation != conflict {
            continue;
        }
        names.push(line.variable);
        if let Some(value) = line.value {
            names.extend(value.split_whitespace().map(str::to_string));
        }
    }
    names.retain(|name| !name.is_empty());
    Ok(names)
}

/// The mutations `unload <module>` would make.
pub fn unload_module(cmd: &ModuleCmd, module: &str) -> Result<EnvironmentMutationList, ModuleError> {
    parse_output(&cmd.run(&["unload", module])?)
}

/// Unload every module `module` conflicts with, then load it.
///
/// Nothing is applied; the returned mutations are in the order the module tool
/// would apply them. Unloading a module that is not loaded is a no-op for the
/// module tool, so conflicts are unloaded unconditionally.
pub fn load_module(cmd: &ModuleCmd, module: &str) -> Result<EnvironmentMutationList, ModuleError> {
    let mut mutations = EnvironmentMutationList::new();

    for conflict in conflicts(&cmd.show(module)?)? {
        crate::ui::debug(
            "module.load.conflict",
            &format!("Unloading '{conflict}' before loading '{module}'"),
        );
        mutations.extend(unload_module(cmd, &conflict)?);
    }

    mutations.extend(parse_output(&cmd.run(&["load", module])?)?);
    Ok(mutations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::executable::Executable;
    use crate::modules::locator::CommandSource;
    use crate::modules::parser::ModuleLine;
    use crate::modules::shell_function::tests::write_script;

    /// A python-mode modulecmd with `gcc` conflicting with `intel`.
    fn fake_cmd(dir: &std::path::Path) -> ModuleCmd {
        let path = dir.join("modulecmd");
        write_script(
            &path,
            r#"shift
case "$1 $2" in
  "show gcc")
    echo "/opt/modulefiles/gcc:" >&2
    echo "conflict intel" >&2
    echo "prepend-path PATH /opt/gcc/bin" >&2 ;;
  "unload intel")
    echo "del os.environ['INTEL_LICENSE_FILE']" ;;
  "load gcc")
    echo "os.environ['PATH'] = '/opt/gcc/bin:/usr/bin'"
    echo "os.environ['CC'] = 'gcc'" ;;
  "show broken") ;;
  "load broken")
    echo "os.environ['A=B'] = 'x'" ;;
  *)
    exit 1 ;;
esac"#,
        );
        ModuleCmd::new(Executable::new(path), CommandSource::Custom)
    }

    #[test]
    fn conflicts_are_unloaded_first() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_cmd(dir.path());

        let mutations = load_module(&cmd, "gcc").unwrap();
        assert_eq!(
            mutations,
            vec![
                ModuleLine::new(Operation::Unset, "INTEL_LICENSE_FILE", None),
                ModuleLine::new(Operation::Setenv, "PATH", Some("/opt/gcc/bin:/usr/bin".into())),
                ModuleLine::new(Operation::Setenv, "CC", Some("gcc".into())),
            ]
        );
    }

    #[test]
    fn failing_load_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_cmd(dir.path());
        assert!(matches!(
            load_module(&cmd, "missing"),
            Err(ModuleError::CommandFailed { .. })
        ));
    }

    #[test]
    fn unusable_variable_name_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_cmd(dir.path());
        assert!(matches!(
            load_module(&cmd, "broken"),
            Err(ModuleError::Parse { .. })
        ));
    }

    #[test]
    fn conflict_lines_in_both_dialects() {
        let names = conflicts("conflict intel pgi\nconflict(\"cce\")\nmodule-whatis GNU\n").unwrap();
        assert_eq!(names, vec!["intel", "pgi", "cce"]);
    }
}
