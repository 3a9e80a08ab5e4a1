//! Scoped changes to the process environment.
//!
//! [`EnvOverride`] remembers the value each touched variable had before its
//! first change and puts it back (or removes the variable again) when the guard
//! is dropped, whichever way the scope is left.

use std::env;
use std::ffi::OsString;

use crate::modules::parser::{ModuleLine, Operation};

const PATH_SEPARATOR: char = ':';

fn set_process_var(key: &str, value: impl AsRef<std::ffi::OsStr>) {
    // SAFETY: modshim changes the environment only from its single discovery
    // thread, never while other threads read it.
    unsafe { env::set_var(key, value) }
}

fn remove_process_var(key: &str) {
    // SAFETY: see `set_process_var`.
    unsafe { env::remove_var(key) }
}

#[derive(Debug, Default)]
#[must_use = "the environment is restored as soon as the guard is dropped"]
pub struct EnvOverride {
    saved: Vec<(String, Option<OsString>)>,
}

impl EnvOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that sets a single variable.
    pub fn set_var(key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        let mut guard = Self::new();
        guard.set(key, value);
        guard
    }

    /// Apply a mutation list for the lifetime of the guard.
    pub fn apply_mutations(lines: &[ModuleLine]) -> Self {
        let mut guard = Self::new();
        for line in lines {
            guard.apply(line);
        }
        guard
    }

    fn remember(&mut self, key: &str) {
        if !self.saved.iter().any(|(k, _)| k == key) {
            self.saved.push((key.to_string(), env::var_os(key)));
        }
    }

    pub fn set(&mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) {
        self.remember(key);
        set_process_var(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.remember(key);
        remove_process_var(key);
    }

    pub fn apply(&mut self, line: &ModuleLine) {
        if let Some(next) = next_value(env::var(&line.variable).ok(), line) {
            match next {
                Some(value) => self.set(&line.variable, value),
                None => self.remove(&line.variable),
            }
        }
    }

    /// Variables this guard will restore.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.saved.iter().map(|(k, _)| k.as_str())
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(value) => set_process_var(&key, value),
                None => remove_process_var(&key),
            }
        }
    }
}

/// The value a variable has after `line` is applied.
///
/// `None` means the line leaves the variable alone, `Some(None)` that it unsets it.
pub fn next_value(current: Option<String>, line: &ModuleLine) -> Option<Option<String>> {
    let value = line.value.as_deref().unwrap_or_default();
    let without = |current: Option<String>| -> Vec<String> {
        current
            .unwrap_or_default()
            .split(PATH_SEPARATOR)
            .filter(|entry| !entry.is_empty() && *entry != value)
            .map(str::to_string)
            .collect()
    };

    match &line.operation {
        Operation::PrependPath => {
            let mut entries = vec![value.to_string()];
            entries.extend(without(current));
            Some(Some(entries.join(&PATH_SEPARATOR.to_string())))
        }
        Operation::AppendPath => {
            let mut entries = without(current);
            entries.push(value.to_string());
            Some(Some(entries.join(&PATH_SEPARATOR.to_string())))
        }
        Operation::RemovePath => {
            let entries = without(current);
            if entries.is_empty() {
                Some(None)
            } else {
                Some(Some(entries.join(&PATH_SEPARATOR.to_string())))
            }
        }
        Operation::Setenv => Some(Some(value.to_string())),
        Operation::Unset => Some(None),
        Operation::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn line(op: Operation, var: &str, value: Option<&str>) -> ModuleLine {
        ModuleLine::new(op, var, value.map(str::to_string))
    }

    #[test]
    #[serial]
    fn set_var_is_restored_to_previous_value() {
        set_process_var("MODSHIM_GUARD_A", "before");
        {
            let _guard = EnvOverride::set_var("MODSHIM_GUARD_A", "during");
            assert_eq!(env::var("MODSHIM_GUARD_A").unwrap(), "during");
        }
        assert_eq!(env::var("MODSHIM_GUARD_A").unwrap(), "before");
        remove_process_var("MODSHIM_GUARD_A");
    }

    #[test]
    #[serial]
    fn previously_unset_var_is_removed_again() {
        remove_process_var("MODSHIM_GUARD_B");
        {
            let mut guard = EnvOverride::new();
            guard.set("MODSHIM_GUARD_B", "one");
            guard.set("MODSHIM_GUARD_B", "two");
            assert_eq!(env::var("MODSHIM_GUARD_B").unwrap(), "two");
            assert_eq!(guard.keys().collect::<Vec<_>>(), vec!["MODSHIM_GUARD_B"]);
        }
        assert!(env::var_os("MODSHIM_GUARD_B").is_none());
    }

    #[test]
    #[serial]
    fn removal_is_restored() {
        set_process_var("MODSHIM_GUARD_C", "keep");
        {
            let mut guard = EnvOverride::new();
            guard.remove("MODSHIM_GUARD_C");
            assert!(env::var_os("MODSHIM_GUARD_C").is_none());
        }
        assert_eq!(env::var("MODSHIM_GUARD_C").unwrap(), "keep");
        remove_process_var("MODSHIM_GUARD_C");
    }

    #[test]
    #[serial]
    fn restored_on_early_error_return() {
        fn failing() -> Result<(), String> {
            let _guard = EnvOverride::set_var("MODSHIM_GUARD_D", "scratch");
            Err::<(), String>("boom".to_string())?;
            Ok(())
        }

        remove_process_var("MODSHIM_GUARD_D");
        assert!(failing().is_err());
        assert!(env::var_os("MODSHIM_GUARD_D").is_none());
    }

    #[test]
    #[serial]
    fn scoped_mutations_are_undone() {
        set_process_var("MODSHIM_GUARD_PATH", "/usr/bin:/bin");
        remove_process_var("MODSHIM_GUARD_CC");
        {
            let _guard = EnvOverride::apply_mutations(&[
                line(Operation::PrependPath, "MODSHIM_GUARD_PATH", Some("/opt/gcc/bin")),
                line(Operation::Setenv, "MODSHIM_GUARD_CC", Some("gcc")),
            ]);
            assert_eq!(
                env::var("MODSHIM_GUARD_PATH").unwrap(),
                "/opt/gcc/bin:/usr/bin:/bin"
            );
            assert_eq!(env::var("MODSHIM_GUARD_CC").unwrap(), "gcc");
        }
        assert_eq!(env::var("MODSHIM_GUARD_PATH").unwrap(), "/usr/bin:/bin");
        assert!(env::var_os("MODSHIM_GUARD_CC").is_none());
        remove_process_var("MODSHIM_GUARD_PATH");
    }

    #[test]
    fn later_prepends_end_up_first() {
        let first = line(Operation::PrependPath, "PATH", Some("/a"));
        let second = line(Operation::PrependPath, "PATH", Some("/b"));
        let after_first = next_value(Some("/usr/bin".into()), &first).unwrap();
        let after_second = next_value(after_first, &second).unwrap();
        assert_eq!(after_second.as_deref(), Some("/b:/a:/usr/bin"));
    }

    #[test]
    fn path_operations_deduplicate() {
        let append = line(Operation::AppendPath, "PATH", Some("/a"));
        assert_eq!(
            next_value(Some("/a:/b".into()), &append).unwrap().as_deref(),
            Some("/b:/a")
        );

        let remove = line(Operation::RemovePath, "PATH", Some("/a"));
        assert_eq!(next_value(Some("/a".into()), &remove).unwrap(), None);
        assert_eq!(
            next_value(Some("/a:/b".into()), &remove).unwrap().as_deref(),
            Some("/b")
        );
    }

    #[test]
    fn unknown_operations_leave_variables_alone() {
        let other = line(Operation::Other("conflict".into()), "gcc", None);
        assert_eq!(next_value(Some("x".into()), &other), None);
        let unset = line(Operation::Unset, "CC", None);
        assert_eq!(next_value(Some("gcc".into()), &unset), Some(None));
    }
}
