//! Deriving an install prefix from the environment changes a module makes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::modules::env_guard::EnvOverride;
use crate::modules::error::ModuleError;
use crate::modules::locator::ModuleCmd;
use crate::modules::parser::{ModuleLine, Operation, parse_output};

static RPATH_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-rpath[,=]?\s*(/[^\s:,]*)").expect("valid regex"));

static LINK_DIR_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s,])-L\s*(/[^\s:,]*)").expect("valid regex"));

/// Strip the last segment of values of `variable` when it starts with `segment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub variable: String,
    pub segment: String,
}

impl PrefixRule {
    pub fn new(variable: &str, segment: &str) -> Self {
        Self {
            variable: variable.to_string(),
            segment: segment.to_string(),
        }
    }

    /// `LD_LIBRARY_PATH` also covers `CRAY_LD_LIBRARY_PATH`.
    pub fn matches(&self, variable: &str) -> bool {
        variable == self.variable
            || variable
                .strip_suffix(self.variable.as_str())
                .is_some_and(|head| head.ends_with('_'))
    }

    /// The parent of `value` if its last segment starts with this rule's segment.
    pub fn strip(&self, value: &str) -> Option<PathBuf> {
        strip_segment(value, &self.segment)
    }
}

fn strip_segment(value: &str, segment: &str) -> Option<PathBuf> {
    let first = value.split(':').next().unwrap_or_default().trim_end_matches('/');
    let path = Path::new(first);
    let last = path.file_name()?.to_str()?;
    if !last.starts_with(segment) {
        return None;
    }
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixRules {
    /// Library search path variables, checked first
    pub library: Vec<PrefixRule>,
    /// Executable search path variables, checked last
    pub binary: Vec<PrefixRule>,
}

impl Default for PrefixRules {
    fn default() -> Self {
        Self {
            library: vec![PrefixRule::new("LD_LIBRARY_PATH", "lib")],
            binary: vec![PrefixRule::new("PATH", "bin")],
        }
    }
}

impl PrefixRules {
    fn strip_library_dir(&self, dir: &str) -> Option<PathBuf> {
        self.library.iter().find_map(|rule| rule.strip(dir))
    }
}

/// `:`-joined search path entries.
pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(":")
}

/// `<MODULE>_DIR` for `gcc/8.1.0` is `GCC_DIR`.
fn package_dir_variable(module: &str) -> String {
    let base = module.split('/').next().unwrap_or(module);
    format!("{}_DIR", base.to_ascii_uppercase().replace('-', "_"))
}

fn path_rule_hit(lines: &[ModuleLine], rules: &[PrefixRule]) -> Option<PathBuf> {
    lines
        .iter()
        .filter(|line| line.operation.is_path_operation() && line.operation != Operation::RemovePath)
        .find_map(|line| {
            let value = line.value.as_deref()?;
            rules
                .iter()
                .filter(|rule| rule.matches(&line.variable))
                .find_map(|rule| rule.strip(value))
        })
}

/// The first entry of the first path operation, unstripped.
fn raw_path_value(lines: &[ModuleLine]) -> Option<PathBuf> {
    lines
        .iter()
        .filter(|line| line.operation.is_path_operation() && line.operation != Operation::RemovePath)
        .filter_map(|line| line.value.as_deref())
        .filter_map(|value| value.split(':').next())
        .find(|first| !first.is_empty())
        .map(PathBuf::from)
}

fn flag_hit(lines: &[ModuleLine], flag: &Regex, rules: &PrefixRules) -> Option<PathBuf> {
    lines
        .iter()
        .filter_map(|line| line.value.as_deref())
        .flat_map(|value| flag.captures_iter(value))
        .find_map(|caps| rules.strip_library_dir(&caps[1]))
}

/// The install prefix a module's mutations point at, in priority order:
/// library path, `<MODULE>_DIR`, `-rpath`, `-L`, executable path.
///
/// A path operation no strip rule applies to yields its raw value.
pub fn prefix_from_lines(module: &str, lines: &[ModuleLine], rules: &PrefixRules) -> Option<PathBuf> {
    let mutations: Vec<ModuleLine> = lines
        .iter()
        .filter(|l| l.operation.is_mutation())
        .cloned()
        .collect();

    if let Some(prefix) = path_rule_hit(&mutations, &rules.library) {
        return Some(prefix);
    }

    let dir_var = package_dir_variable(module);
    if let Some(dir) = mutations
        .iter()
        .filter(|l| l.operation == Operation::Setenv && l.variable == dir_var)
        .find_map(|l| l.value.as_deref())
        .filter(|v| !v.is_empty())
    {
        return Some(PathBuf::from(dir));
    }

    flag_hit(&mutations, &RPATH_FLAG, rules)
        .or_else(|| flag_hit(&mutations, &LINK_DIR_FLAG, rules))
        .or_else(|| path_rule_hit(&mutations, &rules.binary))
        .or_else(|| raw_path_value(&mutations))
}

/// The install prefix loading `module` would point at.
///
/// `modulepath` replaces `MODULEPATH` for the duration of the query. A module
/// that contributes no path at all yields `Ok(None)`.
pub fn get_path_from_module(
    cmd: &ModuleCmd,
    module: &str,
    rules: &PrefixRules,
    modulepath: Option<&[PathBuf]>,
) -> Result<Option<PathBuf>, ModuleError> {
    let _modulepath = modulepath.map(|paths| EnvOverride::set_var("MODULEPATH", join_paths(paths)));

    let text = cmd.show(module)?;
    let lines = parse_output(&text)?;
    let prefix = prefix_from_lines(module, &lines, rules);

    crate::ui::debug(
        "module.path.result",
        &match &prefix {
            Some(prefix) => format!("{module} -> {}", prefix.display()),
            None => format!("{module} contributes no install prefix"),
        },
    );
    Ok(prefix)
}
