//! Parsing of the text a module command emits.
//!
//! Module tools describe the environment changes a module makes in a handful of
//! textual dialects. Each [`Dialect`] either extracts a [`ModuleLine`], declines
//! a line that is not in its shape, or rejects a line it recognizes but cannot
//! read. Dialects are tried in the order of [`Dialect::ALL`].

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

use crate::common::shell::is_env_name;
use crate::modules::error::ModuleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    PrependPath,
    AppendPath,
    RemovePath,
    Setenv,
    Unset,
    Other(String),
}

impl Operation {
    /// Map an operation name in any dialect onto an operation.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "prepend-path" => Operation::PrependPath,
            "append-path" => Operation::AppendPath,
            "remove-path" => Operation::RemovePath,
            "setenv" | "pushenv" => Operation::Setenv,
            "unset" | "unsetenv" => Operation::Unset,
            _ => Operation::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operation::PrependPath => "prepend-path",
            Operation::AppendPath => "append-path",
            Operation::RemovePath => "remove-path",
            Operation::Setenv => "setenv",
            Operation::Unset => "unset",
            Operation::Other(name) => name,
        }
    }

    /// Operations that change the environment.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Other(_))
    }

    pub fn is_path_operation(&self) -> bool {
        matches!(
            self,
            Operation::PrependPath | Operation::AppendPath | Operation::RemovePath
        )
    }

    fn requires_value(&self) -> bool {
        self.is_mutation() && *self != Operation::Unset
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One environment operation emitted by a module query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleLine {
    pub operation: Operation,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ModuleLine {
    pub fn new(operation: Operation, variable: impl Into<String>, value: Option<String>) -> Self {
        Self {
            operation,
            variable: variable.into(),
            value,
        }
    }
}

/// Ordered environment operations, in emission order.
pub type EnvironmentMutationList = Vec<ModuleLine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `os.environ['VAR'] = 'value'` / `del os.environ['VAR']`
    PythonAssignment,
    /// `prepend_path("VAR", '/value')`
    FunctionCall,
    /// `prepend-path VAR /value`
    SpaceSeparated,
}

static OPERATION_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\s*(\()?").expect("valid regex"));

static PY_ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^os\.environ\[\s*(?:'([^']*)'|"([^"]*)")\s*\]\s*=\s*(?:'(.*)'|"(.*)")\s*;?$"#,
    )
    .expect("valid regex")
});

static PY_DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^del\s+os\.environ\[\s*(?:'([^']*)'|"([^"]*)")\s*\]\s*;?$"#).expect("valid regex")
});

static FUNCTION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\s*\((.*)\)\s*;?$").expect("valid regex")
});

fn first_group(caps: &regex::Captures<'_>, groups: &[usize]) -> Option<String> {
    groups
        .iter()
        .find_map(|&i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [
        Dialect::PythonAssignment,
        Dialect::FunctionCall,
        Dialect::SpaceSeparated,
    ];

    /// `None` when the line is not in this dialect's shape.
    pub fn try_parse(self, line: &str) -> Option<Result<ModuleLine, ModuleError>> {
        match self {
            Dialect::PythonAssignment => parse_python(line),
            Dialect::FunctionCall => parse_function_call(line),
            Dialect::SpaceSeparated => parse_space_separated(line),
        }
    }
}

fn parse_python(line: &str) -> Option<Result<ModuleLine, ModuleError>> {
    if line.starts_with("os.environ") {
        let result = PY_ASSIGN
            .captures(line)
            .map(|caps| {
                let variable = first_group(&caps, &[1, 2]).unwrap_or_default();
                let value = first_group(&caps, &[3, 4]);
                ModuleLine::new(Operation::Setenv, variable, value)
            })
            .ok_or_else(|| ModuleError::parse(line, "malformed os.environ assignment"));
        return Some(result);
    }

    if line.starts_with("del ") && line.contains("os.environ") {
        let result = PY_DELETE
            .captures(line)
            .map(|caps| {
                let variable = first_group(&caps, &[1, 2]).unwrap_or_default();
                ModuleLine::new(Operation::Unset, variable, None)
            })
            .ok_or_else(|| ModuleError::parse(line, "malformed os.environ deletion"));
        return Some(result);
    }

    None
}

/// Split `'a' , "b"` into its quoted arguments.
fn quoted_args(inner: &str) -> Result<Vec<String>, &'static str> {
    let mut args = Vec::new();
    let mut rest = inner.trim();
    if rest.is_empty() {
        return Ok(args);
    }

    loop {
        let quote = match rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err("no quote symbol found around argument"),
        };
        let body = &rest[1..];
        let end = body.find(quote).ok_or("unterminated quoted argument")?;
        args.push(body[..end].to_string());

        rest = body[end + 1..].trim_start();
        if rest.is_empty() {
            return Ok(args);
        }
        rest = rest
            .strip_prefix(',')
            .ok_or("expected ',' between arguments")?
            .trim_start();
    }
}

fn parse_function_call(line: &str) -> Option<Result<ModuleLine, ModuleError>> {
    let word = OPERATION_WORD.captures(line)?;
    // Only lines where the operation word is directly followed by '(' are calls
    word.get(2)?;

    let Some(caps) = FUNCTION_CALL.captures(line) else {
        return Some(Err(ModuleError::parse(
            line,
            "unexpected text after the argument list",
        )));
    };

    let operation = Operation::from_name(&caps[1]);
    let args = match quoted_args(&caps[2]) {
        Ok(args) => args,
        Err(reason) => return Some(Err(ModuleError::parse(line, reason))),
    };

    let Some(variable) = args.first().cloned() else {
        if operation.is_mutation() {
            return Some(Err(ModuleError::parse(line, "missing variable name")));
        }
        return Some(Ok(ModuleLine::new(operation, String::new(), None)));
    };

    // Lmod passes the separator as a third argument: `prepend_path("PATH", "/opt/bin", ":")`
    let value = args.get(1).cloned();
    if operation.requires_value() && value.is_none() {
        return Some(Err(ModuleError::parse(line, "missing value")));
    }
    if operation == Operation::Unset {
        return Some(Ok(ModuleLine::new(operation, variable, None)));
    }

    Some(Ok(ModuleLine::new(operation, variable, value)))
}

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2
            && let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn parse_space_separated(line: &str) -> Option<Result<ModuleLine, ModuleError>> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let op_word = parts.next()?;
    if !OPERATION_WORD
        .captures(op_word)
        .is_some_and(|c| c[1].len() == op_word.len())
    {
        return None;
    }
    let operation = Operation::from_name(op_word);
    let rest = parts.next().unwrap_or("").trim_start();

    let mut rest_parts = rest.splitn(2, char::is_whitespace);
    let variable = rest_parts.next().unwrap_or("");
    if !is_env_name(variable) {
        if operation.is_mutation() {
            return Some(Err(ModuleError::parse(
                line,
                format!("'{variable}' is not a variable name"),
            )));
        }
        return None;
    }

    let value = rest_parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| strip_matching_quotes(v).to_string());

    if operation.requires_value() && value.is_none() {
        return Some(Err(ModuleError::parse(line, "missing value")));
    }
    let value = if operation == Operation::Unset {
        None
    } else {
        value
    };

    Some(Ok(ModuleLine::new(operation, variable, value)))
}

/// Mutations must name a variable the process environment can hold.
fn check_mutation(line: &str, parsed: ModuleLine) -> Result<ModuleLine, ModuleError> {
    if !parsed.operation.is_mutation() {
        return Ok(parsed);
    }
    if !is_env_name(&parsed.variable) {
        return Err(ModuleError::parse(
            line,
            format!("'{}' is not a variable name", parsed.variable),
        ));
    }
    if parsed.value.as_deref().is_some_and(|v| v.contains('\0')) {
        return Err(ModuleError::parse(line, "value contains a NUL byte"));
    }
    Ok(parsed)
}

/// Parse a single module line in any supported dialect.
pub fn parse_line(line: &str) -> Result<ModuleLine, ModuleError> {
    let line = line.trim();
    Dialect::ALL
        .iter()
        .find_map(|dialect| dialect.try_parse(line))
        .unwrap_or_else(|| Err(ModuleError::parse(line, "not a recognized module line")))
        .and_then(|parsed| check_mutation(line, parsed))
}

enum LineKind {
    /// Banners, separators, module file paths
    Decoration,
    Mutation,
    Other,
}

fn classify(line: &str) -> LineKind {
    if line.starts_with("os.environ") || (line.starts_with("del ") && line.contains("os.environ"))
    {
        return LineKind::Mutation;
    }
    let Some(caps) = OPERATION_WORD.captures(line) else {
        return LineKind::Decoration;
    };
    let word = &caps[1];
    // A word glued to punctuation other than '(' (e.g. "/opt/mods:" or "os.chdir") is not an operation
    let boundary = line[word.len()..].chars().next();
    if !matches!(boundary, None | Some('(')) && !boundary.is_some_and(char::is_whitespace) {
        return LineKind::Decoration;
    }
    if Operation::from_name(word).is_mutation() {
        LineKind::Mutation
    } else {
        LineKind::Other
    }
}

/// Parse a whole captured module output into its environment operations.
///
/// Decoration is skipped and unreadable lines of unknown operations are
/// ignored, but a malformed line of a known mutation is an error.
pub fn parse_output(text: &str) -> Result<EnvironmentMutationList, ModuleError> {
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match classify(line) {
            LineKind::Decoration => {}
            LineKind::Mutation => lines.push(parse_line(line)?),
            LineKind::Other => {
                if let Ok(parsed) = parse_line(line) {
                    lines.push(parsed);
                }
            }
        }
    }
    Ok(lines)
}
