//! Configuration loading from disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::raw::RawConfig;
use crate::config::schema::EndpointError;
use crate::config::validation::ValidationError;

/// Environment variables consulted, in order, for the active environment.
pub const ENVIRONMENT_VARS: [&str; 2] = ["KEYSPACE_POOL_ENV", "APP_ENV"];

/// Environment used when none of [`ENVIRONMENT_VARS`] is set.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("interpolation error: {0}")]
    Interpolation(String),

    #[error(transparent)]
    InvalidHost(#[from] EndpointError),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("namespace `{namespace}`: {source}")]
    Namespace {
        namespace: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    pub(crate) fn in_namespace(self, namespace: &str) -> Self {
        ConfigError::Namespace {
            namespace: namespace.to_string(),
            source: Box::new(self),
        }
    }

    /// True for the `ConfigParse` class of failures: the file exists but its
    /// content is unusable.
    pub fn is_parse_error(&self) -> bool {
        match self {
            ConfigError::Parse(_)
            | ConfigError::Interpolation(_)
            | ConfigError::InvalidHost(_)
            | ConfigError::InvalidValue { .. } => true,
            ConfigError::Namespace { source, .. } => source.is_parse_error(),
            _ => false,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name of the active deployment environment.
pub fn active_environment() -> String {
    ENVIRONMENT_VARS
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Read a TOML file, expand `${VAR}` references and return the section for
/// `environment`. Files without such a section are used whole.
pub fn load_static(path: &Path, environment: &str) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = interpolate(&content, |name| env::var(name).ok())?;
    parse_environment(&content, environment)
}

/// Parse an already-interpolated document and pick the environment section.
pub fn parse_environment(content: &str, environment: &str) -> Result<RawConfig, ConfigError> {
    let mut document: toml::Table = toml::from_str(content)?;
    let section = match document.remove(environment) {
        Some(toml::Value::Table(section)) => section,
        Some(other) => {
            document.insert(environment.to_string(), other);
            document
        }
        None => document,
    };
    Ok(toml::Value::Table(section).try_into()?)
}

/// Expand `${NAME}` and `${NAME:-fallback}` using `lookup`.
///
/// A reference to an unset variable without a fallback is an error rather
/// than an empty string. Comment lines are copied untouched; a reference in a
/// trailing comment after a value is still expanded. References cannot span
/// lines.
pub fn interpolate<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            expand_line(line, &lookup, &mut output)?;
        }
    }
    Ok(output)
}

fn expand_line<F>(line: &str, lookup: &F, output: &mut String) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut rest = line;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            ConfigError::Interpolation(format!("unterminated reference `${{{}`", truncate(after.trim_end())))
        })?;
        let expression = &after[..end];
        let (name, fallback) = match expression.split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (expression.trim(), None),
        };
        if name.is_empty() {
            return Err(ConfigError::Interpolation("empty variable name".to_string()));
        }
        match (lookup(name), fallback) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(fallback)) => output.push_str(fallback),
            (None, None) => {
                return Err(ConfigError::Interpolation(format!("variable `{name}` is not set")));
            }
        }
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(())
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(16) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "DB_HOST" => Some("10.2.0.1".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_interpolation() {
        let out = interpolate(r#"hosts = ["${DB_HOST}:3000"]"#, lookup).unwrap();
        assert_eq!(out, r#"hosts = ["10.2.0.1:3000"]"#);
    }

    #[test]
    fn test_interpolation_fallback() {
        let out = interpolate("pool_size = ${POOL:-8}", lookup).unwrap();
        assert_eq!(out, "pool_size = 8");
    }

    #[test]
    fn test_interpolation_missing_variable() {
        let err = interpolate("x = \"${NOPE}\"", lookup).unwrap_err();
        assert!(matches!(err, ConfigError::Interpolation(_)));
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_comment_lines_are_not_expanded() {
        let doc = "# hosts = [\"${UNSET_HOST}:3000\"]\n  # ${ALSO_UNSET\nhosts = [\"${DB_HOST}:3000\"]\n";
        let out = interpolate(doc, lookup).unwrap();
        assert_eq!(
            out,
            "# hosts = [\"${UNSET_HOST}:3000\"]\n  # ${ALSO_UNSET\nhosts = [\"10.2.0.1:3000\"]\n"
        );

        // Trailing comments are part of the value line.
        assert!(interpolate("pool_size = 4 # ${UNSET_SIZE}", lookup).is_err());
    }

    #[test]
    fn test_interpolation_unterminated() {
        assert!(interpolate("x = \"${DB_HOST\"", lookup).is_err());
    }

    #[test]
    fn test_environment_section_selected() {
        let doc = r#"
            [development]
            default_namespace = "dev"
            [production]
            default_namespace = "prod"
        "#;
        let raw = parse_environment(doc, "production").unwrap();
        assert_eq!(raw.default_namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_flat_document_used_whole() {
        let raw = parse_environment("default_namespace = \"flat\"", "production").unwrap();
        assert_eq!(raw.default_namespace.as_deref(), Some("flat"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = parse_environment("hosts = [", "development").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
