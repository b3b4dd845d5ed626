//! Configuration file discovery and loading.
//!
//! The file layer is located in this order:
//!
//! 1. the `config_file` option supplied by the caller,
//! 2. the path in the `AWS_SQS_ACTIVE_JOB_CONFIG_FILE` environment variable,
//! 3. `<root>/config/aws_sqs_active_job/<environment>.yml` if it exists,
//! 4. `<root>/config/aws_sqs_active_job.yml` if it exists.
//!
//! If none applies there is no file layer. A file that is named explicitly
//! (options 1 and 2) must exist; the defaults are only probed.
//!
//! Files are expanded for `${VAR}` / `${VAR:-fallback}` references before
//! they are parsed as YAML.

use crate::error::ConfigFileError;
use crate::options::ConfigOptions;
use crate::queue::canonical_key;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "AWS_SQS_ACTIVE_JOB_CONFIG_FILE";

/// Environment variable naming the application environment
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Environment assumed when none is configured
pub const DEFAULT_APP_ENV: &str = "development";

// ============================================================================
// Application Environment
// ============================================================================

/// Name and root directory of the host application
///
/// Both feed the default configuration file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnvironment {
    name: String,
    root: PathBuf,
}

impl AppEnvironment {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Read the environment name from `APP_ENV` and use the working
    /// directory as root
    ///
    /// # Errors
    /// Returns the I/O error if the working directory cannot be determined.
    pub fn from_env() -> std::io::Result<Self> {
        let name = std::env::var(APP_ENV_VAR)
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_APP_ENV.to_string());
        let root = std::env::current_dir()?;
        Ok(Self::new(name, root))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config/aws_sqs_active_job/<environment>.yml`
    pub fn environment_config_file(&self) -> PathBuf {
        self.root
            .join("config")
            .join("aws_sqs_active_job")
            .join(format!("{}.yml", self.name))
    }

    /// `<root>/config/aws_sqs_active_job.yml`
    pub fn global_config_file(&self) -> PathBuf {
        self.root.join("config").join("aws_sqs_active_job.yml")
    }
}

// ============================================================================
// File Selection
// ============================================================================

/// Pick the configuration file to load, if any
///
/// `env_override` is the value of [`CONFIG_FILE_ENV`]; an empty value counts
/// as unset. It does not have to be valid UTF-8.
pub fn select_config_file(
    explicit: Option<&Path>,
    env_override: Option<&Path>,
    app: &AppEnvironment,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "Using explicitly configured config file");
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
        debug!(
            path = %path.display(),
            variable = CONFIG_FILE_ENV,
            "Using config file from environment"
        );
        return Some(path.to_path_buf());
    }

    let candidates = [app.environment_config_file(), app.global_config_file()];
    let found = candidates.into_iter().find(|candidate| candidate.is_file());
    match &found {
        Some(path) => debug!(path = %path.display(), "Using default config file"),
        None => debug!(
            root = %app.root().display(),
            environment = %app.name(),
            "No config file found; using defaults and explicit options only"
        ),
    }
    found
}

// ============================================================================
// File Loading
// ============================================================================

/// Load one option layer from a YAML file
///
/// # Errors
/// - `ConfigFileError::Read` - File missing or unreadable
/// - `ConfigFileError::UnsetVariable` - `${VAR}` without fallback and `VAR` unset
/// - `ConfigFileError::Parse` - Invalid YAML or option values of the wrong type
pub fn load_options_file(path: &Path) -> Result<ConfigOptions, ConfigFileError> {
    info!(path = %path.display(), "Loading SQS Active Job configuration file");

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let expanded = expand_variables(&contents, path, |name| std::env::var(name).ok())?;
    parse_options(&expanded, path)
}

/// Parse an already expanded YAML document into an option layer
pub fn parse_options(source: &str, path: &Path) -> Result<ConfigOptions, ConfigFileError> {
    let document = match parse_document(source, path)? {
        Value::Null => return Ok(ConfigOptions::new()),
        document @ Value::Mapping(_) => symbolize_keys(document, path)?,
        _ => {
            return Err(ConfigFileError::Parse {
                path: path.to_path_buf(),
                message: "expected a mapping of options at the top level".to_string(),
            })
        }
    };

    serde_yaml::from_value(document).map_err(|e| ConfigFileError::Parse {
        path: path.to_path_buf(),
        message: format!("Invalid option value: {}", e),
    })
}

/// Parse YAML, resolving `<<` merge keys where the document allows it
///
/// Aliases are always expanded. Merge-key resolution is the strict mode; a
/// document whose merge keys cannot be resolved is used as parsed instead.
fn parse_document(source: &str, path: &Path) -> Result<Value, ConfigFileError> {
    if source.trim().is_empty() {
        return Ok(Value::Null);
    }

    let document: Value = serde_yaml::from_str(source).map_err(|e| ConfigFileError::Parse {
        path: path.to_path_buf(),
        message: format!("Invalid YAML: {}", e),
    })?;

    let mut strict = document.clone();
    match strict.apply_merge() {
        Ok(()) => Ok(strict),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Could not resolve YAML merge keys; loading document without them"
            );
            Ok(document)
        }
    }
}

/// Strip the symbol-literal colon from every mapping key, recursively
///
/// Two keys that only differ by the colon (`:orders` and `orders`) name the
/// same option and are rejected.
fn symbolize_keys(value: Value, path: &Path) -> Result<Value, ConfigFileError> {
    match value {
        Value::Mapping(mapping) => {
            let mut symbolized = Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Value::String(raw) => {
                        let canonical = canonical_key(&raw).to_string();
                        if symbolized.contains_key(canonical.as_str()) {
                            return Err(ConfigFileError::Parse {
                                path: path.to_path_buf(),
                                message: format!(
                                    "keys ':{0}' and '{0}' both define '{0}'",
                                    canonical
                                ),
                            });
                        }
                        Value::String(canonical)
                    }
                    other => other,
                };
                symbolized.insert(key, symbolize_keys(value, path)?);
            }
            Ok(Value::Mapping(symbolized))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| symbolize_keys(item, path))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        other => Ok(other),
    }
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("variable pattern is a valid regex")
    })
}

/// Replace `${VAR}` and `${VAR:-fallback}` references using `lookup`
pub fn expand_variables<F>(source: &str, path: &Path, lookup: F) -> Result<String, ConfigFileError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(source.len());
    let mut last = 0;

    for captures in variable_pattern().captures_iter(source) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let name = &captures[1];

        let value = match (lookup(name), captures.get(2)) {
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => {
                return Err(ConfigFileError::UnsetVariable {
                    path: path.to_path_buf(),
                    variable: name.to_string(),
                })
            }
        };

        expanded.push_str(&source[last..whole.start()]);
        expanded.push_str(&value);
        last = whole.end();
    }

    expanded.push_str(&source[last..]);
    Ok(expanded)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
