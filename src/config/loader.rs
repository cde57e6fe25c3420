//! Locating and reading `texpatch.toml`.

use crate::config::schema::{EngineConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for next to a document and in its ancestors.
pub const CONFIG_FILE: &str = "texpatch.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        /// 1-based line of the offending key or value, when known
        line: Option<usize>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn in_file(self, path: &Path) -> Self {
        match self {
            ConfigError::Toml { line, source, .. } => ConfigError::Toml {
                path: Some(path.to_path_buf()),
                line,
                source,
            },
            ConfigError::Validation { source, .. } => ConfigError::Validation {
                path: Some(path.to_path_buf()),
                source,
            },
            io => io,
        }
    }
}

/// `texpatch.toml:3` style prefix; empty for in-memory input.
fn location(path: Option<&Path>, line: Option<usize>) -> String {
    match (path, line) {
        (Some(path), Some(line)) => format!(" ({}:{line})", path.display()),
        (Some(path), None) => format!(" ({})", path.display()),
        (None, Some(line)) => format!(" (line {line})"),
        (None, None) => String::new(),
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, line, source } => {
                write!(f, "malformed {CONFIG_FILE}{}: {}", location(path.as_deref(), *line), source.message())
            }
            ConfigError::Validation { path, source } => {
                write!(f, "rejected {CONFIG_FILE}{}: {}", location(path.as_deref(), None), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: None,
        line: source.span().map(|span| line_of(input, span.start)),
        source,
    })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

fn line_of(input: &str, offset: usize) -> usize {
    input.as_bytes()[..offset.min(input.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Read and validate a config file; errors carry the path.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.in_file(path))
}

/// The nearest `texpatch.toml` in the directory holding `document` or in one
/// of its ancestors. `-` (stdin) searches from the working directory.
pub fn discover(document: &Path) -> Option<PathBuf> {
    let dir = match document.parent() {
        Some(dir) if document != Path::new("-") && !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let dir = fs::canonicalize(&dir).unwrap_or(dir);
    dir.ancestors()
        .map(|ancestor| ancestor.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Configuration that applies to `document`: the discovered file, or the
/// defaults when there is none. Returns the file used alongside.
pub fn load_for_document(document: &Path) -> Result<(EngineConfig, Option<PathBuf>), ConfigError> {
    match discover(document) {
        Some(path) => {
            tracing::info!(path = %path.display(), "using configuration file");
            Ok((load_from_path(&path)?, Some(path)))
        }
        None => Ok((EngineConfig::default(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.escalation.unified_diff_attempts, 3);
        assert_eq!(config.upstream.timeout_ms, 60_000);
    }

    #[test]
    fn validation_collects_every_issue() {
        let err = load_from_str("[parser]\nmax_depth = 0\n[upstream]\nmodel = \" \"\n").unwrap_err();
        match err {
            ConfigError::Validation { source, path: None } => assert_eq!(source.issues.len(), 2),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn toml_errors_name_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[upstream]\nmodel = \"m\"\n\n[parser]\nmax_depth = \"deep\"\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), line: Some(5), .. }), "{err:?}");
        assert!(err.to_string().contains(&format!("{}:5", path.display())), "{err}");
    }

    #[test]
    fn discovery_walks_up_from_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let chapters = dir.path().join("chapters");
        fs::create_dir(&chapters).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[parser]\nmax_depth = 7\n").unwrap();
        let document = chapters.join("intro.tex");

        let found = discover(&document).unwrap();
        assert_eq!(found, fs::canonicalize(dir.path()).unwrap().join(CONFIG_FILE));

        let (config, used) = load_for_document(&document).unwrap();
        assert_eq!(config.parser.max_depth, 7);
        assert_eq!(used, Some(found));
    }

    #[test]
    fn nearer_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let chapters = dir.path().join("chapters");
        fs::create_dir(&chapters).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[parser]\nmax_depth = 7\n").unwrap();
        fs::write(chapters.join(CONFIG_FILE), "[parser]\nmax_depth = 9\n").unwrap();

        let (config, _) = load_for_document(&chapters.join("intro.tex")).unwrap();
        assert_eq!(config.parser.max_depth, 9);
    }
}
