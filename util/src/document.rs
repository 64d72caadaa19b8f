//! Reading and writing rubric, submission and result documents.
//!
//! The on-disk format is picked from the file extension: `.yaml`/`.yml` go
//! through `serde_yaml`, everything else is treated as JSON. Tabular files
//! (`.csv`) are handled by the callers that need them, which share
//! [`DocumentError::Csv`] and [`ensure_parent_dir`].

use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

pub fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: DocumentFormat,
    origin: &Path,
) -> Result<T, DocumentError> {
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|source| DocumentError::Yaml {
            path: origin.to_path_buf(),
            source,
        }),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|source| DocumentError::Json {
            path: origin.to_path_buf(),
            source,
        }),
    }
}

pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content, DocumentFormat::from_path(path), path)
}

/// Creates the directory `path` will be written into.
pub fn ensure_parent_dir(path: &Path) -> Result<(), DocumentError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}

/// Serializes `value` to `path`, creating parent directories as needed.
pub fn write_document<T: Serialize>(value: &T, path: &Path) -> Result<(), DocumentError> {
    let io_err = |source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    };

    ensure_parent_dir(path)?;

    let rendered = match DocumentFormat::from_path(path) {
        DocumentFormat::Yaml => serde_yaml::to_string(value).map_err(|source| DocumentError::Yaml {
            path: path.to_path_buf(),
            source,
        })?,
        DocumentFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|source| DocumentError::Json {
                path: path.to_path_buf(),
                source,
            })?
        }
    };

    fs::write(path, rendered).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn format_follows_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.YML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("noext")), DocumentFormat::Json);
    }

    #[test]
    fn write_then_read_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.yaml");
        let mut data = BTreeMap::new();
        data.insert("Q1".to_string(), "Paris".to_string());

        write_document(&data, &path).unwrap();
        let back: BTreeMap<String, String> = read_document(&path).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_document::<BTreeMap<String, String>>(Path::new("/no/such/file.json"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Io { .. }));
        assert!(err.to_string().contains("/no/such/file.json"));
    }

    #[test]
    fn malformed_json_is_reported_as_json_error() {
        let err = parse_str::<BTreeMap<String, String>>("{", DocumentFormat::Json, Path::new("x"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::Json { .. }));
    }
}
