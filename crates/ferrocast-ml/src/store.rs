//! Per-symbol model persistence.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use ferrocast_core::Symbol;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ForecastError, StoreError};
use crate::trainer::ModelArtifact;

const ARTIFACT_SUFFIX: &str = ".model.json";

/// Keyed store holding at most one artifact per symbol.
pub trait ModelStore: Send + Sync {
    /// Store `artifact` under `symbol`, replacing any previous one atomically.
    fn put(&self, symbol: &Symbol, artifact: &ModelArtifact) -> Result<(), ForecastError>;

    fn get(&self, symbol: &Symbol) -> Result<ModelArtifact, ForecastError>;

    /// Stored symbols, sorted.
    fn symbols(&self) -> Result<Vec<Symbol>, ForecastError>;

    fn remove(&self, symbol: &Symbol) -> Result<(), ForecastError>;
}

fn check_key(symbol: &Symbol, artifact: &ModelArtifact) -> Result<(), StoreError> {
    if symbol != &artifact.symbol {
        return Err(StoreError::SymbolMismatch {
            key: symbol.clone(),
            artifact: artifact.symbol.clone(),
        });
    }
    Ok(())
}

/// One JSON document per symbol under `root`.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, symbol: &Symbol) -> PathBuf {
        self.root.join(format!("{}{ARTIFACT_SUFFIX}", symbol.as_str()))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_error = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_error)?;
        let mut staged = NamedTempFile::new_in(&self.root).map_err(io_error)?;
        staged.write_all(bytes).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged
            .persist(path)
            .map_err(|error| io_error(error.error))?;
        Ok(())
    }
}

impl ModelStore for FsModelStore {
    fn put(&self, symbol: &Symbol, artifact: &ModelArtifact) -> Result<(), ForecastError> {
        check_key(symbol, artifact)?;
        let bytes = serde_json::to_vec_pretty(artifact).map_err(StoreError::from)?;
        let path = self.path_for(symbol);
        self.write_atomic(&path, &bytes)?;
        debug!(symbol = %symbol, path = %path.display(), "stored model artifact");
        Ok(())
    }

    fn get(&self, symbol: &Symbol) -> Result<ModelArtifact, ForecastError> {
        let path = self.path_for(symbol);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForecastError::ModelNotFound {
                    symbol: symbol.clone(),
                })
            }
            Err(source) => return Err(StoreError::Io { path, source }.into()),
        };

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|error| StoreError::Corrupt {
                path: path.clone(),
                message: error.to_string(),
            })?;
        if &artifact.symbol != symbol {
            return Err(StoreError::Corrupt {
                path,
                message: format!("file holds an artifact for '{}'", artifact.symbol),
            }
            .into());
        }
        Ok(artifact)
    }

    fn symbols(&self) -> Result<Vec<Symbol>, ForecastError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                }
                .into())
            }
        };

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(ARTIFACT_SUFFIX)) else {
                continue;
            };
            if let Ok(symbol) = Symbol::parse(stem) {
                symbols.push(symbol);
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn remove(&self, symbol: &Symbol) -> Result<(), ForecastError> {
        let path = self.path_for(symbol);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(ForecastError::ModelNotFound {
                    symbol: symbol.clone(),
                })
            }
            Err(source) => Err(StoreError::Io { path, source }.into()),
        }
    }
}

/// In-process store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    artifacts: RwLock<BTreeMap<Symbol, ModelArtifact>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn put(&self, symbol: &Symbol, artifact: &ModelArtifact) -> Result<(), ForecastError> {
        check_key(symbol, artifact)?;
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::Poisoned)?;
        artifacts.insert(symbol.clone(), artifact.clone());
        Ok(())
    }

    fn get(&self, symbol: &Symbol) -> Result<ModelArtifact, ForecastError> {
        let artifacts = self.artifacts.read().map_err(|_| StoreError::Poisoned)?;
        artifacts
            .get(symbol)
            .cloned()
            .ok_or_else(|| ForecastError::ModelNotFound {
                symbol: symbol.clone(),
            })
    }

    fn symbols(&self) -> Result<Vec<Symbol>, ForecastError> {
        let artifacts = self.artifacts.read().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.keys().cloned().collect())
    }

    fn remove(&self, symbol: &Symbol) -> Result<(), ForecastError> {
        let mut artifacts = self.artifacts.write().map_err(|_| StoreError::Poisoned)?;
        artifacts
            .remove(symbol)
            .map(|_| ())
            .ok_or_else(|| ForecastError::ModelNotFound {
                symbol: symbol.clone(),
            })
    }
}
