//! Armazenamento dos documentos gerados (planilhas enviadas à seguradora)

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::config::StorageSettings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Caminho de arquivo inválido: {0}")]
    InvalidPath(String),

    #[error("Falha ao gravar {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait DocumentStorage: Send + Sync {
    /// Grava (sobrescrevendo) e devolve a URL pública do documento
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;
}

/// Armazena os documentos em disco, sob `root`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url,
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.export_dir, settings.public_base_url.clone())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStorage for LocalStorage {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        let io_err = |source: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, bytes).map_err(io_err)?;

        tracing::info!("📁 Documento gravado: {}", path.display());

        Ok(match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => path.display().to_string(),
        })
    }
}
