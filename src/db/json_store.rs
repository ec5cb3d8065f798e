// src/db/json_store.rs

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::{common::error::AppError, models::project::StoreDocument};

// Armazenamento em arquivo único: todo o documento é lido e reescrito a cada mutação.
#[derive(Clone)]
pub struct JsonStore {
    path: PathBuf,
    // Serializa os escritores deste processo; entre processos continua "último vence".
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lê o documento inteiro. Arquivo inexistente é um documento vazio.
    pub async fn load(&self) -> Result<StoreDocument, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reescreve o documento inteiro (arquivo temporário + rename).
    pub async fn save(&self, document: &StoreDocument) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Ciclo ler -> alterar -> gravar. Se a alteração falhar, nada é gravado.
    pub async fn update<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut StoreDocument) -> Result<T, AppError>,
    {
        let _guard = self.write_lock.lock().await;

        let mut document = self.load().await?;
        let result = apply(&mut document)?;
        self.save(&document).await?;

        Ok(result)
    }
}
