use crate::utils::error::{EnrichError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// CLI 用的本地檔案存取：讀取實體清單、寫出補全結果
#[derive(Debug, Clone)]
pub struct LocalFiles {
    base_path: PathBuf,
}

impl LocalFiles {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.base_path.join(candidate)
        }
    }

    /// 依副檔名讀取 .json（陣列）或 .csv（欄位名與 API 欄位相同）
    pub async fn read_entities<E: DeserializeOwned>(&self, path: &str) -> Result<Vec<E>> {
        let full_path = self.resolve(path);
        let data = tokio::fs::read(&full_path).await?;

        let extension = full_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        let entities: Vec<E> = match extension.as_deref() {
            Some("json") => serde_json::from_slice(&data)?,
            Some("csv") => {
                let mut reader = csv::ReaderBuilder::new()
                    .trim(csv::Trim::All)
                    .from_reader(data.as_slice());
                let mut rows = Vec::new();
                for row in reader.deserialize::<E>() {
                    rows.push(row?);
                }
                rows
            }
            _ => {
                return Err(EnrichError::InvalidConfigValueError {
                    field: "input".to_string(),
                    value: full_path.display().to_string(),
                    reason: "Entity files must be .json or .csv".to_string(),
                })
            }
        };

        tracing::debug!("📥 Loaded entities from {}", full_path.display());
        Ok(entities)
    }

    pub async fn write_json<T: Serialize>(&self, path: &str, value: &T) -> Result<PathBuf> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&full_path, body).await?;
        tracing::info!("💾 Results saved to {}", full_path.display());
        Ok(full_path)
    }
}
