//! File-backed evaluation store.
//!
//! Keeps the whole store in a single pretty-printed JSON document:
//! `{ "evaluations": [...], "settings": { "<user_id>": {...} } }`.

use super::EvaluationStore;
use crate::error::{DashError, Result};
use crate::models::{EvaluationRecord, NewEvaluation, UserSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    evaluations: Vec<EvaluationRecord>,
    #[serde(default)]
    settings: BTreeMap<String, UserSettings>,
}

/// Evaluation store persisted as one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreDocument> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                DashError::Store(format!("failed to parse {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {} not found, starting empty", self.path.display());
                Ok(StoreDocument::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &StoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl EvaluationStore for JsonFileStore {
    async fn evaluations_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<EvaluationRecord>> {
        let doc = self.load().await?;

        let records: Vec<EvaluationRecord> = doc
            .evaluations
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .filter(|record| match record.created_at() {
                Ok(ts) => ts.with_timezone(&Utc) >= since,
                Err(_) => {
                    warn!(
                        "Record {} has unparsable created_at '{}'",
                        record.id, record.created_at
                    );
                    true
                }
            })
            .collect();

        debug!(
            "Loaded {} records for {} since {}",
            records.len(),
            user_id,
            since.to_rfc3339()
        );
        Ok(records)
    }

    async fn evaluation(&self, user_id: &str, id: &str) -> Result<EvaluationRecord> {
        let doc = self.load().await?;

        doc.evaluations
            .into_iter()
            .find(|record| record.id == id && record.user_id == user_id)
            .ok_or_else(|| DashError::NotFound(format!("evaluation {}", id)))
    }

    async fn insert_evaluation(
        &self,
        user_id: &str,
        evaluation: NewEvaluation,
    ) -> Result<EvaluationRecord> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;

        let record =
            evaluation.into_record(Uuid::new_v4().to_string(), user_id.to_string(), Utc::now());
        doc.evaluations.push(record.clone());
        self.save(&doc).await?;

        info!("Stored evaluation {} for {}", record.id, user_id);
        Ok(record)
    }

    async fn settings(&self, user_id: &str) -> Result<UserSettings> {
        let doc = self.load().await?;
        Ok(doc.settings.get(user_id).cloned().unwrap_or_default())
    }

    async fn save_settings(&self, user_id: &str, settings: UserSettings) -> Result<UserSettings> {
        settings.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;

        let settings = UserSettings {
            updated_at: Some(Utc::now()),
            ..settings
        };
        doc.settings.insert(user_id.to_string(), settings.clone());
        self.save(&doc).await?;

        info!("Saved settings for {}", user_id);
        Ok(settings)
    }
}
