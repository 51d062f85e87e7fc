//! Template descriptors and the generated-file ledger.
//!
//! Both live in the metadata store as JSON arrays, under [`TEMPLATES_KEY`] and
//! [`GENERATED_FILES_KEY`]. Updates are read-modify-write, so they are
//! serialized through one lock per registry.

use super::error::{GenerationError, Result};
use crate::common::DocumentKind;
use crate::store::{BlobStore, MetadataStore};
use crate::validate::Validator;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub const TEMPLATES_KEY: &str = "templates";
pub const GENERATED_FILES_KEY: &str = "generated_files";

/// A stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: String,
    pub display_name: String,
    pub document_kind: DocumentKind,
    /// Blob store URL of the template file
    pub location_ref: String,
    pub original_file_name: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry for one persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub id: String,
    pub file_name: String,
    pub url: String,
    pub document_kind: DocumentKind,
    pub template_name: String,
    pub created_at: DateTime<Utc>,
}

/// A template upload.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub display_name: String,
    pub original_file_name: String,
    pub document_kind: DocumentKind,
    pub content: Bytes,
}

#[derive(Clone)]
pub struct TemplateRegistry {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry").finish_non_exhaustive()
    }
}

impl TemplateRegistry {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            metadata,
            blobs,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.metadata.get(key).await? {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| GenerationError::metadata(key, e)),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, records: &[T]) -> Result<()> {
        let value = serde_json::to_value(records).map_err(|e| GenerationError::metadata(key, e))?;
        self.metadata.set(key, value).await?;
        Ok(())
    }

    pub async fn list_templates(&self) -> Result<Vec<TemplateDescriptor>> {
        self.load(TEMPLATES_KEY).await
    }

    pub async fn find_template(&self, id: &str) -> Result<TemplateDescriptor> {
        self.list_templates()
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| GenerationError::TemplateNotFound(id.to_string()))
    }

    /// Validate, store and register a template.
    pub async fn upload_template(&self, upload: NewTemplate, validator: &Validator) -> Result<TemplateDescriptor> {
        validator
            .validate(&upload.content, upload.document_kind)
            .into_result()?;

        let id = Uuid::new_v4().to_string();
        let key = format!("templates/{id}.{}", upload.document_kind.extension());
        let location_ref = self.blobs.put(&key, upload.content).await?;
        let descriptor = TemplateDescriptor {
            id,
            display_name: upload.display_name,
            document_kind: upload.document_kind,
            location_ref,
            original_file_name: upload.original_file_name,
            created_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        let mut templates = self.list_templates().await?;
        templates.push(descriptor.clone());
        self.save(TEMPLATES_KEY, &templates).await?;
        info!(id = %descriptor.id, name = %descriptor.display_name, "registered template");
        Ok(descriptor)
    }

    /// Remove a template's file and descriptor.
    pub async fn delete_template(&self, id: &str) -> Result<TemplateDescriptor> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.list_templates().await?;
        let index = templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| GenerationError::TemplateNotFound(id.to_string()))?;
        let removed = templates.remove(index);
        self.blobs.delete(&removed.location_ref).await?;
        self.save(TEMPLATES_KEY, &templates).await?;
        info!(id, "deleted template");
        Ok(removed)
    }

    pub async fn list_generated(&self) -> Result<Vec<GeneratedFile>> {
        self.load(GENERATED_FILES_KEY).await
    }

    pub(crate) async fn record_generated(&self, file: GeneratedFile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut files: Vec<GeneratedFile> = self.list_generated().await?;
        files.push(file);
        self.save(GENERATED_FILES_KEY, &files).await
    }

    /// Remove a generated document's file and ledger record.
    ///
    /// Returns `None` when no record has this id.
    pub async fn delete_generated(&self, id: &str) -> Result<Option<GeneratedFile>> {
        let _guard = self.write_lock.lock().await;
        let mut files = self.list_generated().await?;
        let Some(index) = files.iter().position(|f| f.id == id) else {
            return Ok(None);
        };
        let removed = files.remove(index);
        self.blobs.delete(&removed.url).await?;
        self.save(GENERATED_FILES_KEY, &files).await?;
        Ok(Some(removed))
    }
}
