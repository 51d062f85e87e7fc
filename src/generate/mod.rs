//! Batch generation.
//!
//! [`Orchestrator::generate`] runs every item of a [`GenerationEnvelope`]
//! through fetch, validate, render and persist, several items at a time.
//! Item failures are collected, never propagated: the batch only fails when
//! nothing at all was generated.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docstamp::config::EngineConfig;
//! use docstamp::generate::{GenerationEnvelope, Orchestrator};
//! use docstamp::store::{MemoryBlobStore, MemoryMetadataStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::new(
//!     &EngineConfig::default(),
//!     Arc::new(MemoryMetadataStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//! );
//! let envelope = GenerationEnvelope::from_json(serde_json::json!({
//!     "templates": [{"templateId": "t1", "data": {"customer": {"full_name": "Nguyen Van A"}}}]
//! }))?;
//! let response = orchestrator.generate(envelope).await?;
//! for file in &response.succeeded_files {
//!     println!("{} missing {:?}", file.file_name, file.missing_variables);
//! }
//! # Ok(())
//! # }
//! ```

mod envelope;
mod error;
pub mod naming;
mod registry;

pub use envelope::{
    Delivery, FailedItem, GenerationEnvelope, GenerationResponse, SucceededFile, TemplateRequest,
};
pub use error::{GenerationError, Result};
pub use registry::{
    GENERATED_FILES_KEY, GeneratedFile, NewTemplate, TEMPLATES_KEY, TemplateDescriptor, TemplateRegistry,
};

use crate::common::{DocumentKind, Value};
use crate::config::EngineConfig;
use crate::fetch::{FetchConfig, TemplateFetcher};
use crate::ooxml::{self, Rendered, TemplateOptions};
use crate::store::{Attachment, BlobSource, BlobStore, MailMessage, Mailer, MetadataStore};
use crate::validate::{ValidationVerdict, Validator};
use base64::Engine as _;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of one batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Fetching,
    Validating,
    Rendering,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemState::Pending => "pending",
            ItemState::Fetching => "fetching",
            ItemState::Validating => "validating",
            ItemState::Rendering => "rendering",
            ItemState::Persisting => "persisting",
            ItemState::Done => "done",
            ItemState::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn transition(item: usize, template_id: &str, state: ItemState) {
    debug!(item, template_id, %state, "item state");
}

/// Drives generation batches against the configured stores.
pub struct Orchestrator {
    registry: TemplateRegistry,
    fetcher: TemplateFetcher,
    blobs: Arc<dyn BlobStore>,
    mailer: Option<Arc<dyn Mailer>>,
    validator: Validator,
    options: TemplateOptions,
    concurrency: usize,
    fetch_config: FetchConfig,
}

impl Orchestrator {
    pub fn new(config: &EngineConfig, metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let source: Arc<dyn BlobSource> = blobs.clone();
        Self {
            registry: TemplateRegistry::new(metadata, blobs.clone()),
            fetcher: TemplateFetcher::new(source, config.fetch.clone()),
            blobs,
            mailer: None,
            validator: Validator::new(config.validator.clone()),
            options: config.template.clone(),
            concurrency: config.concurrency.max(1),
            fetch_config: config.fetch.clone(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Fetch templates from `source` instead of the output blob store.
    pub fn with_template_source(mut self, source: Arc<dyn BlobSource>) -> Self {
        self.fetcher = TemplateFetcher::new(source, self.fetch_config.clone());
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Parse a JSON body and run it.
    pub async fn generate_json(&self, body: serde_json::Value) -> Result<GenerationResponse> {
        self.generate(GenerationEnvelope::from_json(body)?).await
    }

    /// Run a batch.
    ///
    /// Items are processed `concurrency` at a time and reported in request
    /// order. Fails with [`GenerationError::NoFilesGenerated`] when no item
    /// succeeded.
    pub async fn generate(&self, envelope: GenerationEnvelope) -> Result<GenerationResponse> {
        let batch = envelope.templates.len();
        info!(items = batch, download_only = envelope.download_only, "generation batch started");

        let results: Vec<std::result::Result<SucceededFile, FailedItem>> =
            futures::stream::iter(envelope.templates.iter().enumerate())
                .map(|(index, item)| self.process(index, item, &envelope.shared_data, envelope.download_only))
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut response = GenerationResponse {
            succeeded_files: Vec::new(),
            failed_items: Vec::new(),
            delivery: None,
        };
        for result in results {
            match result {
                Ok(file) => response.succeeded_files.push(file),
                Err(failed) => response.failed_items.push(failed),
            }
        }

        info!(
            succeeded = response.succeeded_files.len(),
            failed = response.failed_items.len(),
            "generation batch finished"
        );
        if response.succeeded_files.is_empty() {
            return Err(GenerationError::NoFilesGenerated {
                failed: response.failed_items,
            });
        }

        if let Some(to) = envelope.deliver_to.as_deref()
            && !envelope.download_only
        {
            response.delivery = Some(self.deliver(to, &response.succeeded_files).await);
        }
        Ok(response)
    }

    async fn process(
        &self,
        index: usize,
        item: &TemplateRequest,
        shared: &Value,
        download_only: bool,
    ) -> std::result::Result<SucceededFile, FailedItem> {
        let id = item.template_id.as_str();
        transition(index, id, ItemState::Pending);
        self.run_item(index, item, shared, download_only)
            .await
            .inspect(|_| transition(index, id, ItemState::Done))
            .map_err(|e| {
                warn!(item = index, template_id = id, state = %ItemState::Failed, reason = %e.kind(), error = %e, "item failed");
                FailedItem::from_error(id, &e)
            })
    }

    async fn run_item(
        &self,
        index: usize,
        item: &TemplateRequest,
        shared: &Value,
        download_only: bool,
    ) -> Result<SucceededFile> {
        let id = item.template_id.as_str();
        let descriptor = self.registry.find_template(id).await?;
        let kind = descriptor.document_kind;
        if let Some(requested) = item.document_kind
            && requested != kind
        {
            warn!(template_id = id, %requested, stored = %kind, "request names another kind, using the stored one");
        }

        transition(index, id, ItemState::Fetching);
        let buffer = self.fetcher.fetch(&descriptor.location_ref).await?;

        let context = item.data.merged_over(shared);
        let rendered = self.validate_and_render(index, id, buffer, kind, context).await?;

        let file_name = naming::output_file_name(&descriptor.display_name, kind, Utc::now().naive_utc());
        let mut file = SucceededFile {
            file_name: file_name.clone(),
            url: None,
            document_kind: kind,
            template_name: descriptor.display_name.clone(),
            missing_variables: rendered.report.missing_variables,
            skipped_sheets: rendered.report.skipped_sheets,
            warnings: rendered.report.warnings,
            content_base64: None,
        };

        if download_only {
            file.content_base64 = Some(base64::engine::general_purpose::STANDARD.encode(&rendered.content));
            return Ok(file);
        }

        transition(index, id, ItemState::Persisting);
        let url = self
            .blobs
            .put(&format!("generated/{file_name}"), Bytes::from(rendered.content))
            .await?;
        self.registry
            .record_generated(GeneratedFile {
                id: Uuid::new_v4().to_string(),
                file_name,
                url: url.clone(),
                document_kind: kind,
                template_name: descriptor.display_name,
                created_at: Utc::now(),
            })
            .await?;
        file.url = Some(url);
        Ok(file)
    }

    /// Validation and rendering are CPU-bound and run on the blocking pool.
    async fn validate_and_render(
        &self,
        index: usize,
        template_id: &str,
        buffer: Bytes,
        kind: DocumentKind,
        context: Value,
    ) -> Result<Rendered> {
        let validator = self.validator.clone();
        let options = self.options.clone();
        let id = template_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<Rendered> {
            transition(index, &id, ItemState::Validating);
            let (mut archive, _) = validator.open_validated(buffer, kind)?;
            transition(index, &id, ItemState::Rendering);
            Ok(ooxml::render_template(kind, &options, &mut archive, &context)?)
        })
        .await
        .map_err(|e| GenerationError::Worker(e.to_string()))?
    }

    async fn deliver(&self, to: &str, files: &[SucceededFile]) -> Delivery {
        let attachments: Vec<Attachment> = files
            .iter()
            .filter_map(|f| {
                f.url.as_ref().map(|url| Attachment {
                    file_name: f.file_name.clone(),
                    source_url: url.clone(),
                })
            })
            .collect();
        let body = files
            .iter()
            .map(|f| format!("- {} ({})", f.file_name, f.template_name))
            .collect::<Vec<_>>()
            .join("\n");
        let message = MailMessage {
            to: to.to_string(),
            subject: format!("Generated documents ({})", files.len()),
            body,
            attachments,
        };

        let outcome = match &self.mailer {
            Some(mailer) => mailer.send(message).await.map_err(|e| e.to_string()),
            None => Err("no mailer configured".to_string()),
        };
        match outcome {
            Ok(()) => {
                info!(to, files = files.len(), "delivered batch");
                Delivery {
                    to: to.to_string(),
                    sent: true,
                    reason: None,
                    message: None,
                }
            },
            Err(message) => {
                warn!(to, error = %message, "delivery failed");
                Delivery {
                    to: to.to_string(),
                    sent: false,
                    reason: Some(crate::common::FailureKind::DeliveryFailed),
                    message: Some(message),
                }
            },
        }
    }

    /// Fetch and validate a stored template without rendering it.
    pub async fn inspect_template(&self, id: &str) -> Result<(TemplateDescriptor, ValidationVerdict)> {
        let descriptor = self.registry.find_template(id).await?;
        let buffer = self.fetcher.fetch(&descriptor.location_ref).await?;
        let verdict = self.validator.validate(&buffer, descriptor.document_kind);
        Ok((descriptor, verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FailureKind;
    use crate::store::{MemoryBlobStore, MemoryMetadataStore, OutboxMailer};
    use crate::testing::{document_text, docx_with_body, xlsx_with_sheets};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        orchestrator: Orchestrator,
        blobs: Arc<MemoryBlobStore>,
    }

    fn fixture() -> Fixture {
        fixture_with(None)
    }

    fn fixture_with(mailer: Option<Arc<dyn Mailer>>) -> Fixture {
        let config = EngineConfig {
            fetch: FetchConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                attempt_timeout_ms: 1000,
            },
            ..Default::default()
        };
        let blobs = Arc::new(MemoryBlobStore::new());
        let mut orchestrator = Orchestrator::new(&config, Arc::new(MemoryMetadataStore::new()), blobs.clone());
        if let Some(mailer) = mailer {
            orchestrator = orchestrator.with_mailer(mailer);
        }
        Fixture { orchestrator, blobs }
    }

    async fn add_template(f: &Fixture, name: &str, kind: DocumentKind, content: Vec<u8>) -> String {
        f.orchestrator
            .registry()
            .upload_template(
                NewTemplate {
                    display_name: name.into(),
                    original_file_name: format!("{name}.{}", kind.extension()),
                    document_kind: kind,
                    content: Bytes::from(content),
                },
                f.orchestrator.validator(),
            )
            .await
            .unwrap()
            .id
    }

    fn greeting_docx() -> Vec<u8> {
        docx_with_body("<w:p><w:r><w:t>Kính gửi {customer.full_name} - {branch}</w:t></w:r></w:p>")
    }

    /// Counts overlapping `get` calls on the way to the wrapped store.
    struct GaugedSource {
        inner: Arc<MemoryBlobStore>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl BlobSource for GaugedSource {
        async fn get(&self, location: &str) -> crate::store::Result<crate::store::BlobObject> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let result = self.inner.get(location).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn test_batch_respects_concurrency_bound() {
        let config = EngineConfig {
            concurrency: 2,
            ..Default::default()
        };
        let blobs = Arc::new(MemoryBlobStore::new());
        let gauge = Arc::new(GaugedSource {
            inner: blobs.clone(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let f = Fixture {
            orchestrator: Orchestrator::new(&config, Arc::new(MemoryMetadataStore::new()), blobs.clone())
                .with_template_source(gauge.clone()),
            blobs,
        };

        let mut templates = Vec::new();
        for i in 0..6 {
            let id = add_template(&f, &format!("Greeting {i}"), DocumentKind::WordProcessing, greeting_docx()).await;
            templates.push(json!({"templateId": id, "data": {"branch": format!("B{i}")}}));
        }

        let response = f
            .orchestrator
            .generate_json(json!({"templates": templates}))
            .await
            .unwrap();
        assert_eq!(response.succeeded_files.len(), 6);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(gauge.in_flight.load(Ordering::SeqCst), 0);

        // Request order survives concurrent completion
        for (i, file) in response.succeeded_files.iter().enumerate() {
            assert_eq!(file.template_name, format!("Greeting {i}"));
        }
    }

    #[tokio::test]
    async fn test_batch_with_missing_template() {
        let f = fixture();
        let first = add_template(&f, "Tờ trình thẩm định", DocumentKind::WordProcessing, greeting_docx()).await;
        let third = add_template(&f, "Giấy đề nghị", DocumentKind::WordProcessing, greeting_docx()).await;

        let response = f
            .orchestrator
            .generate_json(json!({
                "templates": [
                    {"templateId": first, "data": {"customer": {"full_name": "Nguyen Van A"}}},
                    {"templateId": "does-not-exist", "data": {}},
                    {"templateId": third, "data": {"customer": {"full_name": "Tran Thi B"}, "branch": "Da Nang"}}
                ],
                "sharedData": {"branch": "Hue"}
            }))
            .await
            .unwrap();

        assert_eq!(response.succeeded_files.len(), 2);
        assert_eq!(response.failed_items.len(), 1);
        let failed = &response.failed_items[0];
        assert_eq!(failed.template_id, "does-not-exist");
        assert_eq!(failed.reason, FailureKind::TemplateNotFound);

        assert!(response.succeeded_files[0].file_name.starts_with("to_trinh_tham_dinh_"));
        let url = response.succeeded_files[0].url.clone().unwrap();
        let stored = f.blobs.get(&url).await.unwrap().bytes;
        assert!(document_text(&stored).contains("Kính gửi Nguyen Van A - Hue"));

        let third_url = response.succeeded_files[1].url.clone().unwrap();
        let stored = f.blobs.get(&third_url).await.unwrap().bytes;
        assert!(document_text(&stored).contains("Tran Thi B - Da Nang"));

        let ledger = f.orchestrator.registry().list_generated().await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(response.delivery.is_none());
    }

    #[tokio::test]
    async fn test_all_items_failing_is_no_files_generated() {
        let f = fixture();
        let err = f
            .orchestrator
            .generate(GenerationEnvelope::new(vec![TemplateRequest {
                template_id: "ghost".into(),
                document_kind: None,
                data: Value::Null,
            }]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::NoFilesGenerated);
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_missing_variables_are_reported() {
        let f = fixture();
        let id = add_template(&f, "Greeting", DocumentKind::WordProcessing, greeting_docx()).await;
        let response = f
            .orchestrator
            .generate_json(json!({"templates": [{"templateId": id, "data": {}}]}))
            .await
            .unwrap();
        assert_eq!(
            response.succeeded_files[0].missing_variables,
            vec!["customer.full_name", "branch"]
        );
    }

    #[tokio::test]
    async fn test_download_only_skips_persistence() {
        let f = fixture();
        let id = add_template(&f, "Greeting", DocumentKind::WordProcessing, greeting_docx()).await;
        let stored_before = f.blobs.len();

        let response = f
            .orchestrator
            .generate_json(json!({
                "templates": [{"templateId": id, "data": {"customer": {"full_name": "A"}, "branch": "B"}}],
                "downloadOnly": true,
                "deliverTo": "ops@example.com"
            }))
            .await
            .unwrap();

        let file = &response.succeeded_files[0];
        assert!(file.url.is_none());
        let content = base64::engine::general_purpose::STANDARD
            .decode(file.content_base64.as_ref().unwrap())
            .unwrap();
        assert!(document_text(&content).contains("Kính gửi A - B"));
        assert_eq!(f.blobs.len(), stored_before);
        assert!(f.orchestrator.registry().list_generated().await.unwrap().is_empty());
        assert!(response.delivery.is_none());
    }

    #[tokio::test]
    async fn test_delivery_attaches_generated_files() {
        let mailer = Arc::new(OutboxMailer::new());
        let f = fixture_with(Some(mailer.clone()));
        let id = add_template(&f, "Greeting", DocumentKind::WordProcessing, greeting_docx()).await;

        let response = f
            .orchestrator
            .generate_json(json!({"templates": [{"templateId": id}], "deliverTo": "ops@example.com"}))
            .await
            .unwrap();

        let delivery = response.delivery.unwrap();
        assert!(delivery.sent);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachments.len(), 1);
        assert_eq!(sent[0].attachments[0].file_name, response.succeeded_files[0].file_name);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_artifacts() {
        let f = fixture_with(Some(Arc::new(OutboxMailer::rejecting("quota exceeded"))));
        let id = add_template(&f, "Greeting", DocumentKind::WordProcessing, greeting_docx()).await;

        let response = f
            .orchestrator
            .generate_json(json!({"templates": [{"templateId": id}], "deliverTo": "ops@example.com"}))
            .await
            .unwrap();

        let delivery = response.delivery.unwrap();
        assert!(!delivery.sent);
        assert_eq!(delivery.reason, Some(FailureKind::DeliveryFailed));
        assert!(delivery.message.unwrap().contains("quota exceeded"));
        assert_eq!(f.orchestrator.registry().list_generated().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spreadsheet_item() {
        let f = fixture();
        let header = r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Amount</t></is></c></row>"#;
        let id = add_template(
            &f,
            "Bảng kê",
            DocumentKind::Spreadsheet,
            xlsx_with_sheets(&[("Sheet1", header)]),
        )
        .await;

        let response = f
            .orchestrator
            .generate_json(json!({
                "templates": [{"templateId": id, "data": {"Sheet1": [{"Amount": 1000}, {"Amount": 2000}], "Nope": []}}]
            }))
            .await
            .unwrap();
        let file = &response.succeeded_files[0];
        assert!(file.file_name.ends_with(".xlsx"));
        assert_eq!(file.skipped_sheets, vec!["Nope"]);
    }

    #[tokio::test]
    async fn test_corrupted_template_fails_item() {
        let f = fixture();
        let id = add_template(&f, "Greeting", DocumentKind::WordProcessing, greeting_docx()).await;
        let descriptor = f.orchestrator.registry().find_template(&id).await.unwrap();
        f.blobs
            .put(
                descriptor.location_ref.trim_start_matches("memory://"),
                Bytes::from(vec![b'x'; 2048]),
            )
            .await
            .unwrap();

        let err = f
            .orchestrator
            .generate_json(json!({"templates": [{"templateId": id}]}))
            .await
            .unwrap_err();
        match err {
            GenerationError::NoFilesGenerated { failed } => {
                assert_eq!(failed[0].reason, FailureKind::NotAnArchive);
                assert_eq!(failed[0].class, crate::common::ErrorClass::Template);
            },
            other => panic!("unexpected {other:?}"),
        }

        let (_, verdict) = f.orchestrator.inspect_template(&id).await.unwrap();
        assert_eq!(verdict.failure, Some(FailureKind::NotAnArchive));
    }

    #[tokio::test]
    async fn test_malformed_request() {
        let f = fixture();
        let err = f
            .orchestrator
            .generate_json(json!({"templates": "t1"}))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
