//! Request and response bodies of a generation batch.

use super::error::{GenerationError, Result};
use crate::common::{DocumentKind, ErrorClass, FailureKind, Value};
use serde::{Deserialize, Serialize};

/// One template to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub template_id: String,
    /// Expected kind; the stored descriptor has the final say
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_kind: Option<DocumentKind>,
    #[serde(default)]
    pub data: Value,
}

/// A batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationEnvelope {
    pub templates: Vec<TemplateRequest>,
    /// Merged under every template's `data`
    #[serde(default)]
    pub shared_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_to: Option<String>,
    #[serde(default)]
    pub download_only: bool,
}

impl GenerationEnvelope {
    pub fn new(templates: Vec<TemplateRequest>) -> Self {
        Self {
            templates,
            shared_data: Value::Null,
            deliver_to: None,
            download_only: false,
        }
    }

    /// Decode a JSON body, rejecting envelopes the batch cannot run.
    pub fn from_json(body: serde_json::Value) -> Result<Self> {
        let malformed = |msg: String| GenerationError::MalformedRequest(msg);

        let object = body
            .as_object()
            .ok_or_else(|| malformed("body must be a JSON object".to_string()))?;
        let templates = match object.get("templates") {
            Some(serde_json::Value::Array(items)) => items,
            Some(_) => return Err(malformed("templates must be a list".to_string())),
            None => return Err(malformed("templates is required".to_string())),
        };
        if templates.is_empty() {
            return Err(malformed("templates is empty".to_string()));
        }
        for (i, item) in templates.iter().enumerate() {
            match item.get("templateId") {
                Some(serde_json::Value::String(id)) if !id.trim().is_empty() => {},
                _ => return Err(malformed(format!("templates[{i}] has no templateId"))),
            }
        }

        serde_json::from_value(body).map_err(|e| malformed(e.to_string()))
    }
}

/// A generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SucceededFile {
    pub file_name: String,
    /// Where the document was stored; absent for download-only batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub document_kind: DocumentKind,
    pub template_name: String,
    pub missing_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_sheets: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
}

/// A batch item that produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub template_id: String,
    pub reason: FailureKind,
    pub message: String,
    pub class: ErrorClass,
}

impl FailedItem {
    pub fn new(template_id: impl Into<String>, reason: FailureKind, message: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            reason,
            message: message.into(),
            class: reason.class(),
        }
    }

    pub fn from_error(template_id: &str, error: &GenerationError) -> Self {
        Self::new(template_id, error.kind(), error.to_string())
    }
}

/// Outcome of mailing the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub to: String,
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a batch with at least one generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub succeeded_files: Vec<SucceededFile>,
    pub failed_items: Vec<FailedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
}

impl GenerationResponse {
    /// Partial success is still success.
    pub fn status_code(&self) -> u16 {
        200
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_envelope() {
        let envelope = GenerationEnvelope::from_json(json!({
            "templates": [
                {"templateId": "t1", "documentKind": "docx", "data": {"customer": {"full_name": "Nguyen Van A"}}},
                {"templateId": "t2"}
            ],
            "sharedData": {"branch": "Hue"},
            "deliverTo": "ops@example.com",
            "downloadOnly": false
        }))
        .unwrap();
        assert_eq!(envelope.templates.len(), 2);
        assert_eq!(envelope.templates[0].document_kind, Some(DocumentKind::WordProcessing));
        assert!(envelope.templates[1].data.is_null());
        assert_eq!(envelope.shared_data.lookup("branch").and_then(Value::as_text).as_deref(), Some("Hue"));
        assert_eq!(envelope.deliver_to.as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_malformed_envelopes() {
        for body in [
            json!([]),
            json!({}),
            json!({"templates": {"templateId": "t1"}}),
            json!({"templates": []}),
            json!({"templates": [{"data": {}}]}),
            json!({"templates": [{"templateId": ""}]}),
            json!({"templates": [{"templateId": "t1", "documentKind": "pptx"}]}),
        ] {
            let err = GenerationEnvelope::from_json(body.clone()).unwrap_err();
            assert_eq!(err.status_code(), 400, "{body}");
        }
    }

    #[test]
    fn test_response_shape() {
        let response = GenerationResponse {
            succeeded_files: vec![SucceededFile {
                file_name: "a.docx".into(),
                url: None,
                document_kind: DocumentKind::WordProcessing,
                template_name: "A".into(),
                missing_variables: vec!["x".into()],
                skipped_sheets: vec![],
                warnings: vec![],
                content_base64: Some("UEs=".into()),
            }],
            failed_items: vec![FailedItem::new("t9", FailureKind::TemplateNotFound, "No template with id t9")],
            delivery: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["succeededFiles"][0]["missingVariables"], json!(["x"]));
        assert_eq!(json["succeededFiles"][0]["contentBase64"], json!("UEs="));
        assert!(json["succeededFiles"][0].get("url").is_none());
        assert_eq!(json["failedItems"][0]["reason"], json!("TemplateNotFound"));
        assert_eq!(json["failedItems"][0]["class"], json!("request"));
        assert_eq!(response.status_code(), 200);
    }
}
