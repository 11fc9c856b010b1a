use crate::traits::OcrProcessor;
use crate::CollaboratorError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct DocumentAiSettings {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    pub processor_version: Option<String>,
    pub access_token: String,
    /// Overrides `https://{location}-documentai.googleapis.com`.
    pub endpoint: Option<String>,
}

impl DocumentAiSettings {
    fn process_url(&self) -> String {
        let base = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-documentai.googleapis.com", self.location));
        let mut name = format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        );
        if let Some(version) = &self.processor_version {
            name = format!("{name}/processorVersions/{version}");
        }
        format!("{}/v1/{name}:process", base.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    raw_document: RawDocument<'a>,
    process_options: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

pub struct DocumentAiClient {
    client: Client,
    settings: DocumentAiSettings,
}

impl DocumentAiClient {
    pub fn new(settings: DocumentAiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl OcrProcessor for DocumentAiClient {
    async fn process(&self, content: &[u8], mime_type: &str) -> Result<Value, CollaboratorError> {
        let payload = ProcessRequest {
            raw_document: RawDocument {
                content: STANDARD.encode(content),
                mime_type,
            },
            process_options: serde_json::json!({
                "ocrConfig": {"enableNativePdfParsing": true}
            }),
        };

        let response = self
            .client
            .post(self.settings.process_url())
            .bearer_auth(&self.settings.access_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "documentai",
                format!("process returned {}", response.status()),
            ));
        }

        let mut parsed: Value = response.json().await?;
        parsed
            .get_mut("document")
            .map(Value::take)
            .ok_or_else(|| CollaboratorError::backend("documentai", "response has no document"))
    }
}

/// Mime type Document AI expects for a file name, by extension.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/pdf",
    }
}
