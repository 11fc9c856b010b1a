use crate::models::{IndexDatapoint, NamespaceRestriction, Neighbor};
use crate::CollaboratorError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, datapoints: &[IndexDatapoint]) -> Result<(), CollaboratorError>;

    /// Nearest neighbours of `vector`, best match first.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &[NamespaceRestriction],
    ) -> Result<Vec<Neighbor>, CollaboratorError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, path: &str) -> Result<Vec<u8>, CollaboratorError>;

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), CollaboratorError>;

    fn public_url(&self, path: &str) -> String;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait OcrProcessor: Send + Sync {
    /// Raw Document AI `Document` JSON for the given bytes.
    async fn process(&self, content: &[u8], mime_type: &str) -> Result<Value, CollaboratorError>;
}
