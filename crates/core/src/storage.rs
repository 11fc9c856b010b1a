use crate::traits::ObjectStore;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;

/// Supabase Storage bucket reached through its REST object API.
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, CollaboratorError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            client: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        let response = self
            .client
            .get(self.object_url(path))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "supabase",
                format!("download of {path} returned {}", response.status()),
            ));
        }

        let bytes = response.bytes().await?;
        debug!(path, size = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "supabase",
                format!("upload of {path} returned {}", response.status()),
            ));
        }

        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

/// Object storage backed by a directory, for offline runs.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, CollaboratorError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes || path.trim().is_empty() {
            return Err(CollaboratorError::request(
                "local-storage",
                format!("object path {path:?} is not a relative path inside the store"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn download(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::read(&target).await?)
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), CollaboratorError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        let target = self.root.join(path.trim_start_matches('/'));
        let absolute = if target.is_absolute() {
            target
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&target))
                .unwrap_or(target)
        };
        Url::from_file_path(&absolute)
            .map(|url| url.to_string())
            .unwrap_or_else(|()| absolute.to_string_lossy().to_string())
    }
}
