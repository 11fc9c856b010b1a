use crate::models::{IndexDatapoint, NamespaceRestriction, Neighbor};
use crate::traits::VectorIndex;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>, vector_size: usize) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    pub async fn ensure_collection(&self) -> Result<(), CollaboratorError> {
        let url = format!("{}/collections/{}", self.endpoint, self.collection);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(CollaboratorError::backend("qdrant", response.status().to_string()));
        }

        let response = self
            .client
            .put(&url)
            .json(&json!({
                "vectors": {"size": self.vector_size, "distance": "Cosine"}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "qdrant",
                format!("collection setup failed with {}", response.status()),
            ));
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), CollaboratorError> {
        if vector.len() != self.vector_size {
            return Err(CollaboratorError::request(
                "qdrant",
                format!("vector dimension {} != {}", vector.len(), self.vector_size),
            ));
        }
        Ok(())
    }
}

/// Qdrant only accepts integer or UUID point ids; chunk ids are hashed into
/// a stable UUID so re-indexing overwrites the same point.
pub fn point_id(datapoint_id: &str) -> Uuid {
    let digest = Sha256::digest(datapoint_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn restriction_filter(filter: &[NamespaceRestriction]) -> Value {
    let must = filter
        .iter()
        .map(|restrict| {
            json!({
                "key": restrict.namespace,
                "match": {"any": restrict.allow_list},
            })
        })
        .collect::<Vec<_>>();
    json!({ "must": must })
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn upsert(&self, datapoints: &[IndexDatapoint]) -> Result<(), CollaboratorError> {
        let points = datapoints
            .iter()
            .map(|datapoint| {
                self.check_dimension(&datapoint.feature_vector)?;

                let mut payload = Map::new();
                payload.insert("chunk_id".to_string(), json!(datapoint.datapoint_id));
                for restrict in &datapoint.restricts {
                    payload.insert(restrict.namespace.clone(), json!(restrict.allow_list));
                }

                Ok(json!({
                    "id": point_id(&datapoint.datapoint_id).to_string(),
                    "vector": datapoint.feature_vector,
                    "payload": payload,
                }))
            })
            .collect::<Result<Vec<_>, CollaboratorError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend("qdrant", response.status().to_string()));
        }

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &[NamespaceRestriction],
    ) -> Result<Vec<Neighbor>, CollaboratorError> {
        self.check_dimension(vector)?;

        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if !filter.is_empty() {
            body["filter"] = restriction_filter(filter);
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend("qdrant", response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let neighbors = hits
            .iter()
            .filter_map(|hit| {
                let id = hit.pointer("/payload/chunk_id").and_then(Value::as_str)?;
                let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
                Some(Neighbor {
                    id: id.to_string(),
                    score,
                })
            })
            .collect();

        Ok(neighbors)
    }
}
