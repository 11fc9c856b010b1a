use crate::models::{IndexDatapoint, NamespaceRestriction, Neighbor};
use crate::traits::VectorIndex;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct VertexSettings {
    pub project_id: String,
    pub location: String,
    pub index_id: String,
    pub index_endpoint_id: String,
    pub deployed_index_id: String,
    pub access_token: String,
    /// Host of the `findNeighbors` endpoint; public endpoints get their own
    /// domain. Defaults to the regional API host.
    pub query_host: Option<String>,
    /// Overrides the regional API host, mostly for tests.
    pub api_host: Option<String>,
}

impl VertexSettings {
    fn api_host(&self) -> String {
        self.api_host
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.location))
    }

    fn upsert_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/indexes/{}:upsertDatapoints",
            self.api_host().trim_end_matches('/'),
            self.project_id,
            self.location,
            self.index_id
        )
    }

    fn find_neighbors_url(&self) -> String {
        let host = self.query_host.clone().unwrap_or_else(|| self.api_host());
        format!(
            "{}/v1/projects/{}/locations/{}/indexEndpoints/{}:findNeighbors",
            host.trim_end_matches('/'),
            self.project_id,
            self.location,
            self.index_endpoint_id
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Restriction<'a> {
    namespace: &'a str,
    allow_list: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Datapoint<'a> {
    datapoint_id: &'a str,
    feature_vector: &'a [f32],
    restricts: Vec<Restriction<'a>>,
}

fn restrictions(restricts: &[NamespaceRestriction]) -> Vec<Restriction<'_>> {
    restricts
        .iter()
        .map(|restrict| Restriction {
            namespace: &restrict.namespace,
            allow_list: &restrict.allow_list,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NearestNeighbors>,
}

#[derive(Debug, Deserialize)]
struct NearestNeighbors {
    #[serde(default)]
    neighbors: Vec<NeighborHit>,
}

#[derive(Debug, Deserialize)]
struct NeighborHit {
    datapoint: HitDatapoint,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HitDatapoint {
    #[serde(default)]
    datapoint_id: String,
}

/// Vertex AI Vector Search index reached over REST.
pub struct VertexVectorSearch {
    client: Client,
    settings: VertexSettings,
}

impl VertexVectorSearch {
    pub fn new(settings: VertexSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl VectorIndex for VertexVectorSearch {
    async fn upsert(&self, datapoints: &[IndexDatapoint]) -> Result<(), CollaboratorError> {
        if datapoints.is_empty() {
            return Ok(());
        }

        let body = datapoints
            .iter()
            .map(|datapoint| Datapoint {
                datapoint_id: &datapoint.datapoint_id,
                feature_vector: &datapoint.feature_vector,
                restricts: restrictions(&datapoint.restricts),
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .post(self.settings.upsert_url())
            .bearer_auth(&self.settings.access_token)
            .json(&json!({ "datapoints": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "vertex-vector-search",
                format!("upsertDatapoints returned {}", response.status()),
            ));
        }

        debug!(count = datapoints.len(), "upserted datapoints");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &[NamespaceRestriction],
    ) -> Result<Vec<Neighbor>, CollaboratorError> {
        let body = json!({
            "deployedIndexId": self.settings.deployed_index_id,
            "queries": [{
                "datapoint": {
                    "featureVector": vector,
                    "restricts": restrictions(filter),
                },
                "neighborCount": k,
            }],
        });

        let response = self
            .client
            .post(self.settings.find_neighbors_url())
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "vertex-vector-search",
                format!("findNeighbors returned {}", response.status()),
            ));
        }

        let parsed: FindNeighborsResponse = response.json().await?;
        Ok(parsed
            .nearest_neighbors
            .into_iter()
            .next()
            .map(|nearest| {
                nearest
                    .neighbors
                    .into_iter()
                    .map(|hit| Neighbor {
                        id: hit.datapoint.datapoint_id,
                        score: hit.distance,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
