use crate::models::{IndexDatapoint, NamespaceRestriction, Neighbor};
use crate::traits::VectorIndex;
use crate::CollaboratorError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Brute-force cosine index, optionally persisted as a JSON snapshot so
/// separate CLI runs share one index.
#[derive(Default)]
pub struct LocalIndex {
    points: RwLock<BTreeMap<String, IndexDatapoint>>,
    snapshot: Option<PathBuf>,
}

impl LocalIndex {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub async fn open(snapshot: impl Into<PathBuf>) -> Result<Self, CollaboratorError> {
        let snapshot = snapshot.into();
        let points = match tokio::fs::read(&snapshot).await {
            Ok(bytes) => serde_json::from_slice::<Vec<IndexDatapoint>>(&bytes)?
                .into_iter()
                .map(|point| (point.datapoint_id.clone(), point))
                .collect(),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            points: RwLock::new(points),
            snapshot: Some(snapshot),
        })
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }

    async fn persist(&self, points: &BTreeMap<String, IndexDatapoint>) -> Result<(), CollaboratorError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let values = points.values().collect::<Vec<_>>();
        tokio::fs::write(path, serde_json::to_vec(&values)?).await?;
        Ok(())
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let left_norm = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn upsert(&self, datapoints: &[IndexDatapoint]) -> Result<(), CollaboratorError> {
        let mut points = self.points.write().await;
        for datapoint in datapoints {
            points.insert(datapoint.datapoint_id.clone(), datapoint.clone());
        }
        self.persist(&points).await
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &[NamespaceRestriction],
    ) -> Result<Vec<Neighbor>, CollaboratorError> {
        let points = self.points.read().await;
        let mut scored = points
            .values()
            .filter(|point| filter.iter().all(|restrict| restrict.admits(&point.restricts)))
            .map(|point| Neighbor {
                id: point.datapoint_id.clone(),
                score: cosine(vector, &point.feature_vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
