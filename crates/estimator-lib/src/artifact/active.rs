//! The currently served artifact

use super::ModelArtifact;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whether an artifact is being served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingState {
    Unloaded,
    Ready,
}

/// Swappable reference to the active artifact.
///
/// Readers take an `Arc` snapshot under a momentary read lock and run
/// inference without holding it. Writers replace the whole `Arc`, so a
/// snapshot always pairs a regressor with the MAE from the same fit.
#[derive(Debug, Clone, Default)]
pub struct ActiveArtifact {
    current: Arc<RwLock<Option<Arc<ModelArtifact>>>>,
}

impl ActiveArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent snapshot of the active artifact, if any
    pub async fn snapshot(&self) -> Option<Arc<ModelArtifact>> {
        self.current.read().await.clone()
    }

    /// Swap in a new artifact, returning the one it replaced
    pub async fn replace(&self, artifact: Arc<ModelArtifact>) -> Option<Arc<ModelArtifact>> {
        let mut current = self.current.write().await;
        current.replace(artifact)
    }

    pub async fn state(&self) -> ServingState {
        if self.current.read().await.is_some() {
            ServingState::Ready
        } else {
            ServingState::Unloaded
        }
    }
}
