use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Messaging store that owns ride conversation threads.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    /// Make sure the rider and the owner share a thread for this ride.
    async fn ensure_ride_thread(
        &self,
        ride_id: Uuid,
        owner_id: &str,
        rider_id: &str,
        ride_info: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Flag the ride's threads as belonging to a cancelled ride.
    async fn mark_cancelled(&self, ride_id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Display names used when composing notification text. Not needed for correctness.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Option<String>;
}

pub struct NoopConversations;

#[async_trait]
impl ConversationClient for NoopConversations {
    async fn ensure_ride_thread(
        &self,
        ride_id: Uuid,
        _owner_id: &str,
        rider_id: &str,
        _ride_info: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(%ride_id, rider_id, "No messaging backend, skipping ride thread");
        Ok(())
    }

    async fn mark_cancelled(&self, ride_id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(%ride_id, "No messaging backend, skipping cancel flag");
        Ok(())
    }
}

/// In-process name table, filled from whatever profile source is at hand.
#[derive(Default)]
pub struct StaticProfileDirectory {
    names: RwLock<HashMap<String, String>>,
}

impl StaticProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, name: impl Into<String>) {
        if let Ok(mut names) = self.names.write() {
            names.insert(user_id.into(), name.into());
        }
    }
}

#[async_trait]
impl ProfileDirectory for StaticProfileDirectory {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        self.names.read().ok()?.get(user_id).cloned()
    }
}
