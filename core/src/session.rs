//! Per-session conversation contexts for presentation layers

use crate::error::Result;
use crate::orchestrator::{Orchestrator, Reply};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// What a chat front end needs: text in, displayable text out
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn submit(&self, text: &str) -> Result<String>;
}

/// An orchestrator that several tasks may hold; requests are serialized
#[derive(Clone)]
pub struct SharedConversation {
    inner: Arc<Mutex<Orchestrator>>,
}

impl SharedConversation {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
        }
    }

    /// Run one turn, waiting for any turn already in flight
    pub async fn respond(&self, text: &str) -> Result<Reply> {
        let mut orchestrator = self.inner.lock().await;
        orchestrator.respond(text).await
    }

    pub async fn reset(&self, seed: Option<&str>) {
        self.inner.lock().await.reset(seed);
    }

    pub async fn turn_count(&self) -> usize {
        self.inner.lock().await.conversation().len()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.inner.lock().await.shutdown().await
    }
}

#[async_trait]
impl ChatSurface for SharedConversation {
    async fn submit(&self, text: &str) -> Result<String> {
        Ok(self.respond(text).await?.text)
    }
}

/// Session id to conversation map. Sessions never share an orchestrator.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedConversation>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an orchestrator under a fresh id
    pub async fn create(&self, orchestrator: Orchestrator) -> (Uuid, SharedConversation) {
        let id = Uuid::new_v4();
        let session = SharedConversation::new(orchestrator);
        self.insert(id, session.clone()).await;
        (id, session)
    }

    pub async fn insert(&self, id: Uuid, session: SharedConversation) {
        if self.sessions.write().await.insert(id, session).is_some() {
            warn!(%id, "replaced an existing session");
        }
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedConversation> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session and release its executor
    pub async fn remove(&self, id: &Uuid) -> Result<bool> {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                debug!(%id, "closing session");
                session.shutdown().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
