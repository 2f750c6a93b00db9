use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::UserId;

/// Where a user currently sits in the feedback conversation. Transient by
/// design: losing it on restart only forces the user to re-initiate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingFeedback,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user: UserId) -> ConversationState;
    async fn set(&self, user: UserId, state: ConversationState);
    async fn reset(&self, user: UserId);
}

#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<UserId, ConversationState>>,
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, user: UserId) -> ConversationState {
        let states = self.states.read().await;
        states.get(&user).copied().unwrap_or_default()
    }

    async fn set(&self, user: UserId, state: ConversationState) {
        let mut states = self.states.write().await;
        states.insert(user, state);
    }

    async fn reset(&self, user: UserId) {
        let mut states = self.states.write().await;
        states.remove(&user);
    }
}
