//! In-memory [`DeployStore`], for tests and embedding where durability
//! is not wanted.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::StateResult;
use crate::store::DeployStore;
use crate::types::Deployment;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Deployment>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeployStore for MemoryStore {
    fn get(&self, channel: &str) -> StateResult<Option<Deployment>> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(channel).cloned())
    }

    fn set(&self, channel: &str, deployment: &Deployment) -> StateResult<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(channel.to_string(), deployment.clone());
        Ok(())
    }

    fn delete(&self, channel: &str) -> StateResult<Option<Deployment>> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        Ok(data.remove(channel))
    }
}
