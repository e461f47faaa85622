//! Bounded in-memory store of execution results

use crate::execution::ExecutionId;
use crate::types::ExecutionResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Trim thresholds for [`ResultCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry count above which the cache trims itself
    pub high_water: usize,

    /// Entry count the cache trims down to
    pub low_water: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            high_water: 100,
            low_water: 50,
        }
    }
}

impl CacheConfig {
    pub fn new(high_water: usize, low_water: usize) -> Self {
        Self {
            high_water,
            low_water,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.low_water == 0 {
            return Err("cache.low_water must be greater than zero".to_string());
        }
        if self.low_water > self.high_water {
            return Err(format!(
                "cache.low_water ({}) must not exceed cache.high_water ({})",
                self.low_water, self.high_water
            ));
        }
        Ok(())
    }
}

/// Concurrent map from execution id to response.
///
/// Once a store pushes the entry count past the high-water mark the cache is
/// trimmed to the low-water mark in arbitrary order. Callers must not rely on
/// which entries survive.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<ExecutionId, ExecutionResponse>>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Insert or replace the entry for `response.execution_id()`
    pub async fn store(&self, response: ExecutionResponse) {
        let id = response.execution_id();
        let mut entries = self.entries.write().await;
        entries.insert(id, response);
        info!(execution_id = %id, "Cached execution result");

        // Trim under the same guard so no reader sees more than high_water
        if entries.len() > self.config.high_water {
            let excess = entries.len() - self.config.low_water;
            let victims: Vec<ExecutionId> = entries.keys().take(excess).copied().collect();
            for victim in &victims {
                entries.remove(victim);
            }
            info!(
                evicted = victims.len(),
                remaining = entries.len(),
                "Cleaned up execution cache"
            );
        }
    }

    /// Look up a response; `None` is an ordinary miss
    pub async fn get(&self, id: &ExecutionId) -> Option<ExecutionResponse> {
        let found = self.entries.read().await.get(id).cloned();
        match &found {
            Some(_) => debug!(execution_id = %id, "Retrieved execution result from cache"),
            None => debug!(execution_id = %id, "Execution result not found in cache"),
        }
        found
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
