//! Dispatcher configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Pending requests each intake queue holds before submitters block
    pub queue_capacity: usize,
    /// Name of the worker thread that owns the engine
    pub worker_name: String,
}

impl DispatcherConfig {
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..Self::default()
        }
    }

    /// Capacity actually used for the queues; tokio rejects zero
    pub fn effective_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_name: "pacgate-dispatcher".to_string(),
        }
    }
}
