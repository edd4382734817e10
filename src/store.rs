use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::task::Task;

pub const SNAPSHOT_VERSION: u32 = 1;

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Persisted form of one domain's task queue. Missing fields default on
/// deserialization; an unknown future version degrades to an empty queue
/// rather than a crash.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default = "snapshot_version")]
    pub version: u32,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Opaque keyed blob storage, one entry per scheduling domain. The engine
/// never interprets the blob beyond the snapshot codec below.
pub trait TaskStore {
    fn read(&self, domain: &str) -> Option<String>;
    fn write(&mut self, domain: &str, blob: &str);
}

/// Rehydrates a domain's tasks. A missing key means an empty queue; a
/// corrupt or foreign-version blob is logged and treated the same way.
pub fn load(store: &dyn TaskStore, domain: &str) -> Vec<Task> {
    let Some(blob) = store.read(domain) else {
        return Vec::new();
    };
    match serde_json::from_str::<QueueSnapshot>(&blob) {
        Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot.tasks,
        Ok(snapshot) => {
            warn!(
                domain,
                version = snapshot.version,
                "unknown queue snapshot version, starting empty"
            );
            Vec::new()
        }
        Err(err) => {
            warn!(domain, %err, "corrupt queue snapshot, starting empty");
            Vec::new()
        }
    }
}

/// Serializes the full queue back under the domain key. Last writer wins.
pub fn save(store: &mut dyn TaskStore, domain: &str, tasks: &[Task]) {
    let snapshot = QueueSnapshot {
        version: SNAPSHOT_VERSION,
        tasks: tasks.to_vec(),
    };
    match serde_json::to_string(&snapshot) {
        Ok(blob) => store.write(domain, &blob),
        Err(err) => warn!(domain, %err, "failed to serialize queue snapshot"),
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    blobs: HashMap<String, String>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemStore {
    fn read(&self, domain: &str) -> Option<String> {
        self.blobs.get(domain).cloned()
    }

    fn write(&mut self, domain: &str, blob: &str) {
        self.blobs.insert(domain.to_string(), blob.to_string());
    }
}
