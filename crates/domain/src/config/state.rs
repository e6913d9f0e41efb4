use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Local state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the process keeps its small amount of durable state: the thread
/// map (`threads.json` + `threads.lock`) and the cached assistant id
/// (`assistant.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "d_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: d_state_path(),
        }
    }
}

impl StateConfig {
    pub fn assistant_cache_path(&self) -> PathBuf {
        self.path.join("assistant.json")
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
