use serde::{Deserialize, Serialize};

/// Per-source health snapshot for the diagnostic surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: String,
    pub priority: u8,
    pub active: bool,
    pub consecutive_failures: u32,
}
