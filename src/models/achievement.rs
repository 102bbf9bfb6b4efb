//! Earned achievement record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One earned achievement. Unique on `(player_id, code)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub player_id: u64,
    pub code: String,
    pub earned_at: DateTime<Utc>,
}

impl Achievement {
    /// Storage key enforcing the uniqueness constraint.
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.player_id, self.code)
    }
}
