use serde::{Deserialize, Serialize};

pub mod badge;
pub mod challenge;
pub mod ledger;
pub mod rewards;

#[inline]
const fn default_history_limit() -> i64 {
    20
}

/// Query params for ledger history reads. `limit` is clamped by the
/// repository, so an absurd value can't turn into a full table scan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}
