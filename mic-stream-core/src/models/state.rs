use serde::{Deserialize, Serialize};

/// Why a capture session stopped being the active one.
///
/// ```text
/// opened → (first chunk) → resolved ─┬→ superseded
///    │                               ├→ closed
///    └──────────────────────────────┴→ ended / failed (backend side)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "reason", content = "detail")]
pub enum SessionEnd {
    /// A request with a different configuration replaced the session.
    Superseded,
    /// The negotiator was asked to close the session.
    Closed,
    /// The backend finished the stream.
    Ended,
    /// The backend reported an error on the stream.
    Failed(String),
}
