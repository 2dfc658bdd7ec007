use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notify about undone tasks whose deadline is `days_before` days away
#[derive(Serialize, Deserialize, Default, Clone)]
pub struct NotificationRule {
    pub id: Uuid,
    /// User-facing auto-incremental rule number
    pub rule_number: u64,
    pub days_before: i32,
    /// Destinations of this rule. Empty means the global fallback is used
    pub integration_ids: Vec<Uuid>,
}
