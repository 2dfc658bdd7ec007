use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dates;

/// A reusable set of preparation tasks, positioned relative to an event's base date
#[derive(Serialize, Deserialize, Default, Clone)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Entries in the order tasks get created
    pub tasks: Vec<TaskTemplate>,
    pub created_at: Timestamp,
}

#[derive(Serialize, Deserialize, Default, Clone)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    /// Days relative to the base date, negative means before. Entries without
    /// an offset are skipped when a template is expanded.
    pub relative_days: Option<i32>,
    pub default_assignee: Option<String>,
    pub default_notes: Option<String>,
}

impl TaskTemplate {
    /// e.g. "-55 days before (-7 weeks -6 days before)"
    pub fn when_display(&self) -> String {
        dates::describe_offset_in_weeks(self.relative_days)
    }
}
