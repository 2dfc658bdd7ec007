use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone)]
pub struct Task {
    /// UUID to identify the task
    pub id: Uuid,
    /// User-facing auto-incremental task number
    pub task_number: u64,
    /// The event this task prepares
    pub event_id: Uuid,
    /// Name of the task
    pub name: String,
    /// Deadline for this task
    pub deadline: Date,
    /// Who takes care of it
    pub assignee: Option<String>,
    /// Notes of the task
    pub notes: Option<String>,
    pub is_done: bool,
    /// When the task was created
    pub created_at: Timestamp,
}

impl Task {
    pub fn new(event_id: Uuid, name: String, deadline: Date) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_number: 0,
            event_id,
            name,
            deadline,
            assignee: None,
            notes: None,
            is_done: false,
            created_at: Timestamp::now(),
        }
    }

    /// Not done and already past its deadline
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.is_done && self.deadline < today
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_is_overdue() {
        let today = date(2025, 3, 10);
        let mut task = Task::new(Uuid::new_v4(), "Book room".to_string(), date(2025, 3, 9));
        assert!(task.is_overdue(today));

        task.is_done = true;
        assert!(!task.is_overdue(today));

        task.is_done = false;
        task.deadline = today;
        assert!(!task.is_overdue(today));
    }
}
