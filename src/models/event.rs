use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Default, Clone)]
pub struct Event {
    /// UUID of the event
    pub id: Uuid,
    /// User-facing auto-incremental event number
    pub event_number: u64,
    /// Title of the event
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Maximum number of participants
    pub capacity: Option<u32>,
    pub price: Option<u32>,
    pub format: Format,
    /// Scheduled dates, kept sorted and free of duplicates
    pub dates: Vec<Date>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Online,
    Offline,
}

/// Completion ratio of an event's tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

impl Progress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) as f64 / self.total as f64).round() as u32
    }
}

impl Event {
    /// The earliest scheduled date; task deadlines are derived from it
    pub fn base_date(&self) -> Option<Date> {
        self.dates.iter().min().copied()
    }

    pub fn all_dates_past(&self, today: Date) -> bool {
        !self.dates.is_empty() && self.dates.iter().all(|d| *d < today)
    }

    pub fn has_future_dates(&self, today: Date) -> bool {
        self.dates.iter().any(|d| *d >= today)
    }

    pub fn set_dates(&mut self, mut dates: Vec<Date>) {
        dates.sort();
        dates.dedup();
        self.dates = dates;
    }
}
