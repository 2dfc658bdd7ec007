use std::collections::{BTreeMap, HashSet};

use jiff::civil::Date;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dates::{describe_relative_days, parse_date_input},
    models::{
        event::{Event, Format, Progress},
        store::Store,
        task::Task,
    },
    services::{
        FieldErrors, non_blank,
        templates::{ExpandTemplateError, expand_template},
        validate_name,
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event #{0} not found")]
    EventNotFound(u64),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Invalid event: {0}")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Expand(#[from] ExpandTemplateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Parses user supplied dates. Every date must be valid, not before `today`
/// and given only once; blank entries are ignored.
pub fn validate_dates(raw_dates: &[String], today: Date) -> Result<Vec<Date>, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut seen = HashSet::new();
    let mut valid = Vec::new();

    for raw in raw_dates.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        let Some(date) = parse_date_input(raw) else {
            errors.add("dates", format!("invalid date format: {}", raw));
            continue;
        };
        if date < today {
            errors.add("dates", format!("past dates are not allowed: {}", date));
            continue;
        }
        if !seen.insert(date) {
            errors.add("dates", format!("duplicate date: {}", date));
            continue;
        }
        valid.push(date);
    }

    errors.into_result()?;
    Ok(valid)
}

pub struct CreateEventParameters {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<u32>,
    pub price: Option<u32>,
    pub format: Format,
    pub dates: Vec<String>,
    /// Template to expand into tasks once the event exists
    pub template: Option<String>,
    pub today: Date,
}

pub struct CreateEventResult {
    pub event: Event,
    pub created_tasks: usize,
}

pub fn create_event(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateEventParameters,
) -> Result<CreateEventResult, EventError> {
    let mut errors = FieldErrors::default();
    let title = validate_name(&parameters.title, "title", &mut errors);
    let dates = match validate_dates(&parameters.dates, parameters.today) {
        Ok(dates) => dates,
        Err(date_errors) => {
            for (field, message) in date_errors.iter() {
                errors.add(*field, message.clone());
            }
            vec![]
        }
    };
    errors.into_result().map_err(EventError::Invalid)?;

    let template = match &parameters.template {
        Some(name) => Some(
            store
                .find_template(name)
                .ok_or_else(|| EventError::TemplateNotFound(name.clone()))?,
        ),
        None => None,
    };

    let now = jiff::Timestamp::now();
    let mut event = Event {
        id: Uuid::new_v4(),
        event_number: 0,
        title,
        description: non_blank(parameters.description),
        location: non_blank(parameters.location),
        capacity: parameters.capacity,
        price: parameters.price,
        format: parameters.format,
        dates: vec![],
        created_at: now,
        updated_at: now,
    };
    event.set_dates(dates);

    // expand before touching the store so a bad template leaves nothing behind
    let tasks = match template {
        Some(template) => expand_template(&event, template)?,
        None => vec![],
    };
    let created_tasks = tasks.len();

    let event_number = store.add_event(event);
    for task in tasks {
        store.add_task(task);
    }

    storage.save(store)?;

    let event = store
        .get_event_by_number(event_number)
        .cloned()
        .ok_or(EventError::EventNotFound(event_number))?;
    tracing::info!(event = event_number, tasks = created_tasks, "event created");

    Ok(CreateEventResult {
        event,
        created_tasks,
    })
}

pub struct ReplaceDatesParameters {
    pub event_number: u64,
    pub dates: Vec<String>,
    pub today: Date,
}

/// Swaps the event's dates for new ones. Existing tasks keep their deadlines.
pub fn replace_event_dates(
    store: &mut Store,
    storage: &impl Storage,
    parameters: ReplaceDatesParameters,
) -> Result<Event, EventError> {
    let event_id = store
        .get_event_by_number(parameters.event_number)
        .map(|e| e.id)
        .ok_or(EventError::EventNotFound(parameters.event_number))?;

    let dates = validate_dates(&parameters.dates, parameters.today).map_err(EventError::Invalid)?;

    let event = store
        .get_event_mut(event_id)
        .ok_or(EventError::EventNotFound(parameters.event_number))?;
    event.set_dates(dates);
    event.updated_at = jiff::Timestamp::now();
    let updated = event.clone();

    storage.save(store)?;

    Ok(updated)
}

pub struct UpdateEventParameters {
    pub event_number: u64,
    pub title: Option<String>,
    /// Blank clears the description
    pub description: Option<String>,
    /// Blank clears the location
    pub location: Option<String>,
    pub capacity: Option<u32>,
    pub price: Option<u32>,
    pub format: Option<Format>,
    /// Replaces the dates when given, validated like on creation
    pub dates: Option<Vec<String>>,
    pub today: Date,
}

/// Edits an event's details. Fields left as `None` are unchanged; any invalid
/// field rejects the whole edit.
pub fn update_event(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateEventParameters,
) -> Result<Event, EventError> {
    let event_id = store
        .get_event_by_number(parameters.event_number)
        .map(|e| e.id)
        .ok_or(EventError::EventNotFound(parameters.event_number))?;

    let mut errors = FieldErrors::default();
    let title = parameters
        .title
        .as_deref()
        .map(|raw| validate_name(raw, "title", &mut errors));
    let dates = match &parameters.dates {
        Some(raw) => match validate_dates(raw, parameters.today) {
            Ok(dates) => Some(dates),
            Err(date_errors) => {
                for (field, message) in date_errors.iter() {
                    errors.add(*field, message.clone());
                }
                None
            }
        },
        None => None,
    };
    errors.into_result().map_err(EventError::Invalid)?;

    let event = store
        .get_event_mut(event_id)
        .ok_or(EventError::EventNotFound(parameters.event_number))?;
    if let Some(title) = title {
        event.title = title;
    }
    if parameters.description.is_some() {
        event.description = non_blank(parameters.description);
    }
    if parameters.location.is_some() {
        event.location = non_blank(parameters.location);
    }
    if let Some(capacity) = parameters.capacity {
        event.capacity = Some(capacity);
    }
    if let Some(price) = parameters.price {
        event.price = Some(price);
    }
    if let Some(format) = parameters.format {
        event.format = format;
    }
    if let Some(dates) = dates {
        event.set_dates(dates);
    }
    event.updated_at = jiff::Timestamp::now();
    let updated = event.clone();

    storage.save(store)?;

    Ok(updated)
}

/// Starts a new event from an existing one's details, without dates or tasks
pub fn copy_event(
    store: &mut Store,
    storage: &impl Storage,
    event_number: u64,
) -> Result<Event, EventError> {
    let source = store
        .get_event_by_number(event_number)
        .ok_or(EventError::EventNotFound(event_number))?;

    let now = jiff::Timestamp::now();
    let copy = Event {
        id: Uuid::new_v4(),
        event_number: 0,
        title: format!("{} (copy)", source.title),
        dates: vec![],
        created_at: now,
        updated_at: now,
        ..source.clone()
    };
    let number = store.add_event(copy);

    storage.save(store)?;

    store
        .get_event_by_number(number)
        .cloned()
        .ok_or(EventError::EventNotFound(number))
}

pub struct DeleteEventResult {
    pub event: Event,
    pub removed_tasks: usize,
}

/// Removes an event together with all of its tasks
pub fn delete_event(
    store: &mut Store,
    storage: &impl Storage,
    event_number: u64,
) -> Result<DeleteEventResult, EventError> {
    let position = store
        .events
        .iter()
        .position(|e| e.event_number == event_number)
        .ok_or(EventError::EventNotFound(event_number))?;
    let event = store.events.remove(position);

    let before = store.tasks.len();
    store.tasks.retain(|t| t.event_id != event.id);
    let removed_tasks = before - store.tasks.len();

    storage.save(store)?;

    Ok(DeleteEventResult {
        event,
        removed_tasks,
    })
}

/// Tasks sharing one deadline
pub struct DateGroup<'a> {
    pub date: Date,
    pub tasks: Vec<&'a Task>,
    pub overdue: usize,
    pub progress: Progress,
    /// e.g. "3 days later"
    pub relative_text: String,
}

pub struct EventOverview<'a> {
    pub event: &'a Event,
    pub groups: Vec<DateGroup<'a>>,
    pub progress: Progress,
    pub overdue: usize,
    /// Neither done nor overdue
    pub pending: usize,
}

/// Read-only summary of an event's preparation, grouped by deadline
pub fn event_overview(
    store: &Store,
    event_number: u64,
    today: Date,
) -> Result<EventOverview<'_>, EventError> {
    let event = store
        .get_event_by_number(event_number)
        .ok_or(EventError::EventNotFound(event_number))?;

    let mut by_date: BTreeMap<Date, Vec<&Task>> = BTreeMap::new();
    for task in store.get_tasks_for_event(event.id) {
        by_date.entry(task.deadline).or_default().push(task);
    }

    let groups: Vec<DateGroup> = by_date
        .into_iter()
        .map(|(date, mut tasks)| {
            tasks.sort_by_key(|t| t.task_number);
            let completed = tasks.iter().filter(|t| t.is_done).count();
            DateGroup {
                date,
                overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
                progress: Progress {
                    total: tasks.len(),
                    completed,
                },
                relative_text: describe_relative_days(date, today),
                tasks,
            }
        })
        .collect();

    let progress = store.event_progress(event.id);
    let overdue: usize = groups.iter().map(|g| g.overdue).sum();
    let pending = progress
        .total
        .saturating_sub(progress.completed)
        .saturating_sub(overdue);

    Ok(EventOverview {
        event,
        groups,
        progress,
        overdue,
        pending,
    })
}
