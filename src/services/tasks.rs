use jiff::civil::Date;
use thiserror::Error;

use crate::{
    dates::parse_date_input,
    models::{store::Store, task::Task},
    services::{FieldErrors, non_blank, validate_name},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Event #{0} not found")]
    EventNotFound(u64),

    #[error("Task #{0} not found")]
    TaskNotFound(u64),

    #[error("Invalid task: {0}")]
    Invalid(FieldErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn validate_task_input(name: &str, deadline: &str) -> Result<(String, Date), FieldErrors> {
    let mut errors = FieldErrors::default();
    let name = validate_name(name, "name", &mut errors);
    let deadline = parse_date_input(deadline);
    if deadline.is_none() {
        errors.add("deadline", "must be a valid date (YYYY-MM-DD)");
    }

    match deadline {
        Some(deadline) if errors.is_empty() => Ok((name, deadline)),
        _ => Err(errors),
    }
}

pub struct AddTaskParameters {
    pub event_number: u64,
    pub name: String,
    pub deadline: String,
    pub assignee: Option<String>,
    pub notes: Option<String>,
}

pub fn add_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AddTaskParameters,
) -> Result<Task, TaskError> {
    let event_id = store
        .get_event_by_number(parameters.event_number)
        .map(|e| e.id)
        .ok_or(TaskError::EventNotFound(parameters.event_number))?;

    let (name, deadline) =
        validate_task_input(&parameters.name, &parameters.deadline).map_err(TaskError::Invalid)?;

    let mut task = Task::new(event_id, name, deadline);
    task.assignee = non_blank(parameters.assignee);
    task.notes = non_blank(parameters.notes);

    let task_number = store.add_task(task);

    storage.save(store)?;

    store
        .get_task_by_number(task_number)
        .cloned()
        .ok_or(TaskError::TaskNotFound(task_number))
}

/// Flips the done flag
pub fn toggle_task(
    store: &mut Store,
    storage: &impl Storage,
    task_number: u64,
) -> Result<Task, TaskError> {
    let task = store
        .tasks
        .iter_mut()
        .find(|t| t.task_number == task_number)
        .ok_or(TaskError::TaskNotFound(task_number))?;
    task.is_done = !task.is_done;
    let toggled = task.clone();

    storage.save(store)?;

    Ok(toggled)
}

pub struct UpdateTaskParameters {
    pub task_number: u64,
    pub name: String,
    pub deadline: String,
}

pub fn update_task(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateTaskParameters,
) -> Result<Task, TaskError> {
    let task_id = store
        .get_task_by_number(parameters.task_number)
        .map(|t| t.id)
        .ok_or(TaskError::TaskNotFound(parameters.task_number))?;

    let (name, deadline) =
        validate_task_input(&parameters.name, &parameters.deadline).map_err(TaskError::Invalid)?;

    let task = store
        .get_task_mut(task_id)
        .ok_or(TaskError::TaskNotFound(parameters.task_number))?;
    task.name = name;
    task.deadline = deadline;
    let updated = task.clone();

    storage.save(store)?;

    Ok(updated)
}

pub fn delete_task(
    store: &mut Store,
    storage: &impl Storage,
    task_number: u64,
) -> Result<Task, TaskError> {
    let position = store
        .tasks
        .iter()
        .position(|t| t.task_number == task_number)
        .ok_or(TaskError::TaskNotFound(task_number))?;
    let removed = store.tasks.remove(position);

    storage.save(store)?;

    Ok(removed)
}
