use slug::slugify;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dates,
    models::{
        event::Event,
        store::Store,
        task::Task,
        template::{TaskTemplate, Template},
    },
    services::{FieldErrors, non_blank, validate_name},
    storage::{Storage, StorageError},
};

pub const DEFAULT_TEMPLATE_NAME: &str = "Standard seminar";

/// (offset in days, task name) of the built-in template
const DEFAULT_TEMPLATE_TASKS: &[(i32, &str)] = &[
    (-56, "Fix the outline (date, venue, capacity, price)"),
    (-56, "Book the venue"),
    (-56, "Build the landing page"),
    (-56, "Publish the event page on connpass / Peatix"),
    (-56, "Start on announcement visuals for social media"),
    (-49, "Post the announcement on social media"),
    (-49, "Run a small test ad campaign"),
    (-42, "Start posting daily learning tips"),
    (-42, "Invite acquaintances and past attendees directly"),
    (-35, "List the event on connpass"),
    (-35, "Share the agenda and speaker track record"),
    (-35, "A/B test the ad creatives"),
    (-28, "Open early-bird pricing"),
    (-28, "Post the early-bird launch with remaining seats"),
    (-28, "Raise the ad budget"),
    (-21, "Show concrete skills attendees will gain"),
    (-14, "Announce the early-bird deadline"),
    (-14, "Scale up the ad campaign"),
    (-14, "Post attendee testimonials and FAQ"),
    (-7, "Announce remaining seats (social media, mail)"),
    (-7, "Switch ads to the last-seats creative"),
    (-7, "Send a reminder to connpass attendees"),
    (-7, "Finish the slides"),
    (-5, "Post the countdown"),
    (-5, "Mail joining instructions to all attendees"),
    (-1, "Post the final reminder"),
    (-1, "Check the reception list and materials"),
];

#[derive(Debug, Error)]
pub enum ExpandTemplateError {
    #[error("Template entry '{name}' moves the deadline {days} days out of the calendar range")]
    OffsetOutOfRange { name: String, days: i32 },
}

/// Turns a template into concrete tasks for `event`, in template order.
///
/// Deadlines are the event's base date shifted by each entry's offset. Entries
/// without an offset are skipped, and an event without dates yields no tasks.
/// The returned tasks are not numbered yet.
pub fn expand_template(
    event: &Event,
    template: &Template,
) -> Result<Vec<Task>, ExpandTemplateError> {
    let Some(base_date) = event.base_date() else {
        return Ok(vec![]);
    };

    template
        .tasks
        .iter()
        .filter_map(|entry| entry.relative_days.map(|days| (entry, days)))
        .map(|(entry, days)| {
            let deadline = dates::offset_date(base_date, days).ok_or_else(|| {
                ExpandTemplateError::OffsetOutOfRange {
                    name: entry.name.clone(),
                    days,
                }
            })?;
            let mut task = Task::new(event.id, entry.name.clone(), deadline);
            task.assignee = entry.default_assignee.clone();
            task.notes = entry.default_notes.clone();
            Ok(task)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ApplyTemplateError {
    #[error("Event #{0} not found")]
    EventNotFound(u64),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error(transparent)]
    Expand(#[from] ExpandTemplateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct ApplyTemplateParameters {
    pub event_number: u64,
    pub template: String,
}

/// Expands a template into an existing event. Returns the new task numbers.
pub fn apply_template(
    store: &mut Store,
    storage: &impl Storage,
    parameters: ApplyTemplateParameters,
) -> Result<Vec<u64>, ApplyTemplateError> {
    let event = store
        .get_event_by_number(parameters.event_number)
        .ok_or(ApplyTemplateError::EventNotFound(parameters.event_number))?;
    let template = store
        .find_template(&parameters.template)
        .ok_or_else(|| ApplyTemplateError::TemplateNotFound(parameters.template.clone()))?;

    let tasks = expand_template(event, template)?;
    let numbers: Vec<u64> = tasks.into_iter().map(|t| store.add_task(t)).collect();

    storage.save(store)?;

    Ok(numbers)
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Template '{0}' already exists")]
    TemplateAlreadyExists(String),

    #[error("Template '{template}' has no entry #{position}")]
    EntryNotFound { template: String, position: usize },

    #[error("Invalid template: {0}")]
    Invalid(FieldErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateTemplateParameters {
    pub name: String,
    pub description: Option<String>,
}

pub fn create_template(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateTemplateParameters,
) -> Result<Template, TemplateError> {
    let (name, base_slug) = validate_template_name(&parameters.name)?;
    if name_taken(store, &name, None) {
        return Err(TemplateError::TemplateAlreadyExists(name));
    }

    let template = Template {
        id: Uuid::new_v4(),
        slug: unique_slug(store, &base_slug),
        name,
        description: non_blank(parameters.description),
        tasks: vec![],
        created_at: jiff::Timestamp::now(),
    };
    store.templates.push(template.clone());

    storage.save(store)?;

    Ok(template)
}

/// Trimmed name and its slug. A name with nothing to slug is rejected.
fn validate_template_name(raw: &str) -> Result<(String, String), TemplateError> {
    let mut errors = FieldErrors::default();
    let name = validate_name(raw, "name", &mut errors);
    let slug = slugify(&name);
    if errors.is_empty() && slug.is_empty() {
        errors.add("name", "must contain at least one letter or digit");
    }
    errors.into_result().map_err(TemplateError::Invalid)?;
    Ok((name, slug))
}

fn name_taken(store: &Store, name: &str, except: Option<Uuid>) -> bool {
    store
        .templates
        .iter()
        .any(|t| Some(t.id) != except && t.name.to_lowercase() == name.to_lowercase())
}

pub struct UpdateTemplateParameters {
    pub name: Option<String>,
    /// Blank clears the description
    pub description: Option<String>,
}

/// Renames and/or re-describes a template. Entries are kept.
pub fn update_template(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
    parameters: UpdateTemplateParameters,
) -> Result<Template, TemplateError> {
    let (id, current_slug) = store
        .find_template(slug_or_name)
        .map(|t| (t.id, t.slug.clone()))
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let renamed = match &parameters.name {
        Some(raw) => {
            let (name, base_slug) = validate_template_name(raw)?;
            if name_taken(store, &name, Some(id)) {
                return Err(TemplateError::TemplateAlreadyExists(name));
            }
            let slug = if base_slug == current_slug {
                current_slug
            } else {
                unique_slug(store, &base_slug)
            };
            Some((name, slug))
        }
        None => None,
    };

    let template = store
        .get_template_mut(id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;
    if let Some((name, slug)) = renamed {
        template.name = name;
        template.slug = slug;
    }
    if parameters.description.is_some() {
        template.description = non_blank(parameters.description);
    }
    let updated = template.clone();

    storage.save(store)?;

    Ok(updated)
}

/// Duplicates a template with all of its entries under "<name> (copy)"
pub fn copy_template(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
) -> Result<Template, TemplateError> {
    let source = store
        .find_template(slug_or_name)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let name = format!("{} (copy)", source.name);
    let copy = Template {
        id: Uuid::new_v4(),
        slug: unique_slug(store, &slugify(&name)),
        name,
        description: source.description.clone(),
        tasks: source
            .tasks
            .iter()
            .map(|entry| TaskTemplate {
                id: Uuid::new_v4(),
                ..entry.clone()
            })
            .collect(),
        created_at: jiff::Timestamp::now(),
    };
    store.templates.push(copy.clone());

    storage.save(store)?;

    Ok(copy)
}

pub fn delete_template(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
) -> Result<Template, TemplateError> {
    let id = store
        .find_template(slug_or_name)
        .map(|t| t.id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let position = store
        .templates
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;
    let removed = store.templates.remove(position);

    storage.save(store)?;

    Ok(removed)
}

/// Raw entry input, validated before anything is stored
pub struct TemplateEntryParameters {
    pub name: String,
    pub relative_days: Option<String>,
    pub default_assignee: Option<String>,
    pub default_notes: Option<String>,
}

fn validate_entry(parameters: TemplateEntryParameters) -> Result<TaskTemplate, FieldErrors> {
    let mut errors = FieldErrors::default();
    let name = validate_name(&parameters.name, "name", &mut errors);

    let raw_days = parameters.relative_days.unwrap_or_default();
    let raw_days = raw_days.trim();
    let relative_days = if raw_days.is_empty() {
        errors.add("relative_days", "is required");
        None
    } else {
        match raw_days.parse::<i32>() {
            Ok(days) => Some(days),
            Err(_) => {
                errors.add("relative_days", "must be an integer");
                None
            }
        }
    };

    errors.into_result()?;

    Ok(TaskTemplate {
        id: Uuid::new_v4(),
        name,
        relative_days,
        default_assignee: non_blank(parameters.default_assignee),
        default_notes: non_blank(parameters.default_notes),
    })
}

pub fn add_template_entry(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
    parameters: TemplateEntryParameters,
) -> Result<TaskTemplate, TemplateError> {
    let id = store
        .find_template(slug_or_name)
        .map(|t| t.id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let entry = validate_entry(parameters).map_err(TemplateError::Invalid)?;

    if let Some(template) = store.get_template_mut(id) {
        template.tasks.push(entry.clone());
    }

    storage.save(store)?;

    Ok(entry)
}

/// Replaces the entry at 1-based `position`
pub fn update_template_entry(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
    position: usize,
    parameters: TemplateEntryParameters,
) -> Result<TaskTemplate, TemplateError> {
    let id = store
        .find_template(slug_or_name)
        .map(|t| t.id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let validated = validate_entry(parameters).map_err(TemplateError::Invalid)?;

    let entry = store
        .get_template_mut(id)
        .and_then(|t| position.checked_sub(1).and_then(|idx| t.tasks.get_mut(idx)))
        .ok_or_else(|| TemplateError::EntryNotFound {
            template: slug_or_name.to_string(),
            position,
        })?;
    *entry = TaskTemplate {
        id: entry.id,
        ..validated
    };
    let updated = entry.clone();

    storage.save(store)?;

    Ok(updated)
}

pub fn remove_template_entry(
    store: &mut Store,
    storage: &impl Storage,
    slug_or_name: &str,
    position: usize,
) -> Result<TaskTemplate, TemplateError> {
    let id = store
        .find_template(slug_or_name)
        .map(|t| t.id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;

    let template = store
        .get_template_mut(id)
        .ok_or_else(|| TemplateError::TemplateNotFound(slug_or_name.to_string()))?;
    if position == 0 || position > template.tasks.len() {
        return Err(TemplateError::EntryNotFound {
            template: slug_or_name.to_string(),
            position,
        });
    }
    let removed = template.tasks.remove(position - 1);

    storage.save(store)?;

    Ok(removed)
}

/// Installs the built-in seminar template. Refuses to run twice.
pub fn load_default_template(
    store: &mut Store,
    storage: &impl Storage,
) -> Result<Template, TemplateError> {
    if store.find_template(DEFAULT_TEMPLATE_NAME).is_some() {
        return Err(TemplateError::TemplateAlreadyExists(
            DEFAULT_TEMPLATE_NAME.to_string(),
        ));
    }

    let template = Template {
        id: Uuid::new_v4(),
        name: DEFAULT_TEMPLATE_NAME.to_string(),
        slug: slugify(DEFAULT_TEMPLATE_NAME),
        description: Some("Baseline preparation checklist for running a seminar".to_string()),
        tasks: DEFAULT_TEMPLATE_TASKS
            .iter()
            .map(|(days, name)| TaskTemplate {
                id: Uuid::new_v4(),
                name: name.to_string(),
                relative_days: Some(*days),
                default_assignee: None,
                default_notes: None,
            })
            .collect(),
        created_at: jiff::Timestamp::now(),
    };
    store.templates.push(template.clone());

    storage.save(store)?;

    Ok(template)
}

fn unique_slug(store: &Store, base: &str) -> String {
    let taken = |slug: &str| store.templates.iter().any(|t| t.slug == slug);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStorage;
    use jiff::civil::date;

    fn entry(name: &str, days: Option<i32>) -> TaskTemplate {
        TaskTemplate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            relative_days: days,
            ..TaskTemplate::default()
        }
    }

    fn event_on(dates: Vec<jiff::civil::Date>) -> Event {
        let mut event = Event {
            id: Uuid::new_v4(),
            title: "Intro to Rust".to_string(),
            ..Event::default()
        };
        event.set_dates(dates);
        event
    }

    #[test]
    fn test_expand_skips_entries_without_offset() {
        let base = date(2025, 6, 14);
        let event = event_on(vec![date(2025, 6, 21), base]);
        let template = Template {
            tasks: vec![
                entry("Slides", Some(-7)),
                entry("Final check", Some(-1)),
                entry("Someday", None),
            ],
            ..Template::default()
        };

        let tasks = expand_template(&event, &template).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "Slides");
        assert_eq!(tasks[0].deadline, date(2025, 6, 7));
        assert_eq!(tasks[1].name, "Final check");
        assert_eq!(tasks[1].deadline, date(2025, 6, 13));
        assert!(tasks.iter().all(|t| t.event_id == event.id && !t.is_done));
    }

    #[test]
    fn test_expand_copies_defaults() {
        let event = event_on(vec![date(2025, 6, 14)]);
        let template = Template {
            tasks: vec![TaskTemplate {
                default_assignee: Some("alice".to_string()),
                default_notes: Some("room 3F".to_string()),
                ..entry("Book room", Some(-56))
            }],
            ..Template::default()
        };

        let tasks = expand_template(&event, &template).unwrap();
        assert_eq!(tasks[0].assignee.as_deref(), Some("alice"));
        assert_eq!(tasks[0].notes.as_deref(), Some("room 3F"));
        assert_eq!(tasks[0].deadline, date(2025, 4, 19));
    }

    #[test]
    fn test_expand_without_dates_creates_nothing() {
        let event = event_on(vec![]);
        let template = Template {
            tasks: vec![entry("Slides", Some(-7))],
            ..Template::default()
        };
        assert!(expand_template(&event, &template).unwrap().is_empty());
    }

    #[test]
    fn test_expand_rejects_out_of_range_offset() {
        let event = event_on(vec![date(2025, 6, 14)]);
        let template = Template {
            tasks: vec![entry("ok", Some(-1)), entry("Far away", Some(i32::MIN))],
            ..Template::default()
        };
        let result = expand_template(&event, &template);
        assert!(matches!(
            result,
            Err(ExpandTemplateError::OffsetOutOfRange { days: i32::MIN, .. })
        ));
    }

    #[test]
    fn test_apply_template_numbers_tasks() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        store.add_event(event_on(vec![date(2025, 6, 14)]));
        store.templates.push(Template {
            name: "Short".to_string(),
            slug: "short".to_string(),
            tasks: vec![entry("a", Some(-2)), entry("b", Some(-1))],
            ..Template::default()
        });

        let numbers = apply_template(
            &mut store,
            &storage,
            ApplyTemplateParameters {
                event_number: 1,
                template: "short".to_string(),
            },
        )
        .unwrap();

        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(storage.saves(), 1);
    }

    #[test]
    fn test_create_template_rejects_duplicates() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        let params = || CreateTemplateParameters {
            name: "Workshop".to_string(),
            description: None,
        };

        create_template(&mut store, &storage, params()).unwrap();
        let result = create_template(&mut store, &storage, params());
        assert!(matches!(result, Err(TemplateError::TemplateAlreadyExists(_))));
        assert_eq!(store.templates.len(), 1);
    }

    #[test]
    fn test_create_template_slug_edge_cases() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        let named = |name: &str| CreateTemplateParameters {
            name: name.to_string(),
            description: None,
        };

        let result = create_template(&mut store, &storage, named("!!!"));
        assert!(matches!(result, Err(TemplateError::Invalid(e)) if e.get("name").is_some()));
        assert!(store.templates.is_empty());

        create_template(&mut store, &storage, named("Workshop")).unwrap();
        let copy = copy_template(&mut store, &storage, "workshop").unwrap();
        assert_eq!(copy.slug, "workshop-copy");

        let created = create_template(&mut store, &storage, named("Workshop copy")).unwrap();
        assert_eq!(created.slug, "workshop-copy-2");
        assert_eq!(store.templates.len(), 3);
    }

    #[test]
    fn test_update_template_renames_and_keeps_entries() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        store.templates.push(Template {
            id: Uuid::new_v4(),
            name: "Wrokshop".to_string(),
            slug: "wrokshop".to_string(),
            description: Some("old".to_string()),
            tasks: vec![entry("Slides", Some(-7))],
            ..Template::default()
        });
        create_template(
            &mut store,
            &storage,
            CreateTemplateParameters {
                name: "Lecture".to_string(),
                description: None,
            },
        )
        .unwrap();

        let updated = update_template(
            &mut store,
            &storage,
            "wrokshop",
            UpdateTemplateParameters {
                name: Some("Workshop".to_string()),
                description: Some("  ".to_string()),
            },
        )
        .unwrap();
        assert_eq!(updated.name, "Workshop");
        assert_eq!(updated.slug, "workshop");
        assert_eq!(updated.description, None);
        assert_eq!(updated.tasks.len(), 1);
        assert!(store.find_template("workshop").is_some());

        let clash = update_template(
            &mut store,
            &storage,
            "workshop",
            UpdateTemplateParameters {
                name: Some("lecture".to_string()),
                description: None,
            },
        );
        assert!(matches!(clash, Err(TemplateError::TemplateAlreadyExists(_))));

        let blank = update_template(
            &mut store,
            &storage,
            "workshop",
            UpdateTemplateParameters {
                name: Some("".to_string()),
                description: None,
            },
        );
        assert!(matches!(blank, Err(TemplateError::Invalid(e)) if e.get("name").is_some()));
        assert_eq!(store.templates[0].name, "Workshop");
        assert_eq!(storage.saves(), 2);
    }

    #[test]
    fn test_entry_validation_is_field_level() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        create_template(
            &mut store,
            &storage,
            CreateTemplateParameters {
                name: "Workshop".to_string(),
                description: None,
            },
        )
        .unwrap();

        let result = add_template_entry(
            &mut store,
            &storage,
            "workshop",
            TemplateEntryParameters {
                name: " ".to_string(),
                relative_days: Some("a week".to_string()),
                default_assignee: None,
                default_notes: None,
            },
        );

        match result {
            Err(TemplateError::Invalid(errors)) => {
                assert_eq!(errors.get("name"), Some("is required"));
                assert_eq!(errors.get("relative_days"), Some("must be an integer"));
            }
            _ => panic!("Expected validation errors"),
        }
        assert!(store.templates[0].tasks.is_empty());

        let missing = add_template_entry(
            &mut store,
            &storage,
            "workshop",
            TemplateEntryParameters {
                name: "Slides".to_string(),
                relative_days: None,
                default_assignee: None,
                default_notes: None,
            },
        );
        assert!(matches!(missing, Err(TemplateError::Invalid(e)) if e.get("relative_days") == Some("is required")));
    }

    #[test]
    fn test_update_and_remove_entries() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        store.templates.push(Template {
            name: "Short".to_string(),
            slug: "short".to_string(),
            tasks: vec![entry("a", Some(-2)), entry("b", Some(-1))],
            ..Template::default()
        });
        let original_id = store.templates[0].tasks[1].id;

        let updated = update_template_entry(
            &mut store,
            &storage,
            "short",
            2,
            TemplateEntryParameters {
                name: "b2".to_string(),
                relative_days: Some("-3".to_string()),
                default_assignee: Some("bob".to_string()),
                default_notes: None,
            },
        )
        .unwrap();
        assert_eq!(updated.id, original_id);
        assert_eq!(updated.relative_days, Some(-3));

        let out_of_range = remove_template_entry(&mut store, &storage, "short", 3);
        assert!(matches!(out_of_range, Err(TemplateError::EntryNotFound { position: 3, .. })));

        let removed = remove_template_entry(&mut store, &storage, "short", 1).unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(store.templates[0].tasks.len(), 1);
    }

    #[test]
    fn test_copy_template_gets_fresh_ids_and_slug() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();
        store.templates.push(Template {
            id: Uuid::new_v4(),
            name: "Short".to_string(),
            slug: "short".to_string(),
            tasks: vec![entry("a", Some(-2))],
            ..Template::default()
        });

        let first = copy_template(&mut store, &storage, "short").unwrap();
        let second = copy_template(&mut store, &storage, "short").unwrap();

        assert_eq!(first.name, "Short (copy)");
        assert_eq!(first.slug, "short-copy");
        assert_eq!(second.slug, "short-copy-2");
        assert_ne!(first.tasks[0].id, store.templates[0].tasks[0].id);
        assert_eq!(first.tasks[0].relative_days, Some(-2));
    }

    #[test]
    fn test_load_default_template_once() {
        let mut store = Store::default();
        let storage = MemoryStorage::default();

        let template = load_default_template(&mut store, &storage).unwrap();
        assert_eq!(template.tasks.len(), 27);
        assert_eq!(template.tasks[0].relative_days, Some(-56));
        assert_eq!(template.tasks[26].relative_days, Some(-1));

        let again = load_default_template(&mut store, &storage);
        assert!(matches!(again, Err(TemplateError::TemplateAlreadyExists(_))));
    }
}
