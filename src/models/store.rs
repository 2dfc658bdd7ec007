use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    event::{Event, Progress},
    integration::Integration,
    rule::NotificationRule,
    task::Task,
    template::Template,
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
pub struct Store {
    pub version: u32,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub rules: Vec<NotificationRule>,
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            events: vec![],
            tasks: vec![],
            templates: vec![],
            rules: vec![],
            integrations: vec![],
        }
    }
}

impl Store {
    /// Stores the event, assigning the next event number
    pub fn add_event(&mut self, mut event: Event) -> u64 {
        event.event_number = self.events.iter().map(|e| e.event_number).max().unwrap_or(0) + 1;
        let number = event.event_number;
        self.events.push(event);
        number
    }

    pub fn get_event(&self, id: Uuid) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn get_event_by_number(&self, event_number: u64) -> Option<&Event> {
        self.events.iter().find(|e| e.event_number == event_number)
    }

    pub fn get_event_mut(&mut self, id: Uuid) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id == id)
    }

    /// Stores the task, assigning the next task number
    pub fn add_task(&mut self, mut task: Task) -> u64 {
        task.task_number = self.tasks.iter().map(|t| t.task_number).max().unwrap_or(0) + 1;
        let number = task.task_number;
        self.tasks.push(task);
        number
    }

    pub fn get_task_by_number(&self, task_number: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_number == task_number)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn get_tasks_for_event(&self, event_id: Uuid) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.event_id == event_id)
    }

    pub fn event_progress(&self, event_id: Uuid) -> Progress {
        self.get_tasks_for_event(event_id)
            .fold(Progress::default(), |mut progress, task| {
                progress.total += 1;
                if task.is_done {
                    progress.completed += 1;
                }
                progress
            })
    }

    /// Looks a template up by slug, falling back to a case-insensitive name match
    pub fn find_template(&self, slug_or_name: &str) -> Option<&Template> {
        let needle = slug_or_name.to_lowercase();
        self.templates
            .iter()
            .find(|t| t.slug == needle)
            .or_else(|| self.templates.iter().find(|t| t.name.to_lowercase() == needle))
    }

    pub fn get_template_mut(&mut self, id: Uuid) -> Option<&mut Template> {
        self.templates.iter_mut().find(|t| t.id == id)
    }

    /// Stores the rule, assigning the next rule number
    pub fn add_rule(&mut self, mut rule: NotificationRule) -> u64 {
        rule.rule_number = self.rules.iter().map(|r| r.rule_number).max().unwrap_or(0) + 1;
        let number = rule.rule_number;
        self.rules.push(rule);
        number
    }

    pub fn get_rule_by_number(&self, rule_number: u64) -> Option<&NotificationRule> {
        self.rules.iter().find(|r| r.rule_number == rule_number)
    }

    pub fn get_integration(&self, id: Uuid) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.id == id)
    }

    pub fn find_integration(&self, name: &str) -> Option<&Integration> {
        self.integrations
            .iter()
            .find(|i| i.name.to_lowercase() == name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_numbers_are_incremental() {
        let mut store = Store::default();
        let first = store.add_event(Event {
            id: Uuid::new_v4(),
            ..Event::default()
        });
        let second = store.add_event(Event {
            id: Uuid::new_v4(),
            ..Event::default()
        });
        assert_eq!((first, second), (1, 2));

        let event_id = store.events[0].id;
        let task_number = store.add_task(Task::new(event_id, "a".to_string(), date(2025, 1, 1)));
        assert_eq!(task_number, 1);
        assert_eq!(store.get_task_by_number(1).map(|t| t.event_id), Some(event_id));
    }

    #[test]
    fn test_event_progress() {
        let mut store = Store::default();
        let event_id = Uuid::new_v4();
        let mut done = Task::new(event_id, "done".to_string(), date(2025, 1, 1));
        done.is_done = true;
        store.add_task(done);
        store.add_task(Task::new(event_id, "open".to_string(), date(2025, 1, 2)));
        store.add_task(Task::new(Uuid::new_v4(), "other".to_string(), date(2025, 1, 2)));

        let progress = store.event_progress(event_id);
        assert_eq!(progress, Progress { total: 2, completed: 1 });
    }

    #[test]
    fn test_find_template_by_slug_or_name() {
        let mut store = Store::default();
        store.templates.push(Template {
            name: "Standard Seminar".to_string(),
            slug: "standard-seminar".to_string(),
            ..Template::default()
        });

        assert!(store.find_template("standard-seminar").is_some());
        assert!(store.find_template("standard seminar").is_some());
        assert!(store.find_template("other").is_none());
    }
}
