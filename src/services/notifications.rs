use std::collections::{BTreeSet, HashSet};

use jiff::civil::Date;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dates::offset_date,
    models::{event::Event, rule::NotificationRule, store::Store, task::Task},
    notifier::{Notifier, redact},
};

/// (destination, event id, threshold) of a message already handled in this run
pub type SentKey = (String, Uuid, i32);

/// Messages handled during one run. Start each run with an empty set.
pub type SentSet = HashSet<SentKey>;

pub struct NotifyParameters {
    /// Day the run is for, normally today
    pub base_date: Date,
    /// Send everything here instead of the rules' destinations
    pub webhook_override: Option<String>,
    /// Used for rules that have no active destination of their own
    pub fallback_webhook: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No notification rules are configured
    NoRules,
    /// Rules exist but no undone task is due on any target date
    NothingDue,
    Processed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub base_date: Date,
    pub thresholds: Vec<i32>,
    pub status: RunStatus,
    /// Tasks due on one of the target dates, counted once per threshold
    pub matched_tasks: usize,
    pub sent: usize,
    pub failed: usize,
    /// Messages skipped because the same key was handled earlier in the run
    pub duplicates: usize,
    /// Rules that had tasks to report but nowhere to send them
    pub rules_without_destination: usize,
}

/// Distinct thresholds over all rules, ascending
pub fn collect_thresholds(rules: &[NotificationRule]) -> Vec<i32> {
    rules
        .iter()
        .map(|r| r.days_before)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Undone tasks due on `target`, ordered by event then task number
pub fn tasks_due_on(store: &Store, target: Date) -> Vec<&Task> {
    let mut tasks: Vec<&Task> = store
        .tasks
        .iter()
        .filter(|t| !t.is_done && t.deadline == target)
        .collect();
    tasks.sort_by_key(|t| {
        let event_number = store
            .get_event(t.event_id)
            .map(|e| e.event_number)
            .unwrap_or(u64::MAX);
        (event_number, t.task_number)
    });
    tasks
}

/// Groups already ordered tasks by event, keeping first-seen order
pub fn group_by_event<'a>(store: &'a Store, tasks: &[&'a Task]) -> Vec<(&'a Event, Vec<&'a Task>)> {
    let mut groups: Vec<(&Event, Vec<&Task>)> = Vec::new();
    for &task in tasks {
        if let Some((_, group)) = groups.iter_mut().find(|(e, _)| e.id == task.event_id) {
            group.push(task);
            continue;
        }
        match store.get_event(task.event_id) {
            Some(event) => groups.push((event, vec![task])),
            None => warn!(task = task.task_number, "task belongs to a missing event, skipping"),
        }
    }
    groups
}

/// Where a rule's messages go: the override, else the rule's active Slack
/// integrations, else the global fallback. Duplicates are dropped, order is kept.
pub fn resolve_destinations(
    store: &Store,
    rule: &NotificationRule,
    parameters: &NotifyParameters,
) -> Vec<String> {
    if let Some(url) = &parameters.webhook_override {
        return vec![url.clone()];
    }

    let mut destinations: Vec<String> = Vec::new();
    let configured = rule
        .integration_ids
        .iter()
        .filter_map(|id| store.get_integration(*id))
        .filter_map(|i| i.notification_destination());
    for url in configured {
        if !destinations.iter().any(|d| d == url) {
            destinations.push(url.to_string());
        }
    }

    if destinations.is_empty() {
        if let Some(url) = &parameters.fallback_webhook {
            destinations.push(url.clone());
        }
    }

    destinations
}

pub fn build_message(event_title: &str, days_before: i32, target: Date, tasks: &[&Task]) -> String {
    let mut message = format!(
        "[Task reminder] {} days until deadline: event '{}' {}",
        days_before, event_title, target
    );
    for task in tasks {
        let assignee = task.assignee.as_deref().unwrap_or("unassigned");
        message.push_str(&format!("\n• {} ({})", task.name, assignee));
    }
    message
}

/// Notifies about undone tasks whose deadline is exactly `days_before` days after
/// the base date, for every configured rule.
///
/// One message goes out per (destination, event, threshold). `sent` holds the
/// keys already handled in this run and is returned updated; a key is recorded
/// even when delivery fails, and failures are never retried.
pub fn send_task_notifications(
    store: &Store,
    parameters: &NotifyParameters,
    notifier: &dyn Notifier,
    mut sent: SentSet,
) -> (NotificationReport, SentSet) {
    let thresholds = collect_thresholds(&store.rules);
    let mut report = NotificationReport {
        base_date: parameters.base_date,
        thresholds: thresholds.clone(),
        status: RunStatus::NoRules,
        matched_tasks: 0,
        sent: 0,
        failed: 0,
        duplicates: 0,
        rules_without_destination: 0,
    };

    if thresholds.is_empty() {
        warn!("no notification rules configured, nothing to do");
        return (report, sent);
    }

    info!(
        base_date = %parameters.base_date,
        thresholds = ?thresholds,
        "sending task notifications"
    );

    for days_before in thresholds {
        let Some(target) = offset_date(parameters.base_date, days_before) else {
            warn!(days_before, "target date out of range, skipping threshold");
            continue;
        };

        let due = tasks_due_on(store, target);
        if due.is_empty() {
            continue;
        }
        report.matched_tasks += due.len();
        let groups = group_by_event(store, &due);

        for rule in store.rules.iter().filter(|r| r.days_before == days_before) {
            let destinations = resolve_destinations(store, rule, parameters);
            if destinations.is_empty() {
                warn!(rule = rule.rule_number, "no destination configured, skipping rule");
                report.rules_without_destination += 1;
                continue;
            }

            for (event, tasks) in &groups {
                let message = build_message(&event.title, days_before, target, tasks);

                for destination in &destinations {
                    let key = (destination.clone(), event.id, days_before);
                    if sent.contains(&key) {
                        report.duplicates += 1;
                        continue;
                    }

                    if notifier.send(&message, destination) {
                        info!(
                            rule = rule.rule_number,
                            event = event.event_number,
                            tasks = tasks.len(),
                            days_before,
                            "notified"
                        );
                        report.sent += 1;
                    } else {
                        error!(
                            rule = rule.rule_number,
                            event = event.event_number,
                            days_before,
                            destination = %redact(destination),
                            "notification failed"
                        );
                        report.failed += 1;
                    }

                    sent.insert(key);
                }
            }
        }
    }

    report.status = if report.matched_tasks == 0 {
        RunStatus::NothingDue
    } else {
        RunStatus::Processed
    };

    (report, sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::integration::{Integration, Provider};
    use crate::testing::RecordingNotifier;
    use jiff::civil::date;

    const RUN_DATE: Date = date(2025, 3, 1);
    const TEAM: &str = "https://hooks.slack.com/services/team";
    const OPS: &str = "https://hooks.slack.com/services/ops";
    const FALLBACK: &str = "https://hooks.slack.com/services/fallback";

    fn parameters() -> NotifyParameters {
        NotifyParameters {
            base_date: RUN_DATE,
            webhook_override: None,
            fallback_webhook: Some(FALLBACK.to_string()),
        }
    }

    fn add_event(store: &mut Store, title: &str) -> Uuid {
        let event = Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            ..Event::default()
        };
        let id = event.id;
        store.add_event(event);
        id
    }

    fn add_task(store: &mut Store, event_id: Uuid, name: &str, deadline: Date, done: bool) {
        let mut task = Task::new(event_id, name.to_string(), deadline);
        task.is_done = done;
        store.add_task(task);
    }

    fn add_slack(store: &mut Store, name: &str, url: &str, is_active: bool) -> Uuid {
        let integration = Integration {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active,
            provider: Provider::Slack {
                webhook_url: url.to_string(),
            },
            created_at: jiff::Timestamp::now(),
        };
        let id = integration.id;
        store.integrations.push(integration);
        id
    }

    fn add_rule(store: &mut Store, days_before: i32, integration_ids: Vec<Uuid>) {
        store.add_rule(NotificationRule {
            id: Uuid::new_v4(),
            rule_number: 0,
            days_before,
            integration_ids,
        });
    }

    #[test]
    fn test_no_rules_is_a_noop() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), false);
        let notifier = RecordingNotifier::default();

        let (report, sent) =
            send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(report.status, RunStatus::NoRules);
        assert!(sent.is_empty());
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn test_only_undone_tasks_on_target_date_are_included() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), false);
        add_task(&mut store, event_id, "Venue", date(2025, 3, 4), true);
        add_task(&mut store, event_id, "Later", date(2025, 3, 5), false);
        add_rule(&mut store, 3, vec![]);
        let notifier = RecordingNotifier::default();

        let (report, _) = send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(report.status, RunStatus::Processed);
        assert_eq!(report.matched_tasks, 1);
        let messages = notifier.messages_to(FALLBACK);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "[Task reminder] 3 days until deadline: event 'Intro to Rust' 2025-03-04\n• Slides (unassigned)"
        );
    }

    #[test]
    fn test_done_task_alone_means_nothing_due() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), true);
        add_rule(&mut store, 3, vec![]);
        let notifier = RecordingNotifier::default();

        let (report, _) = send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(report.status, RunStatus::NothingDue);
        assert_eq!(report.sent, 0);
    }

    #[test]
    fn test_one_message_per_event_and_destination() {
        let mut store = Store::default();
        let rust = add_event(&mut store, "Intro to Rust");
        let go = add_event(&mut store, "Intro to Go");
        add_task(&mut store, go, "Go slides", date(2025, 3, 8), false);
        add_task(&mut store, rust, "Rust slides", date(2025, 3, 8), false);
        add_task(&mut store, rust, "Rust venue", date(2025, 3, 8), false);
        let team = add_slack(&mut store, "team", TEAM, true);
        let ops = add_slack(&mut store, "ops", OPS, true);
        add_rule(&mut store, 7, vec![team, ops]);
        let notifier = RecordingNotifier::default();

        let (report, sent) =
            send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(report.sent, 4);
        assert_eq!(sent.len(), 4);
        let to_team = notifier.messages_to(TEAM);
        assert_eq!(to_team.len(), 2);
        // grouped by event number, tasks in task number order
        assert!(to_team[0].contains("'Intro to Rust'"));
        assert!(to_team[0].ends_with("• Rust slides (unassigned)\n• Rust venue (unassigned)"));
        assert!(to_team[1].contains("'Intro to Go'"));
        assert!(notifier.messages_to(FALLBACK).is_empty());
    }

    #[test]
    fn test_same_key_is_dispatched_once_per_run() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), false);
        let team = add_slack(&mut store, "team", TEAM, true);
        // two rules with the same threshold and destination
        add_rule(&mut store, 3, vec![team]);
        add_rule(&mut store, 3, vec![team]);
        let notifier = RecordingNotifier::default();

        let (report, sent) =
            send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(notifier.messages_to(TEAM).len(), 1);
        assert_eq!(report.sent, 1);
        assert_eq!(report.duplicates, 1);

        // feeding the set back in suppresses the message entirely
        let second = RecordingNotifier::default();
        let (report, _) = send_task_notifications(&store, &parameters(), &second, sent);
        assert!(second.sent.borrow().is_empty());
        assert_eq!(report.duplicates, 2);
    }

    #[test]
    fn test_failed_send_is_recorded_and_run_continues() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), false);
        let team = add_slack(&mut store, "team", TEAM, true);
        let ops = add_slack(&mut store, "ops", OPS, true);
        add_rule(&mut store, 3, vec![team, ops]);
        add_rule(&mut store, 3, vec![team]);
        let notifier = RecordingNotifier::failing_for(TEAM);

        let (report, sent) =
            send_task_notifications(&store, &parameters(), &notifier, SentSet::new());

        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1);
        // not retried by the second rule
        assert_eq!(notifier.messages_to(TEAM).len(), 1);
        assert!(sent.contains(&(TEAM.to_string(), event_id, 3)));
    }

    #[test]
    fn test_resolve_destinations_priority() {
        let mut store = Store::default();
        let team = add_slack(&mut store, "team", TEAM, true);
        let inactive = add_slack(&mut store, "old", OPS, false);
        let duplicate = add_slack(&mut store, "team-again", TEAM, true);
        let rule = NotificationRule {
            days_before: 1,
            integration_ids: vec![team, inactive, duplicate],
            ..NotificationRule::default()
        };

        assert_eq!(resolve_destinations(&store, &rule, &parameters()), vec![TEAM]);

        let overridden = NotifyParameters {
            webhook_override: Some("https://override".to_string()),
            ..parameters()
        };
        assert_eq!(
            resolve_destinations(&store, &rule, &overridden),
            vec!["https://override"]
        );

        let only_inactive = NotificationRule {
            integration_ids: vec![inactive],
            ..rule
        };
        assert_eq!(
            resolve_destinations(&store, &only_inactive, &parameters()),
            vec![FALLBACK]
        );

        let no_fallback = NotifyParameters {
            fallback_webhook: None,
            ..parameters()
        };
        assert!(resolve_destinations(&store, &only_inactive, &no_fallback).is_empty());
    }

    #[test]
    fn test_rule_without_destination_is_skipped() {
        let mut store = Store::default();
        let event_id = add_event(&mut store, "Intro to Rust");
        add_task(&mut store, event_id, "Slides", date(2025, 3, 4), false);
        add_rule(&mut store, 3, vec![]);
        let notifier = RecordingNotifier::default();
        let params = NotifyParameters {
            fallback_webhook: None,
            ..parameters()
        };

        let (report, _) = send_task_notifications(&store, &params, &notifier, SentSet::new());

        assert_eq!(report.rules_without_destination, 1);
        assert_eq!(report.status, RunStatus::Processed);
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn test_message_lists_assignees() {
        let event_id = Uuid::new_v4();
        let mut slides = Task::new(event_id, "Slides".to_string(), date(2025, 3, 4));
        slides.assignee = Some("alice".to_string());
        let venue = Task::new(event_id, "Venue".to_string(), date(2025, 3, 4));

        let message = build_message("Intro to Rust", 3, date(2025, 3, 4), &[&slides, &venue]);

        assert_eq!(
            message,
            "[Task reminder] 3 days until deadline: event 'Intro to Rust' 2025-03-04\n• Slides (alice)\n• Venue (unassigned)"
        );
    }

    #[test]
    fn test_collect_thresholds_is_sorted_and_distinct() {
        let rules: Vec<NotificationRule> = [7, 1, 3, 7]
            .into_iter()
            .map(|days_before| NotificationRule {
                days_before,
                ..NotificationRule::default()
            })
            .collect();
        assert_eq!(collect_thresholds(&rules), vec![1, 3, 7]);
    }
}
