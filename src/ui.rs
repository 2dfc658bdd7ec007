use colored::*;
use jiff::civil::Date;

use crate::{
    dates::{describe_relative_days, format_date_with_weekday},
    models::{
        event::{Event, Format, Progress},
        integration::{Integration, Provider},
        rule::NotificationRule,
        store::Store,
        task::Task,
        template::Template,
    },
    notifier::redact,
    services::{
        FieldErrors,
        events::EventOverview,
        notifications::{NotificationReport, RunStatus},
    },
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

/// Get the appropriate status glyph for a task
pub fn get_status_glyph(task: &Task, today: Date) -> ColoredString {
    if task.is_done {
        "✓".dimmed()
    } else if task.is_overdue(today) {
        "●".red()
    } else {
        "○".normal()
    }
}

/// Task number, glyph and name on the left, assignee right-aligned
pub fn render_task_line(task: &Task, today: Date) {
    let terminal_width = get_terminal_width();

    let left = format!("  {:>3}  {}  {}", task.task_number, get_status_glyph(task, today), task.name);
    let styled_left = if task.is_done { left.dimmed() } else { left.bold() };

    let right = task.assignee.clone().unwrap_or_default();
    if right.is_empty() {
        println!("{}", styled_left);
        return;
    }

    // the glyph is a single column wide
    let left_len = format!("  {:>3}     {}", task.task_number, task.name).chars().count();
    let right_len = right.chars().count();
    if left_len + right_len + 4 < terminal_width {
        let padding = terminal_width - left_len - right_len - 2;
        println!("{}{}{}", styled_left, " ".repeat(padding), right.dimmed());
    } else {
        println!("{}  {}", styled_left, right.dimmed());
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize, noun: (&str, &str)) {
    println!("\n  {} ({})\n", title.cyan().bold(), plural(count, noun.0, noun.1));
}

/// Render a section header (e.g. a deadline date)
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

pub fn render_field_errors(context: &str, errors: &FieldErrors) {
    eprintln!("Error: {}", context);
    for (field, message) in errors.iter() {
        eprintln!("  - {}: {}", field, message);
    }
}

fn format_label(format: Format) -> &'static str {
    match format {
        Format::Online => "online",
        Format::Offline => "offline",
    }
}

pub fn render_event_list(store: &Store, today: Date) {
    if store.events.is_empty() {
        println!("No events yet");
        return;
    }

    let mut events: Vec<&Event> = store.events.iter().collect();
    events.sort_by_key(|e| (e.base_date(), e.event_number));

    render_view_header("EVENTS", events.len(), ("event", "events"));
    for event in events {
        let progress = store.event_progress(event.id);
        let title = format!("#{} {}", event.event_number, event.title);
        let title = if event.all_dates_past(today) {
            title.dimmed()
        } else {
            title.bold()
        };
        println!("  {} {}", "•".green(), title);

        let dates = if event.dates.is_empty() {
            "no dates".to_string()
        } else {
            event
                .dates
                .iter()
                .map(|d| format_date_with_weekday(*d))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("    {} {}", "Dates:".dimmed(), dates);
        println!("    {} {}", "Progress:".dimmed(), render_progress(progress));
        println!();
    }
}

fn render_progress(progress: Progress) -> String {
    format!(
        "{}/{} done ({}%)",
        progress.completed,
        progress.total,
        progress.percent()
    )
}

pub fn render_event_overview(overview: &EventOverview, today: Date) {
    let event = overview.event;
    println!(
        "\n  {} {}",
        format!("#{}", event.event_number).dimmed(),
        event.title.cyan().bold()
    );

    let mut details = vec![format_label(event.format).to_string()];
    if let Some(location) = &event.location {
        details.push(location.clone());
    }
    if let Some(capacity) = event.capacity {
        details.push(format!("{} seats", capacity));
    }
    if let Some(price) = event.price {
        details.push(format!("price {}", price));
    }
    println!("  {}", details.join(" · ").dimmed());

    for date in &event.dates {
        println!(
            "  {} {} ({})",
            "Date:".dimmed(),
            format_date_with_weekday(*date),
            describe_relative_days(*date, today)
        );
    }
    if let Some(description) = &event.description {
        println!("\n  {}", description);
    }

    println!(
        "\n  {}  ·  {}  ·  {}",
        render_progress(overview.progress),
        format!("{} overdue", overview.overdue).red(),
        format!("{} pending", overview.pending)
    );

    if overview.groups.is_empty() {
        println!("\n  No tasks yet");
        return;
    }

    for group in &overview.groups {
        render_section_header(&format!(
            "{}  {}  {}/{}",
            format_date_with_weekday(group.date),
            group.relative_text,
            group.progress.completed,
            group.progress.total
        ));
        for task in &group.tasks {
            render_task_line(task, today);
        }
    }
    println!();
}

pub fn render_template_list(store: &Store) {
    if store.templates.is_empty() {
        println!("No templates yet (try `semprep template load-default`)");
        return;
    }

    render_view_header("TEMPLATES", store.templates.len(), ("template", "templates"));
    for template in &store.templates {
        println!("  {} {} {}", "•".green(), template.name.bold(), format!("({})", template.slug).dimmed());
        println!("    {}", plural(template.tasks.len(), "entry", "entries").dimmed());
    }
    println!();
}

pub fn render_template(template: &Template) {
    render_view_header(&template.name, template.tasks.len(), ("entry", "entries"));
    if let Some(description) = &template.description {
        println!("  {}\n", description.dimmed());
    }
    for (position, entry) in template.tasks.iter().enumerate() {
        println!("  {:>3}  {}", position + 1, entry.name.bold());
        let mut meta = vec![entry.when_display()];
        if let Some(assignee) = &entry.default_assignee {
            meta.push(assignee.clone());
        }
        println!("       {}", meta.join(" · ").dimmed());
    }
    println!();
}

fn describe_integration(integration: &Integration) -> String {
    match &integration.provider {
        Provider::Slack { webhook_url } => redact(webhook_url),
        Provider::X { env_prefix } => format!("env {}_*", env_prefix),
    }
}

pub fn render_integration_list(store: &Store) {
    if store.integrations.is_empty() {
        println!("No integrations configured");
        return;
    }

    render_view_header(
        "INTEGRATIONS",
        store.integrations.len(),
        ("integration", "integrations"),
    );
    let mut integrations: Vec<&Integration> = store.integrations.iter().collect();
    integrations.sort_by(|a, b| {
        (a.provider.label(), a.name.to_lowercase()).cmp(&(b.provider.label(), b.name.to_lowercase()))
    });
    for integration in integrations {
        let status = if integration.is_active {
            "active".green()
        } else {
            "inactive".dimmed()
        };
        println!(
            "  {} [{}] {}  {}  {}",
            "•".green(),
            integration.provider.label(),
            integration.name.bold(),
            status,
            describe_integration(integration).dimmed()
        );
    }
    println!();
}

pub fn render_rule_list(store: &Store, fallback: Option<&str>) {
    if store.rules.is_empty() {
        println!("No notification rules configured");
        return;
    }

    let mut rules: Vec<&NotificationRule> = store.rules.iter().collect();
    rules.sort_by_key(|r| (r.days_before, r.rule_number));

    render_view_header("NOTIFICATION RULES", rules.len(), ("rule", "rules"));
    for rule in rules {
        let names: Vec<String> = rule
            .integration_ids
            .iter()
            .filter_map(|id| store.get_integration(*id))
            .map(|i| i.name.clone())
            .collect();
        let targets = if !names.is_empty() {
            names.join(", ")
        } else if fallback.is_some() {
            "default webhook".to_string()
        } else {
            "no destination".to_string()
        };
        println!(
            "  {:>3}  {}  {}",
            rule.rule_number,
            plural(rule.days_before.unsigned_abs() as usize, "day before", "days before").bold(),
            targets.dimmed()
        );
    }
    println!();
}

pub fn render_notification_report(report: &NotificationReport, dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    match report.status {
        RunStatus::NoRules => {
            println!("{}", "No notification rules configured, nothing to do".yellow());
        }
        RunStatus::NothingDue => {
            println!("No tasks due for {}{}", report.base_date, mode);
        }
        RunStatus::Processed => {
            println!(
                "{} {} for {}{}: {} sent, {} failed, {} duplicates skipped",
                "Processed".green(),
                plural(report.matched_tasks, "task", "tasks"),
                report.base_date,
                mode,
                report.sent,
                report.failed,
                report.duplicates
            );
            if report.rules_without_destination > 0 {
                println!(
                    "{}",
                    format!(
                        "{} without a destination were skipped",
                        plural(report.rules_without_destination, "rule", "rules")
                    )
                    .yellow()
                );
            }
        }
    }
}
