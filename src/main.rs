use std::fmt::Display;

use clap::{Parser, Subcommand};
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    dates::{format_date_with_weekday, parse_date_input},
    models::{event::Format, integration::Provider},
    notifier::{DryRun, Notifier, SlackWebhook},
    services::{
        FieldErrors,
        events::{
            CreateEventParameters, EventError, ReplaceDatesParameters, UpdateEventParameters,
            copy_event, create_event, delete_event, event_overview, replace_event_dates,
            update_event,
        },
        integrations::{
            AddIntegrationParameters, add_integration, delete_integration, set_integration_active,
        },
        notifications::{NotifyParameters, SentSet, send_task_notifications},
        rules::{CreateRuleParameters, RuleError, UpdateRuleParameters, create_rule, delete_rule, update_rule},
        tasks::{AddTaskParameters, TaskError, UpdateTaskParameters, add_task, delete_task, toggle_task, update_task},
        templates::{
            ApplyTemplateParameters, CreateTemplateParameters, TemplateEntryParameters,
            TemplateError, UpdateTemplateParameters, add_template_entry, apply_template,
            copy_template, create_template, delete_template, load_default_template,
            remove_template_entry, update_template, update_template_entry,
        },
    },
    storage::{Storage, json::JsonFileStorage},
};

mod config;
mod dates;
mod models;
mod notifier;
mod services;
mod storage;
#[cfg(test)]
mod testing;
mod ui;

#[derive(Parser)]
#[command(
    name = "semprep",
    about = "Plan seminar preparation tasks and send deadline reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage events
    #[command(subcommand)]
    Event(EventCommands),

    /// Manage preparation tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Manage task templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Manage notification rules
    #[command(subcommand)]
    Rule(RuleCommands),

    /// Manage notification integrations
    #[command(subcommand)]
    Integration(IntegrationCommands),

    /// Send reminders for tasks whose deadline is N days away
    Notify {
        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        /// Send everything to this webhook instead of the configured ones
        #[arg(short, long)]
        webhook: Option<String>,

        /// Print messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// Create a new event
    New {
        /// Event title
        title: String,

        /// Event date (can be used multiple times)
        #[arg(short, long = "date", action = clap::ArgAction::Append)]
        dates: Vec<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        capacity: Option<u32>,

        #[arg(long)]
        price: Option<u32>,

        #[arg(short, long, value_enum, default_value_t = Format::Offline)]
        format: Format,

        /// Expand this template into tasks (name or slug)
        #[arg(short, long)]
        template: Option<String>,
    },
    /// List all events
    List,
    /// View an event's tasks grouped by deadline
    View { event_number: u64 },
    /// Edit an event's details, blank text clears a field
    Edit {
        event_number: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        capacity: Option<u32>,

        #[arg(long)]
        price: Option<u32>,

        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Replace the dates (can be used multiple times)
        #[arg(short, long = "date", action = clap::ArgAction::Append)]
        dates: Vec<String>,
    },
    /// Replace an event's dates
    Dates {
        event_number: u64,

        #[arg(short, long = "date", action = clap::ArgAction::Append)]
        dates: Vec<String>,
    },
    /// Copy an event's details into a new event
    Copy { event_number: u64 },
    /// Delete an event and its tasks
    Delete { event_number: u64 },
    /// Expand a template into an existing event
    ApplyTemplate { event_number: u64, template: String },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task to an event
    Add {
        event_number: u64,

        /// Task name
        name: String,

        /// Deadline (YYYY-MM-DD)
        #[arg(short, long)]
        deadline: String,

        #[arg(short, long)]
        assignee: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Toggle a task between done and not done
    Done { task_number: u64 },
    /// Rename a task or move its deadline
    Edit {
        task_number: u64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        deadline: Option<String>,
    },
    /// Delete a task
    Delete { task_number: u64 },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Create an empty template
    New {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
    /// List all templates
    List,
    /// View a template's entries
    View { template: String },
    /// Rename a template or change its description
    Edit {
        template: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Duplicate a template with all of its entries
    Copy { template: String },
    /// Delete a template
    Delete { template: String },
    /// Append an entry to a template
    AddTask {
        template: String,

        name: String,

        /// Days relative to the event date, negative means before
        #[arg(long, allow_hyphen_values = true)]
        days: Option<String>,

        #[arg(short, long)]
        assignee: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Replace the entry at a position (as shown by `template view`)
    EditTask {
        template: String,

        position: usize,

        name: String,

        #[arg(long, allow_hyphen_values = true)]
        days: Option<String>,

        #[arg(short, long)]
        assignee: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Remove the entry at a position
    RemoveTask { template: String, position: usize },
    /// Install the built-in seminar template
    LoadDefault,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Create a rule that fires N days before a deadline
    New {
        days_before: i32,

        /// Integration to notify (can be used multiple times)
        #[arg(short, long = "integration", action = clap::ArgAction::Append)]
        integrations: Vec<String>,
    },
    /// List all rules
    List,
    /// Change a rule's threshold or integrations
    Edit {
        rule_number: u64,

        #[arg(short, long)]
        days_before: Option<i32>,

        /// Replace the integrations (can be used multiple times)
        #[arg(short, long = "integration", action = clap::ArgAction::Append)]
        integrations: Vec<String>,

        /// Detach every integration
        #[arg(long, conflicts_with = "integrations")]
        clear_integrations: bool,
    },
    /// Delete a rule
    Delete { rule_number: u64 },
}

#[derive(Subcommand)]
enum IntegrationCommands {
    /// Add a Slack incoming webhook
    AddSlack { name: String, webhook_url: String },
    /// Add an X account, credentials are read from <ENV_PREFIX>_* variables
    AddX { name: String, env_prefix: String },
    /// List all integrations
    List,
    /// Activate an integration
    Enable { name: String },
    /// Deactivate an integration without deleting it
    Disable { name: String },
    /// Delete an integration
    Delete { name: String },
}

fn exit_with_error(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn exit_with_field_errors(context: &str, errors: &FieldErrors) -> ! {
    ui::render_field_errors(context, errors);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("semprep=info")),
        )
        .init();

    let config = Config::from_env().unwrap_or_else(|e| exit_with_error(e));

    // Create parent directory if it doesn't exist
    if let Some(parent) = config.store_path.parent() {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            exit_with_error(format!("Failed to create data directory: {}", e))
        });
    }

    let storage = JsonFileStorage::new(config.store_path.clone());

    let mut store = match storage.load() {
        Ok(store) => store,
        Err(e) => exit_with_error(format!("Failed to load store: {}", e)),
    };

    let today = jiff::Zoned::now().date();

    match cli.command {
        Some(Commands::Event(EventCommands::New {
            title,
            dates,
            description,
            location,
            capacity,
            price,
            format,
            template,
        })) => {
            let params = CreateEventParameters {
                title,
                description,
                location,
                capacity,
                price,
                format,
                dates,
                template,
                today,
            };

            match create_event(&mut store, &storage, params) {
                Ok(result) => {
                    println!("✓ Event created: {}", result.event.title);
                    println!("  #{}", result.event.event_number);
                    if result.created_tasks > 0 {
                        println!("  └─ {} task(s) created from template", result.created_tasks);
                    }
                }
                Err(EventError::Invalid(errors)) => {
                    exit_with_field_errors("Event could not be created", &errors)
                }
                Err(EventError::TemplateNotFound(name)) => {
                    eprintln!("Error: Template '{}' not found", name);
                    if !store.templates.is_empty() {
                        eprintln!("\nAvailable templates:");
                        for t in &store.templates {
                            eprintln!("  - {} ({})", t.name, t.slug);
                        }
                    }
                    std::process::exit(1);
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::List)) | None => {
            ui::render_event_list(&store, today);
        }
        Some(Commands::Event(EventCommands::View { event_number })) => {
            match event_overview(&store, event_number, today) {
                Ok(overview) => ui::render_event_overview(&overview, today),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::Edit {
            event_number,
            title,
            description,
            location,
            capacity,
            price,
            format,
            dates,
        })) => {
            let params = UpdateEventParameters {
                event_number,
                title,
                description,
                location,
                capacity,
                price,
                format,
                dates: if dates.is_empty() { None } else { Some(dates) },
                today,
            };
            match update_event(&mut store, &storage, params) {
                Ok(event) => {
                    println!("✓ Event updated: {}", event.title);
                    println!("  #{}", event.event_number);
                }
                Err(EventError::Invalid(errors)) => {
                    exit_with_field_errors("Event could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::Dates {
            event_number,
            dates,
        })) => {
            let params = ReplaceDatesParameters {
                event_number,
                dates,
                today,
            };
            match replace_event_dates(&mut store, &storage, params) {
                Ok(event) => {
                    println!("✓ Dates updated: {}", event.title);
                    for date in &event.dates {
                        println!("  {}", format_date_with_weekday(*date));
                    }
                }
                Err(EventError::Invalid(errors)) => {
                    exit_with_field_errors("Dates could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::Copy { event_number })) => {
            match copy_event(&mut store, &storage, event_number) {
                Ok(event) => {
                    println!("✓ Event copied: {}", event.title);
                    println!("  #{}", event.event_number);
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::Delete { event_number })) => {
            match delete_event(&mut store, &storage, event_number) {
                Ok(result) => {
                    println!("✓ Event deleted: {}", result.event.title);
                    if result.removed_tasks > 0 {
                        println!("  └─ {} task(s) also deleted", result.removed_tasks);
                    }
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Event(EventCommands::ApplyTemplate {
            event_number,
            template,
        })) => {
            let params = ApplyTemplateParameters {
                event_number,
                template,
            };
            match apply_template(&mut store, &storage, params) {
                Ok(numbers) if numbers.is_empty() => {
                    println!("No tasks created (the event has no dates or the template no dated entries)");
                }
                Ok(numbers) => println!("✓ {} task(s) created", numbers.len()),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Task(TaskCommands::Add {
            event_number,
            name,
            deadline,
            assignee,
            notes,
        })) => {
            let params = AddTaskParameters {
                event_number,
                name,
                deadline,
                assignee,
                notes,
            };
            match add_task(&mut store, &storage, params) {
                Ok(task) => {
                    println!("✓ Task added: {}", task.name);
                    println!("  #{}  due {}", task.task_number, format_date_with_weekday(task.deadline));
                }
                Err(TaskError::Invalid(errors)) => {
                    exit_with_field_errors("Task could not be added", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Task(TaskCommands::Done { task_number })) => {
            match toggle_task(&mut store, &storage, task_number) {
                Ok(task) if task.is_done => println!("✓ Task completed: {}", task.name),
                Ok(task) => println!("○ Task reopened: {}", task.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Task(TaskCommands::Edit {
            task_number,
            name,
            deadline,
        })) => {
            let Some(current) = store.get_task_by_number(task_number) else {
                exit_with_error(TaskError::TaskNotFound(task_number));
            };
            let params = UpdateTaskParameters {
                task_number,
                name: name.unwrap_or_else(|| current.name.clone()),
                deadline: deadline.unwrap_or_else(|| current.deadline.to_string()),
            };
            match update_task(&mut store, &storage, params) {
                Ok(task) => {
                    println!("✓ Task updated: {}", task.name);
                    println!("  #{}  due {}", task.task_number, format_date_with_weekday(task.deadline));
                }
                Err(TaskError::Invalid(errors)) => {
                    exit_with_field_errors("Task could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Task(TaskCommands::Delete { task_number })) => {
            match delete_task(&mut store, &storage, task_number) {
                Ok(task) => println!("✓ Task deleted: {}", task.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::New { name, description })) => {
            let params = CreateTemplateParameters { name, description };
            match create_template(&mut store, &storage, params) {
                Ok(template) => {
                    println!(
                        "✓ Template {} created with slug {}",
                        template.name, template.slug
                    );
                }
                Err(TemplateError::Invalid(errors)) => {
                    exit_with_field_errors("Template could not be created", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::List)) => {
            ui::render_template_list(&store);
        }
        Some(Commands::Template(TemplateCommands::View { template })) => {
            match store.find_template(&template) {
                Some(t) => ui::render_template(t),
                None => {
                    eprintln!("Error: Template '{}' not found", template);
                    if !store.templates.is_empty() {
                        eprintln!("\nAvailable templates:");
                        for t in &store.templates {
                            eprintln!("  - {} ({})", t.name, t.slug);
                        }
                    }
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Template(TemplateCommands::Edit {
            template,
            name,
            description,
        })) => {
            let params = UpdateTemplateParameters { name, description };
            match update_template(&mut store, &storage, &template, params) {
                Ok(updated) => {
                    println!(
                        "✓ Template {} updated with slug {}",
                        updated.name, updated.slug
                    );
                }
                Err(TemplateError::Invalid(errors)) => {
                    exit_with_field_errors("Template could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::Copy { template })) => {
            match copy_template(&mut store, &storage, &template) {
                Ok(copy) => {
                    println!("✓ Template {} created with slug {}", copy.name, copy.slug);
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::Delete { template })) => {
            match delete_template(&mut store, &storage, &template) {
                Ok(removed) => println!("✓ Template deleted: {}", removed.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::AddTask {
            template,
            name,
            days,
            assignee,
            notes,
        })) => {
            let params = TemplateEntryParameters {
                name,
                relative_days: days,
                default_assignee: assignee,
                default_notes: notes,
            };
            match add_template_entry(&mut store, &storage, &template, params) {
                Ok(entry) => println!("✓ Entry added: {} ({})", entry.name, entry.when_display()),
                Err(TemplateError::Invalid(errors)) => {
                    exit_with_field_errors("Entry could not be added", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::EditTask {
            template,
            position,
            name,
            days,
            assignee,
            notes,
        })) => {
            let params = TemplateEntryParameters {
                name,
                relative_days: days,
                default_assignee: assignee,
                default_notes: notes,
            };
            match update_template_entry(&mut store, &storage, &template, position, params) {
                Ok(entry) => {
                    println!("✓ Entry updated: {} ({})", entry.name, entry.when_display())
                }
                Err(TemplateError::Invalid(errors)) => {
                    exit_with_field_errors("Entry could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::RemoveTask { template, position })) => {
            match remove_template_entry(&mut store, &storage, &template, position) {
                Ok(entry) => println!("✓ Entry removed: {}", entry.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Template(TemplateCommands::LoadDefault)) => {
            match load_default_template(&mut store, &storage) {
                Ok(template) => {
                    println!(
                        "✓ Template {} loaded with {} entries",
                        template.name,
                        template.tasks.len()
                    );
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Rule(RuleCommands::New {
            days_before,
            integrations,
        })) => {
            let params = CreateRuleParameters {
                days_before,
                integrations,
            };
            match create_rule(&mut store, &storage, params) {
                Ok(rule) => {
                    println!(
                        "✓ Rule #{} created: {} day(s) before",
                        rule.rule_number, rule.days_before
                    );
                    if rule.integration_ids.is_empty() {
                        println!(
                            "  {}",
                            "No integrations attached, the default webhook will be used".dimmed()
                        );
                    }
                }
                Err(RuleError::Invalid(errors)) => {
                    exit_with_field_errors("Rule could not be created", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Rule(RuleCommands::List)) => {
            ui::render_rule_list(&store, config.fallback_webhook_url.as_deref());
        }
        Some(Commands::Rule(RuleCommands::Edit {
            rule_number,
            days_before,
            integrations,
            clear_integrations,
        })) => {
            let integrations = if clear_integrations {
                Some(vec![])
            } else if integrations.is_empty() {
                None
            } else {
                Some(integrations)
            };
            let params = UpdateRuleParameters {
                rule_number,
                days_before,
                integrations,
            };
            match update_rule(&mut store, &storage, params) {
                Ok(rule) => println!(
                    "✓ Rule #{} updated: {} day(s) before",
                    rule.rule_number, rule.days_before
                ),
                Err(RuleError::Invalid(errors)) => {
                    exit_with_field_errors("Rule could not be updated", &errors)
                }
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Rule(RuleCommands::Delete { rule_number })) => {
            match delete_rule(&mut store, &storage, rule_number) {
                Ok(rule) => println!("✓ Rule #{} deleted", rule.rule_number),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Integration(IntegrationCommands::AddSlack { name, webhook_url })) => {
            let params = AddIntegrationParameters {
                name,
                provider: Provider::Slack { webhook_url },
            };
            match add_integration(&mut store, &storage, params) {
                Ok(integration) => println!("✓ Slack integration added: {}", integration.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Integration(IntegrationCommands::AddX { name, env_prefix })) => {
            let params = AddIntegrationParameters {
                name,
                provider: Provider::X { env_prefix },
            };
            match add_integration(&mut store, &storage, params) {
                Ok(integration) => println!("✓ X integration added: {}", integration.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Integration(IntegrationCommands::List)) => {
            ui::render_integration_list(&store);
        }
        Some(Commands::Integration(IntegrationCommands::Enable { name })) => {
            match set_integration_active(&mut store, &storage, &name, true) {
                Ok(integration) => println!("✓ Integration enabled: {}", integration.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Integration(IntegrationCommands::Disable { name })) => {
            match set_integration_active(&mut store, &storage, &name, false) {
                Ok(integration) => println!("✓ Integration disabled: {}", integration.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Integration(IntegrationCommands::Delete { name })) => {
            match delete_integration(&mut store, &storage, &name) {
                Ok(integration) => println!("✓ Integration deleted: {}", integration.name),
                Err(e) => exit_with_error(e),
            }
        }
        Some(Commands::Notify {
            date,
            webhook,
            dry_run,
        }) => {
            let base_date = match date.as_deref() {
                None => today,
                Some(raw) => parse_date_input(raw).unwrap_or_else(|| {
                    warn!(date = raw, %today, "could not parse --date, using today");
                    today
                }),
            };

            let notifier: Box<dyn Notifier> = if dry_run {
                Box::new(DryRun)
            } else {
                match SlackWebhook::new(config.http_timeout) {
                    Ok(webhook) => Box::new(webhook),
                    Err(e) => exit_with_error(format!("Failed to build HTTP client: {}", e)),
                }
            };

            let params = NotifyParameters {
                base_date,
                webhook_override: webhook,
                fallback_webhook: config.fallback_webhook_url.clone(),
            };

            info!(%base_date, dry_run, "starting notification run");
            let (report, _) = send_task_notifications(&store, &params, &*notifier, SentSet::new());
            ui::render_notification_report(&report, dry_run);
        }
    }
}
