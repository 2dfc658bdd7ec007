use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{rule::NotificationRule, store::Store},
    services::FieldErrors,
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Notification rule #{0} not found")]
    RuleNotFound(u64),

    #[error("Invalid notification rule: {0}")]
    Invalid(FieldErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn validate_days_before(days_before: i32) -> Result<i32, RuleError> {
    if days_before < 0 {
        let mut errors = FieldErrors::default();
        errors.add("days_before", "must be zero or more");
        return Err(RuleError::Invalid(errors));
    }
    Ok(days_before)
}

/// Maps integration names to ids. Unknown or inactive names are dropped.
fn resolve_integrations(store: &Store, names: &[String]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for name in names {
        match store.find_integration(name) {
            Some(integration) if integration.is_active => {
                if !ids.contains(&integration.id) {
                    ids.push(integration.id);
                }
            }
            _ => tracing::warn!(integration = %name, "ignoring unknown or inactive integration"),
        }
    }
    ids
}

pub struct CreateRuleParameters {
    pub days_before: i32,
    pub integrations: Vec<String>,
}

pub fn create_rule(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateRuleParameters,
) -> Result<NotificationRule, RuleError> {
    let days_before = validate_days_before(parameters.days_before)?;
    let integration_ids = resolve_integrations(store, &parameters.integrations);

    let number = store.add_rule(NotificationRule {
        id: Uuid::new_v4(),
        rule_number: 0,
        days_before,
        integration_ids,
    });

    storage.save(store)?;

    store
        .get_rule_by_number(number)
        .cloned()
        .ok_or(RuleError::RuleNotFound(number))
}

pub struct UpdateRuleParameters {
    pub rule_number: u64,
    pub days_before: Option<i32>,
    /// Replaces the integration set when given
    pub integrations: Option<Vec<String>>,
}

pub fn update_rule(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateRuleParameters,
) -> Result<NotificationRule, RuleError> {
    if store.get_rule_by_number(parameters.rule_number).is_none() {
        return Err(RuleError::RuleNotFound(parameters.rule_number));
    }

    let days_before = parameters
        .days_before
        .map(validate_days_before)
        .transpose()?;
    let integration_ids = parameters
        .integrations
        .as_deref()
        .map(|names| resolve_integrations(store, names));

    let rule = store
        .rules
        .iter_mut()
        .find(|r| r.rule_number == parameters.rule_number)
        .ok_or(RuleError::RuleNotFound(parameters.rule_number))?;
    if let Some(days_before) = days_before {
        rule.days_before = days_before;
    }
    if let Some(ids) = integration_ids {
        rule.integration_ids = ids;
    }
    let updated = rule.clone();

    storage.save(store)?;

    Ok(updated)
}

pub fn delete_rule(
    store: &mut Store,
    storage: &impl Storage,
    rule_number: u64,
) -> Result<NotificationRule, RuleError> {
    let position = store
        .rules
        .iter()
        .position(|r| r.rule_number == rule_number)
        .ok_or(RuleError::RuleNotFound(rule_number))?;
    let removed = store.rules.remove(position);

    storage.save(store)?;

    Ok(removed)
}
