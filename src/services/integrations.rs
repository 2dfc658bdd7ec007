use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        integration::{Integration, IntegrationConfigError, Provider},
        store::Store,
    },
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Integration '{0}' not found")]
    IntegrationNotFound(String),

    #[error("Integration '{0}' already exists")]
    IntegrationAlreadyExists(String),

    #[error("Integration name is required")]
    MissingName,

    #[error("Invalid integration: {0}")]
    InvalidConfig(#[from] IntegrationConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddIntegrationParameters {
    pub name: String,
    pub provider: Provider,
}

pub fn add_integration(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AddIntegrationParameters,
) -> Result<Integration, IntegrationError> {
    let name = parameters.name.trim().to_string();
    if name.is_empty() {
        return Err(IntegrationError::MissingName);
    }
    parameters.provider.validate()?;
    if store.find_integration(&name).is_some() {
        return Err(IntegrationError::IntegrationAlreadyExists(name));
    }

    let integration = Integration {
        id: Uuid::new_v4(),
        name,
        is_active: true,
        provider: parameters.provider,
        created_at: jiff::Timestamp::now(),
    };
    store.integrations.push(integration.clone());

    storage.save(store)?;

    Ok(integration)
}

pub fn set_integration_active(
    store: &mut Store,
    storage: &impl Storage,
    name: &str,
    is_active: bool,
) -> Result<Integration, IntegrationError> {
    let integration = store
        .integrations
        .iter_mut()
        .find(|i| i.name.to_lowercase() == name.to_lowercase())
        .ok_or_else(|| IntegrationError::IntegrationNotFound(name.to_string()))?;
    integration.is_active = is_active;
    let updated = integration.clone();

    storage.save(store)?;

    Ok(updated)
}

/// Deletes the integration and detaches it from every notification rule
pub fn delete_integration(
    store: &mut Store,
    storage: &impl Storage,
    name: &str,
) -> Result<Integration, IntegrationError> {
    let position = store
        .integrations
        .iter()
        .position(|i| i.name.to_lowercase() == name.to_lowercase())
        .ok_or_else(|| IntegrationError::IntegrationNotFound(name.to_string()))?;
    let removed = store.integrations.remove(position);

    for rule in &mut store.rules {
        rule.integration_ids.retain(|id| *id != removed.id);
    }

    storage.save(store)?;

    Ok(removed)
}
