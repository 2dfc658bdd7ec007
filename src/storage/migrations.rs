use serde_json::Value;

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Value;

/// Index `n` upgrades schema version `n + 1` to `n + 2`
const MIGRATIONS: &[MigrationFn] = &[migrate_v1_to_v2];

/// Files written before versioning existed carry no `version` field and are v1.
/// `None` means the field is there but is not a number.
pub fn detect_version(data: &Value) -> Option<u32> {
    match data.get("version") {
        Some(v) => v.as_u64().and_then(|n| u32::try_from(n).ok()),
        None => Some(1),
    }
}

pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    for version in from_version..to_version {
        let migrate = version
            .checked_sub(1)
            .and_then(|idx| MIGRATIONS.get(idx as usize))
            .ok_or(StorageError::UnsupportedVersion(version))?;
        data = migrate(data);
        tracing::debug!(from = version, to = version + 1, "migrated store schema");
    }

    Ok(data)
}

/// v2 renamed template entries' `relative_days_before` to `relative_days`
fn migrate_v1_to_v2(mut data: Value) -> Value {
    let templates = data
        .get_mut("templates")
        .and_then(|t| t.as_array_mut())
        .into_iter()
        .flatten();

    for template in templates {
        let entries = template
            .get_mut("tasks")
            .and_then(|t| t.as_array_mut())
            .into_iter()
            .flatten();
        for entry in entries.filter_map(Value::as_object_mut) {
            if let Some(days) = entry.remove("relative_days_before") {
                entry.insert("relative_days".to_string(), days);
            }
        }
    }

    if let Some(obj) = data.as_object_mut() {
        obj.insert("version".to_string(), Value::from(2));
    }
    data
}
