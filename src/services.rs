use std::fmt;

pub mod events;
pub mod integrations;
pub mod notifications;
pub mod rules;
pub mod tasks;
pub mod templates;

/// Longest name accepted for events, tasks and template entries
pub const MAX_NAME_LEN: usize = 200;

/// Validation messages keyed by the input field they refer to
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, String)> {
        self.0.iter()
    }

    /// `Err(self)` when anything was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Trims `raw` and checks it is a usable name
pub(crate) fn validate_name(raw: &str, field: &'static str, errors: &mut FieldErrors) -> String {
    let name = raw.trim();
    if name.is_empty() {
        errors.add(field, "is required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add(field, format!("must be at most {} characters", MAX_NAME_LEN));
    }
    name.to_string()
}

/// Blank optional text becomes `None`
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
