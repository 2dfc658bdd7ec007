use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// An external service the app can talk to
#[derive(Serialize, Deserialize, Clone)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub provider: Provider,
    pub created_at: Timestamp,
}

/// Provider specific configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum Provider {
    /// Slack incoming webhook
    Slack { webhook_url: String },
    /// X (Twitter). Credentials are read from env vars starting with `env_prefix`
    X { env_prefix: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrationConfigError {
    #[error("Slack integrations require a webhook URL")]
    MissingWebhookUrl,

    #[error("X integrations require an env prefix")]
    MissingEnvPrefix,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Slack { .. } => "slack",
            Provider::X { .. } => "x",
        }
    }

    pub fn validate(&self) -> Result<(), IntegrationConfigError> {
        match self {
            Provider::Slack { webhook_url } if webhook_url.trim().is_empty() => {
                Err(IntegrationConfigError::MissingWebhookUrl)
            }
            Provider::X { env_prefix } if env_prefix.trim().is_empty() => {
                Err(IntegrationConfigError::MissingEnvPrefix)
            }
            _ => Ok(()),
        }
    }
}

impl Integration {
    /// Webhook URL to notify, only for active Slack integrations
    pub fn notification_destination(&self) -> Option<&str> {
        match &self.provider {
            Provider::Slack { webhook_url } if self.is_active => Some(webhook_url),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration(provider: Provider, is_active: bool) -> Integration {
        Integration {
            id: Uuid::new_v4(),
            name: "team".to_string(),
            is_active,
            provider,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_validate_requires_provider_fields() {
        let slack = Provider::Slack {
            webhook_url: "  ".to_string(),
        };
        assert_eq!(slack.validate(), Err(IntegrationConfigError::MissingWebhookUrl));

        let x = Provider::X {
            env_prefix: String::new(),
        };
        assert_eq!(x.validate(), Err(IntegrationConfigError::MissingEnvPrefix));

        let ok = Provider::X {
            env_prefix: "X_MAIN".to_string(),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_only_active_slack_is_a_destination() {
        let url = "https://hooks.slack.com/services/T/B/C".to_string();
        let slack = integration(Provider::Slack { webhook_url: url.clone() }, true);
        assert_eq!(slack.notification_destination(), Some(url.as_str()));

        let inactive = integration(Provider::Slack { webhook_url: url }, false);
        assert_eq!(inactive.notification_destination(), None);

        let x = integration(
            Provider::X {
                env_prefix: "X_MAIN".to_string(),
            },
            true,
        );
        assert_eq!(x.notification_destination(), None);
    }

    #[test]
    fn test_provider_serializes_as_tagged_variant() {
        let provider = Provider::Slack {
            webhook_url: "https://example.com/hook".to_string(),
        };
        let value = serde_json::to_value(&provider).unwrap();
        assert_eq!(value["provider"], "slack");
        assert_eq!(value["webhook_url"], "https://example.com/hook");
    }
}
