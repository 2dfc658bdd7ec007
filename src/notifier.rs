use std::time::Duration;

use colored::*;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, warn};

/// Something that can deliver a text message to a destination address.
/// Returns whether the message was accepted; never fails the caller.
pub trait Notifier {
    fn send(&self, message: &str, destination: &str) -> bool;
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Posts messages to Slack incoming webhooks
pub struct SlackWebhook {
    client: Client,
}

impl SlackWebhook {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("semprep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Notifier for SlackWebhook {
    fn send(&self, message: &str, destination: &str) -> bool {
        let target = redact(destination);
        let response = self
            .client
            .post(destination)
            .json(&SlackPayload { text: message })
            .send();

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!(destination = %target, "slack webhook accepted message");
                true
            }
            Ok(resp) => {
                warn!(destination = %target, status = %resp.status(), "slack webhook rejected message");
                false
            }
            Err(e) => {
                warn!(destination = %target, error = %e, "slack webhook request failed");
                false
            }
        }
    }
}

/// Prints messages instead of sending them
pub struct DryRun;

impl Notifier for DryRun {
    fn send(&self, message: &str, destination: &str) -> bool {
        println!("{}", "--- DRY RUN ---".yellow());
        println!("{} {}", "to:".dimmed(), destination);
        println!("{}", message);
        true
    }
}

/// Webhook URLs embed their secret in the path, so only the host is logged
pub fn redact(destination: &str) -> String {
    match reqwest::Url::parse(destination) {
        Ok(url) => format!("{}://{}/…", url.scheme(), url.host_str().unwrap_or("?")),
        Err(_) => "<invalid url>".to_string(),
    }
}
