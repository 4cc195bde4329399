use serde::Serialize;
use url::Url;

use crate::config::Config;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    Status(u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "email request failed: {}", e),
            NotifyError::Status(code) => write!(f, "email provider returned status {}", code),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Http(e)
    }
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

/// Host belongs to the RFC 2606 reserved test domain.
fn is_test_domain(url_or_email: &str) -> bool {
    let host = if let Some((_, domain)) = url_or_email.split_once('@') {
        domain.to_string()
    } else {
        match Url::parse(url_or_email).ok().and_then(|u| {
            u.host_str().map(str::to_string)
        }) {
            Some(host) => host,
            None => return false,
        }
    };

    host == "example.com" || host.ends_with(".example.com")
}

/// Sends the submission confirmation email through the provider's HTTP API.
/// Disabled (every send is a no-op) when no API key is configured.
pub struct Notifier {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.resend_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    pub async fn send_confirmation(&self, email: &str, url: &str) -> Result<(), NotifyError> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("notifier disabled, skipping confirmation email");
            return Ok(());
        };

        if is_test_domain(email) || is_test_domain(url) {
            return Ok(());
        }

        let html = format!(
            "<p>Thank you for submitting a resource to The Evolving PM!</p>\
             <p><strong>URL submitted:</strong> <a href=\"{url}\">{url}</a></p>\
             <p>We review every submission and will add it to the library if it's \
             a good fit for Product Managers learning about AI.</p>\
             <p>You don't need to do anything else - we'll take it from here.</p>\
             <br><p>Best,<br>The Evolving PM Team</p>"
        );

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&EmailPayload {
                from: &self.from,
                to: [email],
                subject: "We received your resource submission",
                html,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        tracing::info!(to = %email, "confirmation email sent");
        Ok(())
    }
}
