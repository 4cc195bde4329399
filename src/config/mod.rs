use std::env;
use std::time::Duration;

const DEFAULT_PUBLIC_ORIGIN: &str = "https://theevolvingpm.com";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub ingest_api_key: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub public_origin: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            ingest_api_key: env::var("INGEST_API_KEY").ok().filter(|k| !k.is_empty()),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            public_origin: env::var("PUBLIC_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_PUBLIC_ORIGIN.into()),
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| {
                "The Evolving PM <noreply@theevolvingpm.com>".into()
            }),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Origins allowed to call the API cross-origin: the public site, its
    /// "www" variant, and the local development ports 4000-4010.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.public_origin.clone()];

        if let Some(host) = self
            .public_origin
            .strip_prefix("https://")
            .filter(|h| !h.starts_with("www."))
        {
            origins.push(format!("https://www.{}", host));
        }

        for port in 4000..=4010 {
            origins.push(format!("http://localhost:{}", port));
        }

        origins
    }
}
