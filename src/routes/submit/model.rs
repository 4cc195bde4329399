use serde::Deserialize;
use sqlx::PgPool;
use url::Url;
use uuid::Uuid;

use crate::error::FieldError;

const MAX_CONTEXT_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SubmissionRequest {
    // Optional at parse time so a missing field surfaces as a field error
    // instead of a parse failure.
    #[serde(default)]
    pub url: Option<String>,
    pub email: Option<String>,
    pub context: Option<String>,
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.contains(char::is_whitespace)
}

impl SubmissionRequest {
    /// The submitted URL, once `validate` has passed.
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    /// An empty email string is treated the same as omitting the field.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.url.as_deref().is_none_or(|u| Url::parse(u).is_err()) {
            errors.push(FieldError::new("url", "Please enter a valid URL"));
        }
        if let Some(email) = self.email() {
            if !looks_like_email(email) {
                errors.push(FieldError::new("email", "Please enter a valid email"));
            }
        }
        if let Some(context) = &self.context {
            if context.chars().count() > MAX_CONTEXT_CHARS {
                errors.push(FieldError::new(
                    "context",
                    "Context must be 1000 characters or less",
                ));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub struct Submission;

impl Submission {
    pub async fn create(
        pool: &PgPool,
        url: &str,
        email: Option<&str>,
        context: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO submissions (id, url, submitted_by_email, context, status)
            VALUES ($1, $2, $3, $4, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(url)
        .bind(email)
        .bind(context)
        .execute(pool)
        .await?;

        Ok(())
    }
}
