use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use crate::error::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    AiFundamentals,
    AiProductStrategy,
    PromptEngineering,
    TechnicalSkills,
    BusinessEconomics,
    GoToMarket,
    EthicsGovernance,
    Career,
    ToolsWorkflows,
    CaseStudies,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AiFundamentals => "ai-fundamentals",
            Category::AiProductStrategy => "ai-product-strategy",
            Category::PromptEngineering => "prompt-engineering",
            Category::TechnicalSkills => "technical-skills",
            Category::BusinessEconomics => "business-economics",
            Category::GoToMarket => "go-to-market",
            Category::EthicsGovernance => "ethics-governance",
            Category::Career => "career",
            Category::ToolsWorkflows => "tools-workflows",
            Category::CaseStudies => "case-studies",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Expert,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Article,
    Video,
    Course,
    Podcast,
    Book,
    Tool,
    Repository,
    Newsletter,
    Community,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Article => "article",
            Format::Video => "video",
            Format::Course => "course",
            Format::Podcast => "podcast",
            Format::Book => "book",
            Format::Tool => "tool",
            Format::Repository => "repository",
            Format::Newsletter => "newsletter",
            Format::Community => "community",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Conceptual,
    ToolSpecific,
    ModelDependent,
    Pricing,
    Career,
    TimeSensitive,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Conceptual => "conceptual",
            ContentType::ToolSpecific => "tool-specific",
            ContentType::ModelDependent => "model-dependent",
            ContentType::Pricing => "pricing",
            ContentType::Career => "career",
            ContentType::TimeSensitive => "time-sensitive",
        }
    }

    /// How many days a resource of this kind stays trustworthy before it is
    /// due for re-review.
    pub fn review_days(&self) -> i64 {
        match self {
            ContentType::TimeSensitive => 30,
            ContentType::ToolSpecific => 90,
            ContentType::ModelDependent => 120,
            ContentType::Conceptual | ContentType::Pricing | ContentType::Career => 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Free,
    Paid,
    Freemium,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Free => "free",
            AccessType::Paid => "paid",
            AccessType::Freemium => "freemium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceStatus {
    Active,
    Archived,
    Rejected,
    UnderReview,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "active",
            ResourceStatus::Archived => "archived",
            ResourceStatus::Rejected => "rejected",
            ResourceStatus::UnderReview => "under-review",
        }
    }
}

fn default_confidence() -> i32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestResource {
    pub title: String,
    pub url: String,
    pub category: Category,
    pub level: Level,
    pub format: Format,
    pub content_type: ContentType,
    pub summary: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub access_type: AccessType,
    pub access_notes: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: i32,
    pub author: Option<String>,
    pub source: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub last_verified: Option<NaiveDate>,
    pub next_review: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct IngestMetadata {
    pub assessment_date: NaiveDate,
    #[allow(dead_code)]
    pub schema_version: Option<String>,
    #[allow(dead_code)]
    pub notes: Option<String>,
}

/// The two accepted envelope shapes. Automation posts the flat form; the
/// curation pipeline posts the wrapped form with batch metadata and a
/// side-channel of rejected candidates, which the reconciler ignores.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IngestEnvelope {
    Flat {
        evaluated_at: NaiveDate,
        resources: Vec<IngestResource>,
    },
    Wrapped {
        metadata: IngestMetadata,
        resources: Vec<IngestResource>,
        #[serde(default)]
        #[allow(dead_code)]
        rejected: Vec<serde_json::Value>,
    },
}

/// Normalized form every envelope reduces to before reconciliation.
#[derive(Debug)]
pub struct IngestBatch {
    pub evaluated_at: NaiveDate,
    pub resources: Vec<IngestResource>,
}

impl IngestEnvelope {
    pub fn normalize(self) -> IngestBatch {
        match self {
            IngestEnvelope::Flat {
                evaluated_at,
                resources,
            } => IngestBatch {
                evaluated_at,
                resources,
            },
            IngestEnvelope::Wrapped {
                metadata,
                resources,
                ..
            } => IngestBatch {
                evaluated_at: metadata.assessment_date,
                resources,
            },
        }
    }
}

impl IngestBatch {
    /// Field-level checks serde cannot express: presence of at least one
    /// resource, non-empty text fields, URL well-formedness, and the
    /// confidence range.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.resources.is_empty() {
            errors.push(FieldError::new(
                "resources",
                "At least one resource is required",
            ));
        }

        for (i, resource) in self.resources.iter().enumerate() {
            if resource.title.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("resources[{}].title", i),
                    "Title is required",
                ));
            }
            if Url::parse(&resource.url).is_err() {
                errors.push(FieldError::new(
                    format!("resources[{}].url", i),
                    "Invalid URL",
                ));
            }
            if resource.summary.trim().is_empty() {
                errors.push(FieldError::new(
                    format!("resources[{}].summary", i),
                    "Summary is required",
                ));
            }
            if !(1..=5).contains(&resource.confidence) {
                errors.push(FieldError::new(
                    format!("resources[{}].confidence", i),
                    "Confidence must be between 1 and 5",
                ));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
