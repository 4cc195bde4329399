use chrono::NaiveDate;
use uuid::Uuid;

mod postgres;

pub use postgres::PgResourceStore;

/// Which unique constraint an insert collided with. The Postgres layer maps
/// constraint names onto this so callers never sniff error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Slug,
    Url,
    Other,
}

#[derive(Debug)]
pub enum StoreError {
    Conflict(ConflictKind),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(ConflictKind::Slug) => write!(f, "slug already exists"),
            StoreError::Conflict(ConflictKind::Url) => write!(f, "url already exists"),
            StoreError::Conflict(ConflictKind::Other) => write!(f, "unique constraint violated"),
            StoreError::Backend(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Full field set written on every insert or update of a library resource.
/// Enum-valued fields arrive as their wire strings; the store treats them
/// as opaque text.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub title: String,
    pub slug: String,
    pub url: String,
    pub category: String,
    pub level: String,
    pub format: String,
    pub content_type: String,
    pub access_type: String,
    pub access_notes: Option<String>,
    pub summary: String,
    pub status: String,
    pub confidence: i32,
    pub author: Option<String>,
    pub source: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub date_evaluated: NaiveDate,
    pub last_verified: NaiveDate,
    pub next_review: NaiveDate,
}

/// Persistent resource catalog keyed by canonical URL, with a secondary
/// unique slug. Uniqueness is enforced by the store itself; concurrent
/// writers are expected to react to `StoreError::Conflict`.
#[allow(async_fn_in_trait)]
pub trait ResourceStore {
    async fn find_id_by_url(&self, url: &str) -> Result<Option<Uuid>, StoreError>;
    async fn insert(&self, record: &ResourceRecord) -> Result<(), StoreError>;
    async fn update(&self, id: Uuid, record: &ResourceRecord) -> Result<(), StoreError>;
}
