use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::store::{ConflictKind, ResourceRecord, ResourceStore, StoreError};

use super::model::{ContentType, IngestResource};

/// Derive a URL-safe slug from a title: lowercase, keep word characters,
/// whitespace and hyphens, turn whitespace runs into single hyphens,
/// collapse hyphen runs, trim hyphens at the ends. Pure and idempotent.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            if !slug.is_empty() {
                pending_hyphen = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(c);
        }
        // Anything else is dropped without breaking the word.
    }

    slug
}

/// Next scheduled review: the batch evaluation date plus the volatility
/// window for this kind of content.
pub fn next_review_date(content_type: ContentType, evaluated_at: NaiveDate) -> NaiveDate {
    evaluated_at + Duration::days(content_type.review_days())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Inserted,
    Updated,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ItemResult {
    pub url: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemResult {
    fn ok(url: &str, status: ItemStatus, slug: String) -> Self {
        Self {
            url: url.to_string(),
            status,
            slug: Some(slug),
            error: None,
        }
    }

    fn error(url: &str, err: impl std::fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            status: ItemStatus::Error,
            slug: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub summary: BatchSummary,
    pub results: Vec<ItemResult>,
}

fn to_record(resource: &IngestResource, slug: String, evaluated_at: NaiveDate) -> ResourceRecord {
    let next_review = resource
        .next_review
        .unwrap_or_else(|| next_review_date(resource.content_type, evaluated_at));
    let last_verified = resource
        .last_verified
        .unwrap_or_else(|| Utc::now().date_naive());

    ResourceRecord {
        title: resource.title.clone(),
        slug,
        url: resource.url.clone(),
        category: resource.category.as_str().to_string(),
        level: resource.level.as_str().to_string(),
        format: resource.format.as_str().to_string(),
        content_type: resource.content_type.as_str().to_string(),
        access_type: resource.access_type.as_str().to_string(),
        access_notes: resource.access_notes.clone(),
        summary: resource.summary.clone(),
        status: resource.status.as_str().to_string(),
        confidence: resource.confidence,
        author: resource.author.clone(),
        source: resource.source.clone(),
        publication_date: resource.publication_date,
        date_evaluated: evaluated_at,
        last_verified,
        next_review,
    }
}

/// Reconcile one resource against the store: update in place when the URL
/// is already known, otherwise insert, retrying exactly once with a
/// timestamp-suffixed slug when the store reports a slug conflict.
async fn reconcile_one<S: ResourceStore>(
    store: &S,
    resource: &IngestResource,
    evaluated_at: NaiveDate,
) -> ItemResult {
    let slug = slugify(&resource.title);
    let record = to_record(resource, slug.clone(), evaluated_at);

    let existing = match store.find_id_by_url(&resource.url).await {
        Ok(existing) => existing,
        Err(e) => return ItemResult::error(&resource.url, e),
    };

    if let Some(id) = existing {
        return match store.update(id, &record).await {
            Ok(()) => ItemResult::ok(&resource.url, ItemStatus::Updated, slug),
            Err(e) => ItemResult::error(&resource.url, e),
        };
    }

    match store.insert(&record).await {
        Ok(()) => ItemResult::ok(&resource.url, ItemStatus::Inserted, slug),
        Err(StoreError::Conflict(ConflictKind::Slug)) => {
            let unique_slug = format!("{}-{}", slug, Utc::now().timestamp_millis());
            tracing::debug!(url = %resource.url, slug = %unique_slug, "slug taken, retrying");
            let retry = ResourceRecord {
                slug: unique_slug.clone(),
                ..record
            };
            match store.insert(&retry).await {
                Ok(()) => ItemResult::ok(&resource.url, ItemStatus::Inserted, unique_slug),
                Err(e) => ItemResult::error(&resource.url, e),
            }
        }
        Err(e) => ItemResult::error(&resource.url, e),
    }
}

/// Process a validated batch strictly in order. One item's failure never
/// aborts the rest; every input yields exactly one result entry.
pub async fn reconcile_batch<S: ResourceStore>(
    store: &S,
    evaluated_at: NaiveDate,
    resources: &[IngestResource],
) -> IngestReport {
    let mut results = Vec::with_capacity(resources.len());

    for resource in resources {
        results.push(reconcile_one(store, resource, evaluated_at).await);
    }

    let inserted = results
        .iter()
        .filter(|r| r.status == ItemStatus::Inserted)
        .count();
    let updated = results
        .iter()
        .filter(|r| r.status == ItemStatus::Updated)
        .count();
    let errors = results
        .iter()
        .filter(|r| r.status == ItemStatus::Error)
        .count();

    IngestReport {
        success: errors == 0,
        summary: BatchSummary {
            total: resources.len(),
            inserted,
            updated,
            errors,
        },
        results,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use uuid::Uuid;

    use super::*;
    use crate::routes::ingest::model::IngestEnvelope;

    /// In-memory stand-in for the resource table, with injectable faults.
    #[derive(Default)]
    struct MemStore {
        inner: Mutex<MemStoreInner>,
        fail_urls: HashSet<String>,
        taken_slugs: HashSet<String>,
    }

    #[derive(Default)]
    struct MemStoreInner {
        by_url: HashMap<String, Uuid>,
        records: HashMap<Uuid, ResourceRecord>,
        slugs: HashSet<String>,
    }

    impl MemStore {
        fn with_taken_slug(slug: &str) -> Self {
            Self {
                taken_slugs: HashSet::from([slug.to_string()]),
                ..Default::default()
            }
        }

        fn record_for(&self, url: &str) -> ResourceRecord {
            let inner = self.inner.lock().unwrap();
            let id = inner.by_url[url];
            inner.records[&id].clone()
        }

        fn len(&self) -> usize {
            self.inner.lock().unwrap().records.len()
        }
    }

    impl ResourceStore for MemStore {
        async fn find_id_by_url(&self, url: &str) -> Result<Option<Uuid>, StoreError> {
            Ok(self.inner.lock().unwrap().by_url.get(url).copied())
        }

        async fn insert(&self, record: &ResourceRecord) -> Result<(), StoreError> {
            if self.fail_urls.contains(&record.url) {
                return Err(StoreError::Backend("connection reset".into()));
            }
            let mut inner = self.inner.lock().unwrap();
            if inner.by_url.contains_key(&record.url) {
                return Err(StoreError::Conflict(ConflictKind::Url));
            }
            if inner.slugs.contains(&record.slug) || self.taken_slugs.contains(&record.slug) {
                return Err(StoreError::Conflict(ConflictKind::Slug));
            }
            let id = Uuid::new_v4();
            inner.by_url.insert(record.url.clone(), id);
            inner.slugs.insert(record.slug.clone());
            inner.records.insert(id, record.clone());
            Ok(())
        }

        async fn update(&self, id: Uuid, record: &ResourceRecord) -> Result<(), StoreError> {
            if self.fail_urls.contains(&record.url) {
                return Err(StoreError::Backend("connection reset".into()));
            }
            let mut inner = self.inner.lock().unwrap();
            inner.slugs.insert(record.slug.clone());
            inner.records.insert(id, record.clone());
            Ok(())
        }
    }

    fn resource(title: &str, url: &str) -> IngestResource {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "url": url,
            "category": "ai-fundamentals",
            "level": "beginner",
            "format": "article",
            "content_type": "time-sensitive",
            "summary": "s",
            "status": "active"
        }))
        .unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn slugify_strips_punctuation_and_collapses_separators() {
        assert_eq!(slugify("Top 10 AI Tools"), "top-10-ai-tools");
        assert_eq!(slugify("Hello,   World!"), "hello-world");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("--Dashes -- Galore--"), "dashes-galore");
        assert_eq!(slugify("snake_case kept"), "snake_case-kept");
        assert_eq!(slugify("Émigré café"), "migr-caf");
    }

    #[test]
    fn slugify_is_idempotent_and_stays_in_charset() {
        for title in ["Top 10 AI Tools", "What's New in GPT-5?", "a  b\tc"] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
            assert!(
                once.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-_".contains(c))
            );
        }
    }

    #[test]
    fn next_review_uses_the_evaluation_date() {
        assert_eq!(
            next_review_date(ContentType::TimeSensitive, date("2026-02-04")),
            date("2026-03-06")
        );
        assert_eq!(
            next_review_date(ContentType::Conceptual, date("2026-02-04")),
            date("2026-08-03")
        );
    }

    #[tokio::test]
    async fn new_url_is_inserted_with_derived_slug() {
        let store = MemStore::default();
        let report = reconcile_batch(
            &store,
            date("2026-02-04"),
            &[resource("Top 10 AI Tools", "https://x.com/a")],
        )
        .await;

        assert!(report.success);
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.inserted, 1);
        assert_eq!(report.summary.updated, 0);
        assert_eq!(report.summary.errors, 0);
        assert_eq!(report.results[0].status, ItemStatus::Inserted);
        assert_eq!(report.results[0].slug.as_deref(), Some("top-10-ai-tools"));

        let stored = store.record_for("https://x.com/a");
        assert_eq!(stored.next_review, date("2026-03-06"));
        assert_eq!(stored.date_evaluated, date("2026-02-04"));
    }

    #[tokio::test]
    async fn known_url_is_updated_never_duplicated() {
        let store = MemStore::default();
        let first = resource("Old Title", "https://x.com/a");
        reconcile_batch(&store, date("2026-02-04"), &[first]).await;

        let report = reconcile_batch(
            &store,
            date("2026-03-01"),
            &[resource("New Title", "https://x.com/a")],
        )
        .await;

        assert_eq!(report.results[0].status, ItemStatus::Updated);
        assert_eq!(report.results[0].slug.as_deref(), Some("new-title"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.record_for("https://x.com/a").title, "New Title");
    }

    #[tokio::test]
    async fn slug_conflict_triggers_one_disambiguated_retry() {
        let store = MemStore::with_taken_slug("top-10-ai-tools");
        let report = reconcile_batch(
            &store,
            date("2026-02-04"),
            &[resource("Top 10 AI Tools", "https://x.com/a")],
        )
        .await;

        assert!(report.success);
        assert_eq!(report.results[0].status, ItemStatus::Inserted);
        let slug = report.results[0].slug.as_deref().unwrap();
        assert!(slug.starts_with("top-10-ai-tools-"));
        assert!(slug.len() > "top-10-ai-tools-".len());
    }

    #[tokio::test]
    async fn non_slug_conflict_is_not_retried() {
        let store = MemStore::default();
        reconcile_batch(
            &store,
            date("2026-02-04"),
            &[resource("A", "https://x.com/a")],
        )
        .await;

        // Simulate a lost race: lookup misses but the insert hits the url
        // constraint.
        let record = to_record(
            &resource("B", "https://x.com/b"),
            "a".to_string(),
            date("2026-02-04"),
        );
        let err = store.insert(&record).await;
        assert!(matches!(err, Err(StoreError::Conflict(ConflictKind::Slug))));

        let record = to_record(
            &resource("C", "https://x.com/a"),
            "c".to_string(),
            date("2026-02-04"),
        );
        let err = store.insert(&record).await;
        assert!(matches!(err, Err(StoreError::Conflict(ConflictKind::Url))));
    }

    #[tokio::test]
    async fn one_failing_item_does_not_abort_the_batch() {
        let mut store = MemStore::default();
        store.fail_urls.insert("https://x.com/b".to_string());

        let report = reconcile_batch(
            &store,
            date("2026-02-04"),
            &[
                resource("A", "https://x.com/a"),
                resource("B", "https://x.com/b"),
                resource("C", "https://x.com/c"),
            ],
        )
        .await;

        assert!(!report.success);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.inserted, 2);
        assert_eq!(report.summary.errors, 1);

        // Order-preserving, one entry per input.
        let urls: Vec<_> = report.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x.com/a", "https://x.com/b", "https://x.com/c"]
        );
        assert_eq!(report.results[1].status, ItemStatus::Error);
        assert_eq!(report.results[1].error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn supplied_next_review_wins_over_the_table() {
        let store = MemStore::default();
        let mut r = resource("A", "https://x.com/a");
        r.next_review = Some(date("2027-01-01"));
        reconcile_batch(&store, date("2026-02-04"), &[r]).await;

        assert_eq!(
            store.record_for("https://x.com/a").next_review,
            date("2027-01-01")
        );
    }

    #[tokio::test]
    async fn report_serializes_per_contract() {
        let store = MemStore::default();
        let envelope: IngestEnvelope = serde_json::from_value(serde_json::json!({
            "evaluated_at": "2026-02-04",
            "resources": [{
                "title": "Top 10 AI Tools",
                "url": "https://x.com/a",
                "category": "ai-fundamentals",
                "level": "beginner",
                "format": "article",
                "content_type": "time-sensitive",
                "summary": "s",
                "status": "active"
            }],
        }))
        .unwrap();
        let batch = envelope.normalize();
        let report = reconcile_batch(&store, batch.evaluated_at, &batch.resources).await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "summary": {"total": 1, "inserted": 1, "updated": 0, "errors": 0},
                "results": [{
                    "url": "https://x.com/a",
                    "status": "inserted",
                    "slug": "top-10-ai-tools"
                }],
            })
        );
    }
}
