use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ConflictKind, ResourceRecord, ResourceStore, StoreError};

/// `resources` table access. Unique indexes on `url` and `slug` are the
/// source of truth for upsert races; violations come back as
/// `StoreError::Conflict` with the offending constraint classified.
pub struct PgResourceStore {
    pool: PgPool,
}

impl PgResourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let kind = match db.constraint() {
                Some(name) if name.contains("slug") => ConflictKind::Slug,
                Some(name) if name.contains("url") => ConflictKind::Url,
                _ => ConflictKind::Other,
            };
            return StoreError::Conflict(kind);
        }
        return StoreError::Backend(db.message().to_string());
    }
    StoreError::Backend(err.to_string())
}

impl ResourceStore for PgResourceStore {
    async fn find_id_by_url(&self, url: &str) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT id FROM resources WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_store_error)?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn insert(&self, record: &ResourceRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resources (
                id, title, slug, url, category, level, format, content_type,
                access_type, access_notes, summary, status, confidence,
                author, source, publication_date, date_evaluated,
                last_verified, next_review
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.title)
        .bind(&record.slug)
        .bind(&record.url)
        .bind(&record.category)
        .bind(&record.level)
        .bind(&record.format)
        .bind(&record.content_type)
        .bind(&record.access_type)
        .bind(&record.access_notes)
        .bind(&record.summary)
        .bind(&record.status)
        .bind(record.confidence)
        .bind(&record.author)
        .bind(&record.source)
        .bind(record.publication_date)
        .bind(record.date_evaluated)
        .bind(record.last_verified)
        .bind(record.next_review)
        .execute(&self.pool)
        .await
        .map_err(map_store_error)?;

        Ok(())
    }

    async fn update(&self, id: Uuid, record: &ResourceRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE resources SET
                title = $2, slug = $3, url = $4, category = $5, level = $6,
                format = $7, content_type = $8, access_type = $9,
                access_notes = $10, summary = $11, status = $12,
                confidence = $13, author = $14, source = $15,
                publication_date = $16, date_evaluated = $17,
                last_verified = $18, next_review = $19, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&record.title)
        .bind(&record.slug)
        .bind(&record.url)
        .bind(&record.category)
        .bind(&record.level)
        .bind(&record.format)
        .bind(&record.content_type)
        .bind(&record.access_type)
        .bind(&record.access_notes)
        .bind(&record.summary)
        .bind(&record.status)
        .bind(record.confidence)
        .bind(&record.author)
        .bind(&record.source)
        .bind(record.publication_date)
        .bind(record.date_evaluated)
        .bind(record.last_verified)
        .bind(record.next_review)
        .execute(&self.pool)
        .await
        .map_err(map_store_error)?;

        Ok(())
    }
}
