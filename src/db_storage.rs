use crate::errors::StoreResult;
use crate::gateway::{DocumentKind, DocumentStore, ProductCategory};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

/// PostgreSQL-backed document store.
///
/// Documents live as JSONB in `customer_360.documents`, keyed by
/// `(scope, collection, doc_key)`. Product rows live in
/// `customer_360.product_documents`; the owning customer is the
/// `customer_id` attribute of each document.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn point_lookup(&self, kind: DocumentKind, key: &str) -> StoreResult<Option<Value>> {
        let content = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT content
            FROM customer_360.documents
            WHERE scope = $1 AND collection = $2 AND doc_key = $3
            "#,
        )
        .bind(kind.scope())
        .bind(kind.collection())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::debug!("Point lookup {} in {} failed: {:?}", key, kind, e);
            e
        })?;

        Ok(content)
    }

    async fn filter_query(
        &self,
        category: ProductCategory,
        customer_id: &str,
    ) -> StoreResult<Vec<Value>> {
        // Rows are wrapped under the category name, matching `SELECT *` over a collection
        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT jsonb_build_object($1::text, content)
            FROM customer_360.product_documents
            WHERE category = $1 AND content->>'customer_id' = $2
            ORDER BY created_at ASC, doc_key ASC
            "#,
        )
        .bind(category.as_str())
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_profiles(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM customer_360.documents WHERE scope = $1 AND collection = $2",
        )
        .bind(DocumentKind::Profile.scope())
        .bind(DocumentKind::Profile.collection())
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
