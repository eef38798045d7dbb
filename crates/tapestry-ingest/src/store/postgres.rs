//! Postgres implementation of the persistence gateway

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use tapestry_common::{NormalizedFile, NormalizedItem, RefIds};

use super::{ItemStore, StoreError};

/// Item storage over a shared connection pool.
///
/// Each `save_item` call borrows one connection for the duration of its
/// transaction; dropping the transaction on any error path rolls the
/// whole item+files group back.
#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lookup_id(
        &self,
        query: &str,
        table: &'static str,
        name: &str,
    ) -> Result<i32, StoreError> {
        sqlx::query_scalar::<_, i32>(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::reference_not_found(table, name))
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn resolve_references(
        &self,
        source: &str,
        media_type: &str,
        license: &str,
    ) -> Result<RefIds, StoreError> {
        let source_id = self
            .lookup_id(
                "SELECT source_id FROM sources WHERE name = $1",
                "sources",
                source,
            )
            .await?;
        let type_id = self
            .lookup_id(
                "SELECT type_id FROM media_types WHERE name = $1",
                "media_types",
                media_type,
            )
            .await?;
        let license_id = self
            .lookup_id(
                "SELECT license_id FROM licenses WHERE name = $1",
                "licenses",
                license,
            )
            .await?;

        debug!(source, source_id, type_id, license_id, "resolved reference ids");

        Ok(RefIds {
            source_id,
            type_id,
            license_id,
        })
    }

    async fn save_item(
        &self,
        refs: &RefIds,
        item: &NormalizedItem,
        files: &[NormalizedFile],
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let item_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO items (
                source_id, source_item_id, title, description, creator_override,
                publication_date, type_id, license_id, source_url, extra_info
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (source_id, source_item_id)
            DO UPDATE SET title = EXCLUDED.title,
                          description = EXCLUDED.description,
                          creator_override = EXCLUDED.creator_override,
                          publication_date = EXCLUDED.publication_date,
                          type_id = EXCLUDED.type_id,
                          license_id = EXCLUDED.license_id,
                          source_url = EXCLUDED.source_url,
                          extra_info = EXCLUDED.extra_info,
                          updated_at = NOW()
            RETURNING item_id
            "#,
        )
        .bind(refs.source_id)
        .bind(&item.source_item_id)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.creator_override)
        .bind(item.publication_date)
        .bind(refs.type_id)
        .bind(refs.license_id)
        .bind(&item.source_url)
        .bind(&item.extra_info)
        .fetch_one(&mut *tx)
        .await?;

        // Files are insert-only; a file already attached to the item is
        // left untouched.
        for file in files {
            sqlx::query(
                r#"
                INSERT INTO files (item_id, file_url, format, size, notes)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(item_id)
            .bind(&file.file_url)
            .bind(&file.format)
            .bind(file.size)
            .bind(&file.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            item_id,
            source_item_id = %item.source_item_id,
            files = files.len(),
            "saved item"
        );

        Ok(item_id)
    }
}
