use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use careplan_core::repository::ProviderRepository;
use careplan_core::{StoreError, StoreResult};
use careplan_shared::Provider;

use crate::database::{store_error, PgEntityStore};

#[derive(sqlx::FromRow)]
struct ProviderRow {
    id: Uuid,
    npi: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<ProviderRow> for Provider {
    fn from(row: ProviderRow) -> Self {
        Provider {
            id: row.id,
            npi: row.npi,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ProviderRepository for PgEntityStore {
    async fn get_provider_by_npi(&self, npi: &str) -> StoreResult<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT id, npi, name, created_at FROM providers WHERE npi = $1",
        )
        .bind(npi)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Provider::from))
    }

    async fn get_provider_by_name_ci(&self, name: &str) -> StoreResult<Option<Provider>> {
        let row = sqlx::query_as::<_, ProviderRow>(
            r#"
            SELECT id, npi, name, created_at FROM providers
            WHERE LOWER(name) = LOWER($1)
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Provider::from))
    }

    async fn create_provider(&self, provider: &Provider) -> StoreResult<()> {
        sqlx::query("INSERT INTO providers (id, npi, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(provider.id)
            .bind(&provider.npi)
            .bind(&provider.name)
            .bind(provider.created_at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn update_provider_name(&self, id: Uuid, name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE providers SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("provider {}", id)));
        }
        Ok(())
    }
}
