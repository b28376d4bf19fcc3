use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use careplan_core::repository::PatientRepository;
use careplan_core::{StoreError, StoreResult};
use careplan_shared::Patient;

use crate::database::{store_error, PgEntityStore};

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: Uuid,
    mrn: String,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            id: row.id,
            mrn: row.mrn,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PatientRepository for PgEntityStore {
    async fn get_patient_by_mrn(&self, mrn: &str) -> StoreResult<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(
            "SELECT id, mrn, first_name, last_name, created_at, updated_at FROM patients WHERE mrn = $1",
        )
        .bind(mrn)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Patient::from))
    }

    async fn create_patient(&self, patient: &Patient) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO patients (id, mrn, first_name, last_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(patient.id)
        .bind(&patient.mrn)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.created_at)
        .bind(patient.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn update_patient_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE patients SET first_name = $1, last_name = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("patient {}", id)));
        }
        Ok(())
    }
}
