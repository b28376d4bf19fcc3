use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use careplan_core::repository::{OrderFilter, OrderRepository};
use careplan_core::{StoreError, StoreResult};
use careplan_shared::{Order, OrderDetails, Patient, Provider};

use crate::database::{store_error, PgEntityStore};

const ORDER_COLUMNS: &str = "o.id, o.patient_id, o.provider_id, o.primary_diagnosis, o.additional_diagnoses, \
     o.medication_name, o.medication_history, o.patient_records, o.care_plan, o.care_plan_generated_at, o.created_at";

const ORDER_DETAILS_SELECT: &str = r#"
    SELECT o.id, o.patient_id, o.provider_id, o.primary_diagnosis, o.additional_diagnoses,
           o.medication_name, o.medication_history, o.patient_records, o.care_plan,
           o.care_plan_generated_at, o.created_at,
           p.mrn, p.first_name, p.last_name,
           p.created_at AS patient_created_at, p.updated_at AS patient_updated_at,
           pr.npi, pr.name AS provider_name, pr.created_at AS provider_created_at
    FROM orders o
    JOIN patients p ON p.id = o.patient_id
    JOIN providers pr ON pr.id = o.provider_id
"#;

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    patient_id: Uuid,
    provider_id: Uuid,
    primary_diagnosis: String,
    additional_diagnoses: Vec<String>,
    medication_name: String,
    medication_history: Vec<String>,
    patient_records: String,
    care_plan: Option<String>,
    care_plan_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            patient_id: row.patient_id,
            provider_id: row.provider_id,
            primary_diagnosis: row.primary_diagnosis,
            additional_diagnoses: row.additional_diagnoses,
            medication_name: row.medication_name,
            medication_history: row.medication_history,
            patient_records: row.patient_records,
            care_plan: row.care_plan,
            care_plan_generated_at: row.care_plan_generated_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderDetailsRow {
    #[sqlx(flatten)]
    order: OrderRow,
    mrn: String,
    first_name: String,
    last_name: String,
    patient_created_at: DateTime<Utc>,
    patient_updated_at: DateTime<Utc>,
    npi: String,
    provider_name: String,
    provider_created_at: DateTime<Utc>,
}

impl From<OrderDetailsRow> for OrderDetails {
    fn from(row: OrderDetailsRow) -> Self {
        let patient = Patient {
            id: row.order.patient_id,
            mrn: row.mrn,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.patient_created_at,
            updated_at: row.patient_updated_at,
        };
        let provider = Provider {
            id: row.order.provider_id,
            npi: row.npi,
            name: row.provider_name,
            created_at: row.provider_created_at,
        };
        OrderDetails {
            order: row.order.into(),
            patient,
            provider,
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(from) = filter.created_from {
        qb.push(" AND o.created_at >= ").push_bind(from);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND o.created_at < ").push_bind(before);
    }
    if let Some(npi) = &filter.provider_npi {
        qb.push(" AND pr.npi = ").push_bind(npi.clone());
    }
    if let Some(code) = &filter.diagnosis {
        qb.push(" AND (o.primary_diagnosis = ")
            .push_bind(code.clone())
            .push(" OR ")
            .push_bind(code.clone())
            .push(" = ANY(o.additional_diagnoses))");
    }
    if filter.care_plan_only {
        qb.push(" AND o.care_plan IS NOT NULL AND o.care_plan <> ''");
    }
}

#[async_trait]
impl OrderRepository for PgEntityStore {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, patient_id, provider_id, primary_diagnosis, additional_diagnoses,
                                medication_name, medication_history, patient_records, care_plan,
                                care_plan_generated_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(order.patient_id)
        .bind(order.provider_id)
        .bind(&order.primary_diagnosis)
        .bind(&order.additional_diagnoses)
        .bind(&order.medication_name)
        .bind(&order.medication_history)
        .bind(&order.patient_records)
        .bind(&order.care_plan)
        .bind(order.care_plan_generated_at)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>> {
        let mut qb = QueryBuilder::<Postgres>::new(ORDER_DETAILS_SELECT);
        qb.push(" WHERE o.id = ").push_bind(id);

        let row = qb
            .build_query_as::<OrderDetailsRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(row.map(OrderDetails::from))
    }

    async fn find_recent_orders(
        &self,
        patient_id: Uuid,
        medication_name: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders o WHERE o.patient_id = $1 AND o.medication_name = $2 AND o.created_at >= $3 ORDER BY o.created_at DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(patient_id)
            .bind(medication_name)
            .bind(created_after)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn attach_care_plan(
        &self,
        id: Uuid,
        care_plan: &str,
        generated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET care_plan = $1, care_plan_generated_at = $2 WHERE id = $3 AND care_plan IS NULL",
        )
        .bind(care_plan)
        .bind(generated_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        if exists {
            Err(StoreError::Conflict(format!("care plan already recorded for order {}", id)))
        } else {
            Err(StoreError::NotFound(format!("order {}", id)))
        }
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_orders(&self, skip: i64, limit: i64) -> StoreResult<Vec<OrderDetails>> {
        let mut qb = QueryBuilder::<Postgres>::new(ORDER_DETAILS_SELECT);
        qb.push(" ORDER BY o.created_at DESC OFFSET ")
            .push_bind(skip.max(0))
            .push(" LIMIT ")
            .push_bind(limit.max(0));

        let rows = qb
            .build_query_as::<OrderDetailsRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().map(OrderDetails::from).collect())
    }

    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let mut qb = QueryBuilder::<Postgres>::new(ORDER_DETAILS_SELECT);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY o.created_at DESC");

        let rows = qb
            .build_query_as::<OrderDetailsRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        tracing::info!(count = rows.len(), filtered = !filter.is_empty(), "Export query returned orders");
        Ok(rows.into_iter().map(OrderDetails::from).collect())
    }
}
