use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use careplan_core::repository::{OrderFilter, OrderRepository, PatientRepository, ProviderRepository};
use careplan_core::{StoreError, StoreResult};
use careplan_shared::{Order, OrderDetails, Patient, Provider};

#[derive(Default)]
struct Tables {
    patients: Vec<Patient>,
    providers: Vec<Provider>,
    orders: Vec<Order>,
}

impl Tables {
    fn details(&self, order: &Order) -> StoreResult<OrderDetails> {
        let patient = self
            .patients
            .iter()
            .find(|p| p.id == order.patient_id)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("order {} has no patient", order.id)))?;
        let provider = self
            .providers
            .iter()
            .find(|p| p.id == order.provider_id)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("order {} has no provider", order.id)))?;
        Ok(OrderDetails {
            order: order.clone(),
            patient,
            provider,
        })
    }

    fn newest_first<'a>(&'a self, keep: impl Fn(&Order) -> bool) -> Vec<&'a Order> {
        let mut orders: Vec<&Order> = self.orders.iter().filter(|&o| keep(o)).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

/// In-memory store for development and testing.
/// Enforces the same MRN and NPI uniqueness as the Postgres schema.
#[derive(Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub fn order_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.orders.len())
    }

    pub fn patient_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.patients.len())
    }

    pub fn provider_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.providers.len())
    }
}

#[async_trait]
impl PatientRepository for InMemoryEntityStore {
    async fn get_patient_by_mrn(&self, mrn: &str) -> StoreResult<Option<Patient>> {
        Ok(self.read()?.patients.iter().find(|p| p.mrn == mrn).cloned())
    }

    async fn create_patient(&self, patient: &Patient) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.patients.iter().any(|p| p.mrn == patient.mrn) {
            return Err(StoreError::Conflict(format!("MRN {} already exists", patient.mrn)));
        }
        tables.patients.push(patient.clone());
        Ok(())
    }

    async fn update_patient_name(
        &self,
        id: Uuid,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<()> {
        let mut tables = self.write()?;
        let patient = tables
            .patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("patient {}", id)))?;
        patient.first_name = first_name.to_string();
        patient.last_name = last_name.to_string();
        patient.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ProviderRepository for InMemoryEntityStore {
    async fn get_provider_by_npi(&self, npi: &str) -> StoreResult<Option<Provider>> {
        Ok(self.read()?.providers.iter().find(|p| p.npi == npi).cloned())
    }

    async fn get_provider_by_name_ci(&self, name: &str) -> StoreResult<Option<Provider>> {
        let wanted = name.to_lowercase();
        Ok(self
            .read()?
            .providers
            .iter()
            .filter(|p| p.name.to_lowercase() == wanted)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn create_provider(&self, provider: &Provider) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.providers.iter().any(|p| p.npi == provider.npi) {
            return Err(StoreError::Conflict(format!("NPI {} already exists", provider.npi)));
        }
        tables.providers.push(provider.clone());
        Ok(())
    }

    async fn update_provider_name(&self, id: Uuid, name: &str) -> StoreResult<()> {
        let mut tables = self.write()?;
        let provider = tables
            .providers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("provider {}", id)))?;
        provider.name = name.to_string();
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryEntityStore {
    async fn create_order(&self, order: &Order) -> StoreResult<Uuid> {
        let mut tables = self.write()?;
        if !tables.patients.iter().any(|p| p.id == order.patient_id) {
            return Err(StoreError::NotFound(format!("patient {}", order.patient_id)));
        }
        if !tables.providers.iter().any(|p| p.id == order.provider_id) {
            return Err(StoreError::NotFound(format!("provider {}", order.provider_id)));
        }
        if tables.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        tables.orders.push(order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<OrderDetails>> {
        let tables = self.read()?;
        let Some(order) = tables.orders.iter().find(|o| o.id == id) else {
            return Ok(None);
        };
        tables.details(order).map(Some)
    }

    async fn find_recent_orders(
        &self,
        patient_id: Uuid,
        medication_name: &str,
        created_after: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.read()?;
        let recent: Vec<Order> = tables
            .newest_first(|o| {
                o.patient_id == patient_id
                    && o.medication_name == medication_name
                    && o.created_at >= created_after
            })
            .into_iter()
            .cloned()
            .collect();
        Ok(recent)
    }

    async fn attach_care_plan(
        &self,
        id: Uuid,
        care_plan: &str,
        generated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.write()?;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", id)))?;
        if order.care_plan.is_some() {
            return Err(StoreError::Conflict(format!("care plan already recorded for order {}", id)));
        }
        order.care_plan = Some(care_plan.to_string());
        order.care_plan_generated_at = Some(generated_at);
        Ok(())
    }

    async fn delete_order(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let len_before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        Ok(tables.orders.len() < len_before)
    }

    async fn list_orders(&self, skip: i64, limit: i64) -> StoreResult<Vec<OrderDetails>> {
        let tables = self.read()?;
        let skip = usize::try_from(skip).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        let page: StoreResult<Vec<OrderDetails>> = tables
            .newest_first(|_| true)
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|o| tables.details(o))
            .collect();
        page
    }

    async fn query_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderDetails>> {
        let tables = self.read()?;
        let mut out = Vec::new();
        for order in tables.newest_first(|_| true) {
            let details = tables.details(order)?;
            if filter.matches(&details) {
                out.push(details);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (InMemoryEntityStore, Patient, Provider) {
        let store = InMemoryEntityStore::new();
        let patient = Patient::new("123456".into(), "John".into(), "Doe".into());
        let provider = Provider::new("1234567890".into(), "Dr. Alice Johnson".into());
        store.create_patient(&patient).await.unwrap();
        store.create_provider(&provider).await.unwrap();
        (store, patient, provider)
    }

    fn order_for(patient: &Patient, provider: &Provider, med: &str) -> Order {
        Order::new(patient.id, provider.id, "G70.00".into(), med.into(), "records".into())
    }

    #[tokio::test]
    async fn test_duplicate_mrn_is_conflict() {
        let (store, _, _) = seeded().await;
        let again = Patient::new("123456".into(), "Jane".into(), "Smith".into());
        let err = store.create_patient(&again).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.patient_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_npi_is_conflict() {
        let (store, _, _) = seeded().await;
        let again = Provider::new("1234567890".into(), "Dr. Bob Smith".into());
        let err = store.create_provider(&again).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_provider_name_lookup_ignores_case() {
        let (store, _, provider) = seeded().await;
        let found = store.get_provider_by_name_ci("dr. alice JOHNSON").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(provider.id));
        assert!(store.get_provider_by_name_ci("Dr. Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_orders_respect_window_and_medication() {
        let (store, patient, provider) = seeded().await;
        let now = Utc::now();
        let fresh = order_for(&patient, &provider, "IVIG").with_created_at(now - Duration::hours(2));
        let stale = order_for(&patient, &provider, "IVIG").with_created_at(now - Duration::hours(30));
        let other = order_for(&patient, &provider, "Rituximab").with_created_at(now);
        for o in [&fresh, &stale, &other] {
            store.create_order(o).await.unwrap();
        }

        let recent = store
            .find_recent_orders(patient.id, "IVIG", now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_care_plan_attaches_once() {
        let (store, patient, provider) = seeded().await;
        let order = order_for(&patient, &provider, "IVIG");
        store.create_order(&order).await.unwrap();

        store.attach_care_plan(order.id, "plan", Utc::now()).await.unwrap();
        let err = store.attach_care_plan(order.id, "again", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let details = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(details.order.care_plan.as_deref(), Some("plan"));
        assert_eq!(details.patient.mrn, "123456");
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let (store, patient, provider) = seeded().await;
        let first = order_for(&patient, &provider, "A").with_created_at(Utc::now() - Duration::minutes(5));
        let second = order_for(&patient, &provider, "B");
        store.create_order(&first).await.unwrap();
        store.create_order(&second).await.unwrap();

        let listed = store.list_orders(0, 100).await.unwrap();
        assert_eq!(listed[0].order.id, second.id);
        assert_eq!(store.list_orders(1, 1).await.unwrap()[0].order.id, first.id);

        assert!(store.delete_order(first.id).await.unwrap());
        assert!(!store.delete_order(first.id).await.unwrap());
        assert_eq!(store.order_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_applies_filter() {
        let (store, patient, provider) = seeded().await;
        let planned = order_for(&patient, &provider, "A");
        let pending = order_for(&patient, &provider, "B");
        store.create_order(&planned).await.unwrap();
        store.create_order(&pending).await.unwrap();
        store.attach_care_plan(planned.id, "plan", Utc::now()).await.unwrap();

        let filter = OrderFilter {
            care_plan_only: true,
            ..Default::default()
        };
        let rows = store.query_orders(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order.id, planned.id);
    }
}
