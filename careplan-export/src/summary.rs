use serde::{Deserialize, Serialize};
use uuid::Uuid;

use careplan_shared::OrderDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub total_orders: usize,
    pub care_plans_generated: usize,
    pub care_plans_pending: usize,
}

impl ExportStats {
    pub fn from_orders(orders: &[OrderDetails]) -> Self {
        let generated = orders.iter().filter(|d| d.order.has_care_plan()).count();
        Self {
            total_orders: orders.len(),
            care_plans_generated: generated,
            care_plans_pending: orders.len() - generated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRef {
    pub name: String,
    pub mrn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub name: String,
    pub npi: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpedCarePlan {
    pub order_id: Uuid,
    pub patient: PatientRef,
    pub provider: ProviderRef,
    pub primary_diagnosis: String,
    pub medication: String,
    pub care_plan: String,
    pub created_at: String,
}

/// JSON dump of every order that has a care plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanDump {
    pub total_orders: usize,
    pub orders: Vec<DumpedCarePlan>,
}

impl CarePlanDump {
    /// Orders without a care plan are skipped.
    pub fn from_orders(orders: &[OrderDetails]) -> Self {
        let orders: Vec<DumpedCarePlan> = orders
            .iter()
            .filter_map(|d| {
                let care_plan = d.order.care_plan.clone().filter(|p| !p.is_empty())?;
                Some(DumpedCarePlan {
                    order_id: d.order.id,
                    patient: PatientRef {
                        name: d.patient.full_name(),
                        mrn: d.patient.mrn.clone(),
                    },
                    provider: ProviderRef {
                        name: d.provider.name.clone(),
                        npi: d.provider.npi.clone(),
                    },
                    primary_diagnosis: d.order.primary_diagnosis.clone(),
                    medication: d.order.medication_name.clone(),
                    care_plan,
                    created_at: d.order.created_at.to_rfc3339(),
                })
            })
            .collect();

        Self {
            total_orders: orders.len(),
            orders,
        }
    }
}
