use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use careplan_core::ClinicalInput;
use careplan_shared::Masked;

static MRN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}$").unwrap());
static NPI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10}$").unwrap());
static ICD10_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]\d{2}(\.\d{1,2})?$").unwrap());

const REQUIRED: &str = "This field is required.";
const ITEM_BLANK: &str = "This field may not be blank.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_A_STRING: &str = "Not a valid string.";
const NON_FIELD_ERRORS: &str = "non_field_errors";

const TEXT_FIELDS: [&str; 8] = [
    "patient_first_name",
    "patient_last_name",
    "patient_mrn",
    "provider_name",
    "provider_npi",
    "primary_diagnosis",
    "medication_name",
    "patient_records",
];

/// Raw order data as submitted by the intake form.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderSubmission {
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_mrn: String,
    pub provider_name: String,
    pub provider_npi: String,
    pub primary_diagnosis: String,
    pub medication_name: String,
    pub additional_diagnoses: Vec<String>,
    pub medication_history: Vec<String>,
    pub patient_records: String,
}

impl fmt::Debug for OrderSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderSubmission")
            .field("patient_mrn", &self.patient_mrn)
            .field("provider_npi", &self.provider_npi)
            .field("primary_diagnosis", &self.primary_diagnosis)
            .field("medication_name", &self.medication_name)
            .finish_non_exhaustive()
    }
}

/// Field name -> messages. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Takes over entries for fields that have no messages yet.
    fn absorb(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_insert(messages);
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msgs)| format!("{}: {}", field, msgs.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Strings pass through and numbers are taken as their text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_field(body: &Map<String, Value>, field: &str, errors: &mut FieldErrors) -> String {
    match body.get(field) {
        None => String::new(),
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            String::new()
        }
        Some(value) => scalar_text(value).unwrap_or_else(|| {
            errors.add(field, NOT_A_STRING);
            String::new()
        }),
    }
}

/// Missing and null lists are both empty.
fn list_field(body: &Map<String, Value>, field: &str, errors: &mut FieldErrors) -> Vec<String> {
    match body.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let texts: Option<Vec<String>> = items.iter().map(scalar_text).collect();
            texts.unwrap_or_else(|| {
                errors.add(field, NOT_A_STRING);
                Vec::new()
            })
        }
        Some(other) => {
            errors.add(
                field,
                format!("Expected a list of items but got type \"{}\".", json_type(other)),
            );
            Vec::new()
        }
    }
}

fn trim_list(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.trim().to_string()).collect()
}

impl OrderSubmission {
    /// Reads a submission from an untyped JSON body.
    ///
    /// Wrong-typed or null values are reported per field, together with the
    /// shape errors of the remaining fields. Missing keys are left empty for
    /// `validate` to flag.
    pub fn from_json(body: Value) -> Result<Self, FieldErrors> {
        let Value::Object(body) = body else {
            let mut errors = FieldErrors::default();
            errors.add(
                NON_FIELD_ERRORS,
                format!("Invalid data. Expected a dictionary, but got {}.", json_type(&body)),
            );
            return Err(errors);
        };

        let mut errors = FieldErrors::default();
        let [first, last, mrn, provider, npi, diagnosis, medication, records] =
            TEXT_FIELDS.map(|field| text_field(&body, field, &mut errors));
        let submission = Self {
            patient_first_name: first,
            patient_last_name: last,
            patient_mrn: mrn,
            provider_name: provider,
            provider_npi: npi,
            primary_diagnosis: diagnosis,
            medication_name: medication,
            additional_diagnoses: list_field(&body, "additional_diagnoses", &mut errors),
            medication_history: list_field(&body, "medication_history", &mut errors),
            patient_records: records,
        };

        if errors.is_empty() {
            return Ok(submission);
        }
        if let Err(shape) = submission.normalized().validate() {
            errors.absorb(shape);
        }
        Err(errors)
    }

    /// Trims surrounding whitespace from every field.
    pub fn normalized(self) -> Self {
        Self {
            patient_first_name: self.patient_first_name.trim().to_string(),
            patient_last_name: self.patient_last_name.trim().to_string(),
            patient_mrn: self.patient_mrn.trim().to_string(),
            provider_name: self.provider_name.trim().to_string(),
            provider_npi: self.provider_npi.trim().to_string(),
            primary_diagnosis: self.primary_diagnosis.trim().to_string(),
            medication_name: self.medication_name.trim().to_string(),
            additional_diagnoses: trim_list(self.additional_diagnoses),
            medication_history: trim_list(self.medication_history),
            patient_records: self.patient_records.trim().to_string(),
        }
    }

    /// Shape checks only; never touches the store.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        let text_fields: [(&str, &str, usize); 5] = [
            ("patient_first_name", self.patient_first_name.as_str(), 100),
            ("patient_last_name", self.patient_last_name.as_str(), 100),
            ("provider_name", self.provider_name.as_str(), 200),
            ("medication_name", self.medication_name.as_str(), 200),
            ("patient_records", self.patient_records.as_str(), usize::MAX),
        ];
        for (field, value, max) in text_fields {
            let value = value.trim();
            if value.is_empty() {
                errors.add(field, REQUIRED);
            } else if value.chars().count() > max {
                errors.add(
                    field,
                    format!("Ensure this field has no more than {} characters.", max),
                );
            }
        }

        let mrn = self.patient_mrn.trim();
        if mrn.is_empty() {
            errors.add("patient_mrn", REQUIRED);
        } else if !MRN_RE.is_match(mrn) {
            errors.add("patient_mrn", "MRN must be exactly 6 digits");
        }

        let npi = self.provider_npi.trim();
        if npi.is_empty() {
            errors.add("provider_npi", REQUIRED);
        } else if !NPI_RE.is_match(npi) {
            errors.add("provider_npi", "NPI must be exactly 10 digits");
        }

        let diagnosis = self.primary_diagnosis.trim();
        if diagnosis.is_empty() {
            errors.add("primary_diagnosis", REQUIRED);
        } else if !ICD10_RE.is_match(diagnosis) {
            errors.add(
                "primary_diagnosis",
                "Invalid ICD-10 code format. Expected format: Letter + 2 digits + optional .digit(s) (e.g., G70.00)",
            );
        }

        for (field, items) in [
            ("additional_diagnoses", &self.additional_diagnoses),
            ("medication_history", &self.medication_history),
        ] {
            if items.iter().any(|s| s.trim().is_empty()) {
                errors.add(field, ITEM_BLANK);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Normalizes then validates, returning the cleaned submission.
    pub fn into_validated(self) -> Result<Self, FieldErrors> {
        let cleaned = self.normalized();
        cleaned.validate()?;
        Ok(cleaned)
    }

    pub fn to_clinical_input(&self) -> ClinicalInput {
        ClinicalInput {
            patient_first_name: Masked::new(self.patient_first_name.clone()),
            patient_last_name: Masked::new(self.patient_last_name.clone()),
            patient_mrn: self.patient_mrn.clone(),
            primary_diagnosis: self.primary_diagnosis.clone(),
            additional_diagnoses: self.additional_diagnoses.clone(),
            medication_name: self.medication_name.clone(),
            medication_history: self.medication_history.clone(),
            patient_records: Masked::new(self.patient_records.clone()),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample() -> OrderSubmission {
    OrderSubmission {
        patient_first_name: "John".into(),
        patient_last_name: "Doe".into(),
        patient_mrn: "123456".into(),
        provider_name: "Dr. Alice Johnson".into(),
        provider_npi: "1234567890".into(),
        primary_diagnosis: "G70.00".into(),
        medication_name: "IVIG (Privigen)".into(),
        additional_diagnoses: vec!["I10".into()],
        medication_history: vec!["Prednisone 10mg".into()],
        patient_records: "Patient presents with generalized myasthenia gravis.".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_submission_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = OrderSubmission::default().validate().unwrap_err();
        for field in [
            "patient_first_name",
            "patient_last_name",
            "patient_mrn",
            "provider_name",
            "provider_npi",
            "primary_diagnosis",
            "medication_name",
            "patient_records",
        ] {
            assert_eq!(errors.get(field), Some(&[REQUIRED.to_string()][..]), "{}", field);
        }
        assert!(errors.get("additional_diagnoses").is_none());
    }

    #[test]
    fn test_identifier_shapes() {
        let mut s = sample();
        s.patient_mrn = "12345".into();
        s.provider_npi = "12345678901".into();
        s.primary_diagnosis = "g70.00".into();
        let errors = s.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.get("patient_mrn").unwrap()[0],
            "MRN must be exactly 6 digits"
        );
        assert_eq!(
            errors.get("provider_npi").unwrap()[0],
            "NPI must be exactly 10 digits"
        );
        assert!(errors.get("primary_diagnosis").unwrap()[0].starts_with("Invalid ICD-10"));
    }

    #[test]
    fn test_icd10_variants() {
        for ok in ["G70", "G70.0", "G70.00", "I10"] {
            assert!(ICD10_RE.is_match(ok), "{}", ok);
        }
        for bad in ["G7", "G70.000", "70.00", "GG0.00", "G70."] {
            assert!(!ICD10_RE.is_match(bad), "{}", bad);
        }
    }

    #[test]
    fn test_blank_list_item_rejected() {
        let mut s = sample();
        s.medication_history.push("   ".into());
        let errors = s.validate().unwrap_err();
        assert_eq!(errors.get("medication_history").unwrap()[0], ITEM_BLANK);
    }

    #[test]
    fn test_into_validated_trims() {
        let mut s = sample();
        s.patient_mrn = " 123456 ".into();
        s.patient_first_name = "John\n".into();
        let cleaned = s.into_validated().unwrap();
        assert_eq!(cleaned.patient_mrn, "123456");
        assert_eq!(cleaned.patient_first_name, "John");
    }

    #[test]
    fn test_field_errors_serialize_as_object() {
        let errors = OrderSubmission::default().validate().unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["patient_mrn"][0], REQUIRED);
    }

    fn sample_json() -> Value {
        serde_json::to_value(sample()).unwrap()
    }

    #[test]
    fn test_from_json_reads_full_body() {
        let parsed = OrderSubmission::from_json(sample_json()).unwrap();
        assert_eq!(parsed.patient_mrn, "123456");
        assert_eq!(parsed.additional_diagnoses, vec!["I10".to_string()]);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_from_json_accepts_numeric_identifiers() {
        let mut body = sample_json();
        body["patient_mrn"] = serde_json::json!(123456);
        body["provider_npi"] = serde_json::json!(1234567890_u64);
        let parsed = OrderSubmission::from_json(body).unwrap();
        assert_eq!(parsed.patient_mrn, "123456");
        assert_eq!(parsed.provider_npi, "1234567890");
    }

    #[test]
    fn test_from_json_null_lists_are_empty() {
        let mut body = sample_json();
        body["additional_diagnoses"] = Value::Null;
        body.as_object_mut().unwrap().remove("medication_history");
        let parsed = OrderSubmission::from_json(body).unwrap();
        assert!(parsed.additional_diagnoses.is_empty());
        assert!(parsed.medication_history.is_empty());
    }

    #[test]
    fn test_from_json_null_text_is_field_error() {
        let mut body = sample_json();
        body["patient_first_name"] = Value::Null;
        body["patient_mrn"] = serde_json::json!("12");
        let errors = OrderSubmission::from_json(body).unwrap_err();
        assert_eq!(errors.get("patient_first_name").unwrap(), [NOT_NULL.to_string()]);
        assert_eq!(
            errors.get("patient_mrn").unwrap()[0],
            "MRN must be exactly 6 digits"
        );
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_from_json_wrong_types() {
        let mut body = sample_json();
        body["provider_name"] = serde_json::json!({ "first": "Alice" });
        body["medication_history"] = serde_json::json!("Prednisone");
        body["additional_diagnoses"] = serde_json::json!(["I10", 7, true]);
        let errors = OrderSubmission::from_json(body).unwrap_err();
        assert_eq!(errors.get("provider_name").unwrap()[0], NOT_A_STRING);
        assert_eq!(
            errors.get("medication_history").unwrap()[0],
            "Expected a list of items but got type \"str\"."
        );
        assert_eq!(errors.get("additional_diagnoses").unwrap()[0], NOT_A_STRING);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let errors = OrderSubmission::from_json(serde_json::json!([1, 2])).unwrap_err();
        assert_eq!(
            errors.get(NON_FIELD_ERRORS).unwrap()[0],
            "Invalid data. Expected a dictionary, but got list."
        );
    }

    #[test]
    fn test_debug_hides_names() {
        let text = format!("{:?}", sample());
        assert!(!text.contains("John"));
        assert!(text.contains("123456"));
    }
}
