use chrono::{Days, NaiveDate};
use serde::Deserialize;

use careplan_core::OrderFilter;

use crate::format::ExportFormat;
use crate::ExportError;

/// Export query-string parameters. Blank values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub provider_npi: Option<String>,
    pub diagnosis: Option<String>,
}

/// Inclusive calendar-day range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &'static str, value: &Option<String>) -> Result<Option<NaiveDate>, ExportError> {
    present(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| ExportError::InvalidDate {
                field,
                value: v.to_string(),
            })
        })
        .transpose()
}

impl ExportParams {
    pub fn format(&self) -> Result<ExportFormat, ExportError> {
        present(&self.format)
            .map(str::parse::<ExportFormat>)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    pub fn date_range(&self) -> Result<DateRange, ExportError> {
        Ok(DateRange {
            start: parse_date("start_date", &self.start_date)?,
            end: parse_date("end_date", &self.end_date)?,
        })
    }

    /// The end date covers its whole day.
    pub fn filter(&self) -> Result<OrderFilter, ExportError> {
        let range = self.date_range()?;
        Ok(OrderFilter {
            created_from: range
                .start
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            created_before: range
                .end
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc()),
            provider_npi: present(&self.provider_npi).map(str::to_string),
            diagnosis: present(&self.diagnosis).map(str::to_string),
            care_plan_only: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_defaults_to_csv_without_filters() {
        let params = ExportParams::default();
        assert_eq!(params.format().unwrap(), ExportFormat::Csv);
        assert!(params.filter().unwrap().is_empty());
    }

    #[test]
    fn test_blank_values_are_absent() {
        let params = ExportParams {
            format: Some("".into()),
            start_date: Some("  ".into()),
            provider_npi: Some("".into()),
            ..Default::default()
        };
        assert_eq!(params.format().unwrap(), ExportFormat::Csv);
        assert!(params.filter().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_format = ExportParams {
            format: Some("invalid".into()),
            ..Default::default()
        };
        assert!(matches!(bad_format.format(), Err(ExportError::InvalidFormat(_))));

        let bad_date = ExportParams {
            start_date: Some("invalid".into()),
            ..Default::default()
        };
        let err = bad_date.filter().unwrap_err();
        assert_eq!(err.to_string(), "Invalid start_date format. Use YYYY-MM-DD");
    }

    #[test]
    fn test_end_date_covers_whole_day() {
        let params = ExportParams {
            start_date: Some("2025-01-01".into()),
            end_date: Some("2025-01-31".into()),
            provider_npi: Some("1234567890".into()),
            diagnosis: Some("G70.00".into()),
            ..Default::default()
        };
        let filter = params.filter().unwrap();
        assert_eq!(
            filter.created_from,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            filter.created_before,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(filter.provider_npi.as_deref(), Some("1234567890"));
        assert_eq!(filter.diagnosis.as_deref(), Some("G70.00"));
    }
}
