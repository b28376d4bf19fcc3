use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use crate::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(ExportError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `care_plans_export_[<range>_]<YYYYMMDD_HHMMSS>.<ext>`
pub fn export_filename(
    format: ExportFormat,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    let range = match (start, end) {
        (Some(s), Some(e)) => Some(format!("{}_to_{}", s.format("%Y%m%d"), e.format("%Y%m%d"))),
        (Some(s), None) => Some(format!("from_{}", s.format("%Y%m%d"))),
        (None, Some(e)) => Some(format!("until_{}", e.format("%Y%m%d"))),
        (None, None) => None,
    };
    match range {
        Some(range) => format!("care_plans_export_{}_{}.{}", range, timestamp, format),
        None => format!("care_plans_export_{}.{}", timestamp, format),
    }
}
