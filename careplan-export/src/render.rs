use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

use careplan_shared::OrderDetails;

use crate::format::ExportFormat;
use crate::ExportError;

pub const EXPORT_COLUMNS: [&str; 14] = [
    "Order ID",
    "Order Date",
    "Patient MRN",
    "Patient First Name",
    "Patient Last Name",
    "Provider Name",
    "Provider NPI",
    "Primary Diagnosis (ICD-10)",
    "Additional Diagnoses (ICD-10)",
    "Medication Name",
    "Medication History",
    "Care Plan Generated",
    "Care Plan Generated At",
    "Care Plan Length",
];

const SHEET_NAME: &str = "Care Plans Export";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_COLUMN_WIDTH: usize = 50;

/// One export row. Everything but the care-plan length is text.
struct ExportRow {
    text: [String; 13],
    care_plan_length: usize,
}

impl ExportRow {
    fn from_details(details: &OrderDetails) -> Self {
        let order = &details.order;
        let generated = if order.has_care_plan() { "Yes" } else { "No" };
        Self {
            text: [
                order.id.to_string(),
                order.created_at.format(TIMESTAMP_FORMAT).to_string(),
                details.patient.mrn.clone(),
                details.patient.first_name.clone(),
                details.patient.last_name.clone(),
                details.provider.name.clone(),
                details.provider.npi.clone(),
                order.primary_diagnosis.clone(),
                order.additional_diagnoses.join(", "),
                order.medication_name.clone(),
                order.medication_history.join(", "),
                generated.to_string(),
                order
                    .care_plan_generated_at
                    .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default(),
            ],
            care_plan_length: order.care_plan_length(),
        }
    }

    fn cells(&self) -> impl Iterator<Item = String> + '_ {
        self.text
            .iter()
            .cloned()
            .chain(std::iter::once(self.care_plan_length.to_string()))
    }
}

pub fn render(orders: &[OrderDetails], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => render_csv(orders),
        ExportFormat::Xlsx => render_xlsx(orders),
    }
}

pub fn render_csv(orders: &[OrderDetails]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_COLUMNS)
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    for details in orders {
        let row = ExportRow::from_details(details);
        writer
            .write_record(row.cells())
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    tracing::info!(orders = orders.len(), "CSV export generated");
    Ok(bytes)
}

pub fn render_xlsx(orders: &[OrderDetails]) -> Result<Vec<u8>, ExportError> {
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x366092))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let bold = Format::new().set_bold();

    let rows: Vec<ExportRow> = orders.iter().map(ExportRow::from_details).collect();
    let mut widths: Vec<usize> = EXPORT_COLUMNS.iter().map(|h| h.chars().count()).collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in EXPORT_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, value) in row.text.iter().enumerate() {
            sheet.write_string(r, col as u16, value)?;
            widths[col] = widths[col].max(value.chars().count());
        }
        let last = row.text.len();
        sheet.write_number(r, last as u16, row.care_plan_length as f64)?;
        widths[last] = widths[last].max(row.care_plan_length.to_string().len());
    }

    let summary_row = (rows.len() + 2) as u32;
    let generated = orders.iter().filter(|d| d.order.has_care_plan()).count();
    sheet.write_string_with_format(summary_row, 0, "Total Orders:", &bold)?;
    sheet.write_number(summary_row, 1, rows.len() as f64)?;
    sheet.write_string_with_format(summary_row + 1, 0, "Care Plans Generated:", &bold)?;
    sheet.write_number(summary_row + 1, 1, generated as f64)?;

    for (col, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        sheet.set_column_width(col as u16, width as f64)?;
    }

    let bytes = workbook.save_to_buffer()?;
    tracing::info!(orders = orders.len(), "Spreadsheet export generated");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use careplan_shared::{Order, Patient, Provider};
    use chrono::{TimeZone, Utc};

    fn details(care_plan: Option<&str>) -> OrderDetails {
        let patient = Patient::new("123456".into(), "John".into(), "Doe".into());
        let provider = Provider::new("1234567890".into(), "Dr. Alice Johnson".into());
        let mut order = Order::new(
            patient.id,
            provider.id,
            "G70.00".into(),
            "IVIG (Privigen)".into(),
            "records".into(),
        )
        .with_additional_diagnoses(vec!["I10".into(), "K21.9".into()])
        .with_created_at(Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap());
        if let Some(plan) = care_plan {
            order.care_plan = Some(plan.to_string());
            order.care_plan_generated_at = Some(Utc.with_ymd_and_hms(2025, 1, 15, 9, 31, 5).unwrap());
        }
        OrderDetails { order, patient, provider }
    }

    #[test]
    fn test_csv_header_and_rows() {
        let orders = vec![details(Some("Plan")), details(None)];
        let bytes = render_csv(&orders).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, EXPORT_COLUMNS);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(&first[0], orders[0].order.id.to_string());
        assert_eq!(&first[1], "2025-01-15 09:30:00");
        assert_eq!(&first[2], "123456");
        assert_eq!(&first[8], "I10, K21.9");
        assert_eq!(&first[10], "");
        assert_eq!(&first[11], "Yes");
        assert_eq!(&first[12], "2025-01-15 09:31:05");
        assert_eq!(&first[13], "4");

        let second = &records[1];
        assert_eq!(&second[11], "No");
        assert_eq!(&second[12], "");
        assert_eq!(&second[13], "0");
    }

    #[test]
    fn test_csv_empty_export_has_header_only() {
        let bytes = render_csv(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("Order ID,Order Date,"));
    }

    #[test]
    fn test_xlsx_is_zip_container() {
        let bytes = render(&[details(Some("Plan"))], ExportFormat::Xlsx).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
