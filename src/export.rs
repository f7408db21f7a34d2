use anyhow::Context;
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::models::{Column, NormalizedRow};

pub fn export_headers() -> Vec<String> {
    Column::all().map(|column| column.header().into_owned()).collect()
}

/// Every field is quoted. Embedded quotes are doubled by the csv writer.
/// Zero rows still yields the header line.
pub fn to_delimited_text(rows: &[&NormalizedRow]) -> anyhow::Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(export_headers())
        .context("failed to write export header")?;

    for row in rows {
        writer
            .write_record(Column::all().map(|column| row.value(column).into_owned()))
            .with_context(|| format!("failed to write export row for {}", row.call_id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush export: {}", err.error()))?;
    String::from_utf8(bytes).context("export produced invalid UTF-8")
}

pub fn suggested_filename(date: NaiveDate) -> String {
    format!("call_audit_export_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AUDIT_PARAMETERS;
    use crate::normalize::normalize;
    use serde_json::json;

    fn read_back(text: &str) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let records = reader
            .records()
            .map(|record| record.unwrap().iter().map(str::to_string).collect())
            .collect();
        (headers, records)
    }

    #[test]
    fn empty_export_is_header_only() {
        let text = to_delimited_text(&[]).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("\"Call ID\",\"Agent Name\""));

        let (headers, records) = read_back(&text);
        assert_eq!(headers, export_headers());
        assert_eq!(headers.len(), 11 + AUDIT_PARAMETERS.len());
        assert_eq!(headers[11], "Greeting");
        assert_eq!(headers[38], "Closing Statement");
        assert!(records.is_empty());
    }

    #[test]
    fn exported_rows_read_back_field_for_field() {
        let normalized = normalize(&[
            json!({
                "call_id": "CALL-001",
                "Call_Metadata": {
                    "Agent_Name": "Priya Sharma",
                    "Phone_Numbers": [{"number": "9876543210"}, {"number": "9123456780"}],
                    "Call_Date": "2024-03-15"
                },
                "Audit_Parameters": {"Greeting": "Yes", "Closing_Statement": "Good"},
                "Call_Status": {"Call_Disconnected": "False", "Call_Completed": "True"}
            }),
            json!({
                "call_id": "CALL-002",
                "Call_Metadata": {"Agent_Name": "Arjun \"AJ\" Mehta"}
            }),
            json!({}),
        ]);
        let refs: Vec<&NormalizedRow> = normalized.rows.iter().collect();
        let text = to_delimited_text(&refs).unwrap();

        let (_, records) = read_back(&text);
        assert_eq!(records.len(), 3);
        for (record, row) in records.iter().zip(&normalized.rows) {
            let expected: Vec<String> =
                Column::all().map(|column| row.value(column).into_owned()).collect();
            assert_eq!(record, &expected);
        }
        assert_eq!(records[0][3], "9876543210, 9123456780");
        assert_eq!(records[0][8], "5");
        assert_eq!(records[1][1], "Arjun \"AJ\" Mehta");
    }

    #[test]
    fn filename_embeds_the_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(suggested_filename(date), "call_audit_export_2024-03-05.csv");
    }
}
