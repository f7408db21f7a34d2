use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::models::{
    is_missing_value, CallAuditRecord, NormalizedRow, PhoneEntry, Text, AUDIT_PARAMETERS,
    NOT_PROVIDED, UNKNOWN,
};

const PHONE_PLACEHOLDERS: [&str; 3] = ["not provided", "discussed", "partial"];

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    /// Distinct agent names, sorted, with placeholders left out.
    pub agents: Vec<String>,
}

/// Pulls the record array out of a listing response. Accepts the
/// `{ "call_audit_details": [...] }` envelope or a bare array.
pub fn records_from_response(body: Value) -> Result<Vec<Value>, IngestError> {
    match body {
        Value::Array(records) => Ok(records),
        Value::Object(mut envelope) => match envelope.remove("call_audit_details") {
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(IngestError::Shape(format!(
                "call_audit_details should be an array, found {}",
                json_kind(&other)
            ))),
            None => Err(IngestError::Shape(
                "response has no call_audit_details field".to_string(),
            )),
        },
        other => Err(IngestError::Shape(format!(
            "expected an object or array, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn normalize(records: &[Value]) -> Normalized {
    let mut rows = Vec::with_capacity(records.len());
    let mut agents = BTreeSet::new();

    for raw in records {
        let row = normalize_record(raw);
        if !is_missing_value(&row.consultant_name) {
            agents.insert(row.consultant_name.clone());
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), agents = agents.len(), "normalized call audits");
    Normalized {
        rows,
        agents: agents.into_iter().collect(),
    }
}

/// Never fails: anything missing or mistyped falls back to a placeholder.
pub fn normalize_record(raw: &Value) -> NormalizedRow {
    let record = CallAuditRecord::deserialize(raw).unwrap_or_else(|err| {
        warn!(%err, "call audit record is not an object, using fallbacks");
        CallAuditRecord::default()
    });

    let metadata = record.call_metadata.unwrap_or_default();
    let eligibility = record.eligibility.unwrap_or_default();
    let status = record.call_status.unwrap_or_default();
    let parameters = record.audit_parameters.unwrap_or_default();

    let audit = AUDIT_PARAMETERS
        .iter()
        .map(|name| text_or(parameters.get(*name).and_then(Text::from_value), NOT_PROVIDED))
        .collect();

    NormalizedRow {
        call_id: text_or(record.call_id, NOT_PROVIDED),
        consultant_name: text_or(metadata.agent_name, UNKNOWN),
        student_name: text_or(metadata.student_name, NOT_PROVIDED),
        phone_no: join_phone_numbers(metadata.phone_numbers.as_deref().unwrap_or_default()),
        date_of_call: text_or(metadata.call_date, NOT_PROVIDED),
        dob: text_or(eligibility.date_of_birth, NOT_PROVIDED),
        qualification_stream: text_or(eligibility.qualification_stream, NOT_PROVIDED),
        was_student_eligible: text_or(eligibility.eligible, "No"),
        audit,
        call_disconnected: disconnected_label(status.call_disconnected.as_ref()).to_string(),
        call_completion_status: completion_label(status.call_completed.as_ref()).to_string(),
        total_score: quality_score(&parameters),
        raw_data: raw.clone(),
    }
}

fn text_or(value: Option<Text>, fallback: &str) -> String {
    match value {
        Some(Text(text)) if !text.trim().is_empty() => text,
        _ => fallback.to_string(),
    }
}

pub fn join_phone_numbers(entries: &[Value]) -> String {
    let numbers: Vec<String> = entries
        .iter()
        .filter_map(|entry| PhoneEntry::deserialize(entry).ok())
        .filter_map(|entry| entry.number)
        .map(|Text(number)| number.trim().to_string())
        .filter(|number| {
            !number.is_empty()
                && !PHONE_PLACEHOLDERS
                    .iter()
                    .any(|placeholder| number.eq_ignore_ascii_case(placeholder))
        })
        .collect();

    if numbers.is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        numbers.join(", ")
    }
}

fn disconnected_label(flag: Option<&Text>) -> &'static str {
    match flag {
        Some(Text(value)) if value == "False" => "No",
        _ => "Yes",
    }
}

fn completion_label(flag: Option<&Text>) -> &'static str {
    match flag {
        Some(Text(value)) if value == "True" => "Complete",
        _ => "Incomplete",
    }
}

/// Share of `"Yes"` answers scaled to 0..=10, rounded half up. No answers scores 0.
pub fn quality_score(parameters: &BTreeMap<String, Value>) -> u8 {
    let total = parameters.len();
    if total == 0 {
        return 0;
    }
    let yes = parameters
        .values()
        .filter(|value| value.as_str() == Some("Yes"))
        .count();
    let rounded = (20 * yes + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parameters(yes: usize, no: usize) -> Value {
        let mut map = serde_json::Map::new();
        for (index, name) in AUDIT_PARAMETERS.iter().enumerate().take(yes + no) {
            let answer = if index < yes { "Yes" } else { "No" };
            map.insert((*name).to_string(), json!(answer));
        }
        Value::Object(map)
    }

    fn full_record() -> Value {
        json!({
            "call_id": "CALL-001",
            "Call_Metadata": {
                "Agent_Name": "Priya Sharma",
                "Student_Name": "Rahul Verma",
                "Phone_Numbers": [
                    {"number": "9876543210"},
                    {"number": "not provided"},
                    {"number": ""},
                    {"number": "Discussed"},
                    {"number": "9123456780"}
                ],
                "Call_Date": "2024-03-15"
            },
            "Eligibility": {
                "Date_of_Birth": "2004-07-09",
                "Qualification_Stream": "Science",
                "Eligible": "Yes"
            },
            "Audit_Parameters": parameters(20, 8),
            "Call_Status": {"Call_Disconnected": "False", "Call_Completed": "True"}
        })
    }

    #[test]
    fn flattens_a_complete_record() {
        let row = normalize_record(&full_record());
        assert_eq!(row.call_id, "CALL-001");
        assert_eq!(row.consultant_name, "Priya Sharma");
        assert_eq!(row.student_name, "Rahul Verma");
        assert_eq!(row.phone_no, "9876543210, 9123456780");
        assert_eq!(row.date_of_call, "2024-03-15");
        assert_eq!(row.dob, "2004-07-09");
        assert_eq!(row.qualification_stream, "Science");
        assert_eq!(row.was_student_eligible, "Yes");
        assert_eq!(row.call_disconnected, "No");
        assert_eq!(row.call_completion_status, "Complete");
        assert_eq!(row.total_score, 7);
        assert_eq!(row.audit.len(), AUDIT_PARAMETERS.len());
        assert_eq!(row.audit[0], "Yes");
        assert_eq!(row.audit[27], "No");
        assert_eq!(row.raw_data, full_record());
    }

    #[test]
    fn empty_record_gets_fallbacks() {
        let row = normalize_record(&json!({}));
        assert_eq!(row.call_id, NOT_PROVIDED);
        assert_eq!(row.consultant_name, UNKNOWN);
        assert_eq!(row.student_name, NOT_PROVIDED);
        assert_eq!(row.phone_no, NOT_PROVIDED);
        assert_eq!(row.date_of_call, NOT_PROVIDED);
        assert_eq!(row.dob, NOT_PROVIDED);
        assert_eq!(row.qualification_stream, NOT_PROVIDED);
        assert_eq!(row.was_student_eligible, "No");
        assert_eq!(row.call_disconnected, "Yes");
        assert_eq!(row.call_completion_status, "Incomplete");
        assert_eq!(row.total_score, 0);
        assert!(row.audit.iter().all(|value| value == NOT_PROVIDED));
    }

    #[test]
    fn non_object_record_is_kept_with_fallbacks() {
        let rows = normalize(&[json!("garbage"), json!(null), full_record()]).rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].call_id, NOT_PROVIDED);
        assert_eq!(rows[1].consultant_name, UNKNOWN);
        assert_eq!(rows[2].call_id, "CALL-001");
    }

    #[test]
    fn audit_values_pass_through_uncoerced() {
        let row = normalize_record(&json!({
            "Audit_Parameters": {"Greeting": "Excellent", "Empathy": "Not Provided", "Call_Control": "No"}
        }));
        assert_eq!(row.audit[0], "Excellent");
        assert_eq!(row.audit[6], "Not Provided");
        assert_eq!(row.audit[23], "No");
        assert_eq!(row.audit[1], NOT_PROVIDED);
        assert_eq!(row.total_score, 0);
    }

    #[test]
    fn score_rounds_half_away_from_zero() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), json!("Yes"));
        map.insert("b".to_string(), json!("No"));
        map.insert("c".to_string(), json!("No"));
        map.insert("d".to_string(), json!("No"));
        // 10 * 1/4 = 2.5
        assert_eq!(quality_score(&map), 3);

        map.insert("e".to_string(), json!("Good"));
        map.insert("f".to_string(), json!("Yes"));
        // 10 * 2/6 = 3.33
        assert_eq!(quality_score(&map), 3);

        assert_eq!(quality_score(&BTreeMap::new()), 0);
    }

    #[test]
    fn score_stays_within_bounds() {
        for yes in 0..=28 {
            let Value::Object(map) = parameters(yes, 28 - yes) else {
                unreachable!()
            };
            let score = quality_score(&map.into_iter().collect::<BTreeMap<_, _>>());
            assert!(score <= 10);
        }
        let Value::Object(all_yes) = parameters(28, 0) else {
            unreachable!()
        };
        assert_eq!(quality_score(&all_yes.into_iter().collect::<BTreeMap<_, _>>()), 10);
    }

    #[test]
    fn agents_are_distinct_and_skip_placeholders() {
        let records = vec![
            json!({"Call_Metadata": {"Agent_Name": "Priya Sharma"}}),
            json!({"Call_Metadata": {"Agent_Name": "Arjun Mehta"}}),
            json!({"Call_Metadata": {"Agent_Name": "Priya Sharma"}}),
            json!({"Call_Metadata": {"Agent_Name": "Not Provided"}}),
            json!({"Call_Metadata": {}}),
        ];
        let normalized = normalize(&records);
        assert_eq!(normalized.rows.len(), 5);
        assert_eq!(normalized.agents, vec!["Arjun Mehta", "Priya Sharma"]);
    }

    #[test]
    fn envelope_and_bare_array_are_accepted() {
        let wrapped = records_from_response(json!({"call_audit_details": [{}, {}]})).unwrap();
        assert_eq!(wrapped.len(), 2);
        let bare = records_from_response(json!([{}])).unwrap();
        assert_eq!(bare.len(), 1);
        let empty = records_from_response(json!({"call_audit_details": []})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn malformed_top_level_is_an_error() {
        assert!(matches!(
            records_from_response(json!({"call_audit_details": {"a": 1}})),
            Err(IngestError::Shape(_))
        ));
        assert!(matches!(
            records_from_response(json!({"calls": []})),
            Err(IngestError::Shape(_))
        ));
        assert!(matches!(
            records_from_response(json!("oops")),
            Err(IngestError::Shape(_))
        ));
    }
}
