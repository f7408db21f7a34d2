use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const NOT_PROVIDED: &str = "Not Provided";
pub const UNKNOWN: &str = "Unknown";

/// Audit checks in export order. Keys match the backend's `Audit_Parameters` object.
pub const AUDIT_PARAMETERS: [&str; 28] = [
    "Greeting",
    "Self_Introduction",
    "Purpose_of_Call",
    "Active_Listening",
    "Tone_and_Courtesy",
    "Clarity_of_Speech",
    "Empathy",
    "Confirmed_Student_Name",
    "Confirmed_Contact_Number",
    "Verified_Date_of_Birth",
    "Verified_Qualification",
    "Eligibility_Explained",
    "Course_Details_Explained",
    "Fee_Structure_Explained",
    "Scholarship_Information",
    "Admission_Process_Explained",
    "Documents_Required_Explained",
    "Important_Dates_Shared",
    "Objection_Handling",
    "Questions_Answered",
    "Product_Knowledge",
    "No_False_Commitments",
    "Hold_Procedure_Followed",
    "Call_Control",
    "Next_Steps_Agreed",
    "Follow_Up_Scheduled",
    "Summary_Provided",
    "Closing_Statement",
];

/// True for the placeholder values that stand in for absent data.
pub fn is_missing_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(NOT_PROVIDED)
        || trimmed.eq_ignore_ascii_case(UNKNOWN)
}

/// A scalar JSON leaf read as text. Booleans become `"True"`/`"False"`, the
/// spelling the audit service uses for its status flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Text {
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Text(s)),
            Value::Number(n) => Ok(Text(n.to_string())),
            Value::Bool(true) => Ok(Text("True".to_string())),
            Value::Bool(false) => Ok(Text("False".to_string())),
            other => Err(D::Error::custom(format!("expected a scalar, found {other}"))),
        }
    }
}

/// Accepts any JSON for the field and keeps it only if it has the expected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallAuditRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub call_id: Option<Text>,
    #[serde(rename = "Call_Metadata", default, deserialize_with = "lenient")]
    pub call_metadata: Option<CallMetadata>,
    #[serde(rename = "Eligibility", default, deserialize_with = "lenient")]
    pub eligibility: Option<Eligibility>,
    #[serde(rename = "Audit_Parameters", default, deserialize_with = "lenient")]
    pub audit_parameters: Option<BTreeMap<String, Value>>,
    #[serde(rename = "Call_Status", default, deserialize_with = "lenient")]
    pub call_status: Option<CallStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallMetadata {
    #[serde(rename = "Agent_Name", default, deserialize_with = "lenient")]
    pub agent_name: Option<Text>,
    #[serde(rename = "Student_Name", default, deserialize_with = "lenient")]
    pub student_name: Option<Text>,
    #[serde(rename = "Phone_Numbers", default, deserialize_with = "lenient")]
    pub phone_numbers: Option<Vec<Value>>,
    #[serde(rename = "Call_Date", default, deserialize_with = "lenient")]
    pub call_date: Option<Text>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhoneEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub number: Option<Text>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Eligibility {
    #[serde(rename = "Date_of_Birth", default, deserialize_with = "lenient")]
    pub date_of_birth: Option<Text>,
    #[serde(rename = "Qualification_Stream", default, deserialize_with = "lenient")]
    pub qualification_stream: Option<Text>,
    #[serde(
        rename = "Eligible",
        alias = "Was_Student_Eligible",
        default,
        deserialize_with = "lenient"
    )]
    pub eligible: Option<Text>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallStatus {
    #[serde(rename = "Call_Disconnected", default, deserialize_with = "lenient")]
    pub call_disconnected: Option<Text>,
    #[serde(rename = "Call_Completed", default, deserialize_with = "lenient")]
    pub call_completed: Option<Text>,
}

/// One call flattened for the table. Every field is always populated.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub call_id: String,
    pub consultant_name: String,
    pub student_name: String,
    pub phone_no: String,
    pub date_of_call: String,
    pub dob: String,
    pub qualification_stream: String,
    pub was_student_eligible: String,
    /// Values for [`AUDIT_PARAMETERS`], position for position.
    pub audit: Vec<String>,
    pub call_disconnected: String,
    pub call_completion_status: String,
    pub total_score: u8,
    /// The record as received, kept for the detail view.
    pub raw_data: Value,
}

impl NormalizedRow {
    pub fn audit_value(&self, index: usize) -> &str {
        self.audit.get(index).map_or(NOT_PROVIDED, String::as_str)
    }

    pub fn value(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::CallId => Cow::Borrowed(&self.call_id),
            Column::Agent => Cow::Borrowed(&self.consultant_name),
            Column::Student => Cow::Borrowed(&self.student_name),
            Column::Phone => Cow::Borrowed(&self.phone_no),
            Column::DateOfCall => Cow::Borrowed(&self.date_of_call),
            Column::DateOfBirth => Cow::Borrowed(&self.dob),
            Column::Qualification => Cow::Borrowed(&self.qualification_stream),
            Column::Eligibility => Cow::Borrowed(&self.was_student_eligible),
            Column::TotalScore => Cow::Owned(self.total_score.to_string()),
            Column::CompletionStatus => Cow::Borrowed(&self.call_completion_status),
            Column::Disconnected => Cow::Borrowed(&self.call_disconnected),
            Column::Audit(index) => Cow::Borrowed(self.audit_value(index)),
        }
    }
}

/// A table column. `Audit` holds an index into [`AUDIT_PARAMETERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CallId,
    Agent,
    Student,
    Phone,
    DateOfCall,
    DateOfBirth,
    Qualification,
    Eligibility,
    TotalScore,
    CompletionStatus,
    Disconnected,
    Audit(usize),
}

pub const FIXED_COLUMNS: [Column; 11] = [
    Column::CallId,
    Column::Agent,
    Column::Student,
    Column::Phone,
    Column::DateOfCall,
    Column::DateOfBirth,
    Column::Qualification,
    Column::Eligibility,
    Column::TotalScore,
    Column::CompletionStatus,
    Column::Disconnected,
];

/// Columns the "all" search looks through.
pub const SEARCHABLE_COLUMNS: [Column; 7] = [
    Column::CallId,
    Column::Agent,
    Column::Student,
    Column::Phone,
    Column::DateOfCall,
    Column::DateOfBirth,
    Column::Qualification,
];

impl Column {
    /// Fixed columns followed by every audit parameter, in export order.
    pub fn all() -> impl Iterator<Item = Column> {
        FIXED_COLUMNS
            .into_iter()
            .chain((0..AUDIT_PARAMETERS.len()).map(Column::Audit))
    }

    pub fn key(self) -> Cow<'static, str> {
        let key = match self {
            Column::CallId => "call_id",
            Column::Agent => "agent",
            Column::Student => "student",
            Column::Phone => "phone",
            Column::DateOfCall => "date",
            Column::DateOfBirth => "dob",
            Column::Qualification => "qualification",
            Column::Eligibility => "eligibility",
            Column::TotalScore => "score",
            Column::CompletionStatus => "completion",
            Column::Disconnected => "disconnected",
            Column::Audit(index) => {
                let name = AUDIT_PARAMETERS.get(index).copied().unwrap_or(UNKNOWN);
                return Cow::Owned(name.to_ascii_lowercase());
            }
        };
        Cow::Borrowed(key)
    }

    pub fn header(self) -> Cow<'static, str> {
        let header = match self {
            Column::CallId => "Call ID",
            Column::Agent => "Agent Name",
            Column::Student => "Student Name",
            Column::Phone => "Phone No",
            Column::DateOfCall => "Date of Call",
            Column::DateOfBirth => "DOB",
            Column::Qualification => "Qualification Stream",
            Column::Eligibility => "Was Student Eligible",
            Column::TotalScore => "Total Score",
            Column::CompletionStatus => "Call Completion Status",
            Column::Disconnected => "Call Disconnected",
            Column::Audit(index) => {
                let name = AUDIT_PARAMETERS.get(index).copied().unwrap_or(UNKNOWN);
                return Cow::Owned(name.replace('_', " "));
            }
        };
        Cow::Borrowed(header)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let alias = match wanted.as_str() {
            "consultant" | "consultant_name" | "agent_name" => Some(Column::Agent),
            "student_name" => Some(Column::Student),
            "phone_no" => Some(Column::Phone),
            "date_of_call" => Some(Column::DateOfCall),
            "total_score" => Some(Column::TotalScore),
            _ => None,
        };
        alias
            .or_else(|| Column::all().find(|column| column.key() == wanted))
            .ok_or_else(|| format!("unknown column `{s}`"))
    }
}

#[derive(Debug, Clone)]
pub struct AgentSummary {
    pub agent: String,
    pub calls: usize,
    pub avg_score: f64,
}

#[derive(Debug, Clone)]
pub struct ParameterSummary {
    pub parameter: &'static str,
    pub yes_count: usize,
    pub answered: usize,
    pub yes_rate: f64,
}
