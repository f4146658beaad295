//! Task data model — the wire projection of a task record held by the store.
//!
//! All numeric enumerations are decoded into closed enums at the boundary.
//! Unknown codes are rejected during deserialization.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{FormatError, SchedulerError};

// ── Period ──────────────────────────────────────────────────────────

/// Recurrence period of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Period {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Interval between two due times. Months are a fixed 30 days.
    pub fn interval(self) -> Duration {
        let secs = match self {
            Self::Minutely => 60,
            Self::Hourly => 3_600,
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
            Self::Monthly => 2_592_000,
        };
        Duration::from_secs(secs)
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Minutely => 2,
            Self::Hourly => 3,
            Self::Daily => 4,
            Self::Weekly => 5,
            Self::Monthly => 6,
        }
    }
}

impl TryFrom<i64> for Period {
    type Error = SchedulerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(Self::Minutely),
            3 => Ok(Self::Hourly),
            4 => Ok(Self::Daily),
            5 => Ok(Self::Weekly),
            6 => Ok(Self::Monthly),
            _ => Err(SchedulerError::InvalidPeriod { code }),
        }
    }
}

impl From<Period> for i64 {
    fn from(period: Period) -> Self {
        period.code()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minutely => "minutely",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of a task as recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TaskStatus {
    /// Written by the store when an update carries no status.
    Unknown,
    Scheduled,
    Running,
    Completed,
    Failed,
    Canceled,
    Pending,
}

impl TaskStatus {
    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Scheduled => 1,
            Self::Running => 2,
            Self::Completed => 3,
            Self::Failed => 4,
            Self::Canceled => 5,
            Self::Pending => 6,
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = FormatError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Scheduled),
            2 => Ok(Self::Running),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            5 => Ok(Self::Canceled),
            6 => Ok(Self::Pending),
            _ => Err(FormatError::UnknownStatus(code)),
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

// ── Output types ────────────────────────────────────────────────────

/// Type tag of an output slot.
///
/// `Summary` (code 3) marks the summary slot; it is never a valid
/// requested output format. `Unknown` (code 0) tags padding placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OutputType {
    #[default]
    Unknown,
    Json,
    Csv,
    Summary,
    Markdown,
}

impl TryFrom<i64> for OutputType {
    type Error = FormatError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Json),
            2 => Ok(Self::Csv),
            3 => Ok(Self::Summary),
            4 => Ok(Self::Markdown),
            _ => Err(FormatError::UnsupportedOutputFormat(code.to_string())),
        }
    }
}

impl From<OutputType> for i64 {
    fn from(kind: OutputType) -> Self {
        match kind {
            OutputType::Unknown => 0,
            OutputType::Json => 1,
            OutputType::Csv => 2,
            OutputType::Summary => 3,
            OutputType::Markdown => 4,
        }
    }
}

/// A requested output format for an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOutputFormat", into = "String")]
pub enum OutputFormat {
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Csv => "CSV",
            Self::Markdown => "MARKDOWN",
        }
    }

    pub fn output_type(self) -> OutputType {
        match self {
            Self::Json => OutputType::Json,
            Self::Csv => OutputType::Csv,
            Self::Markdown => OutputType::Markdown,
        }
    }
}

impl TryFrom<OutputType> for OutputFormat {
    type Error = FormatError;

    fn try_from(kind: OutputType) -> Result<Self, Self::Error> {
        match kind {
            OutputType::Json => Ok(Self::Json),
            OutputType::Csv => Ok(Self::Csv),
            OutputType::Markdown => Ok(Self::Markdown),
            other => Err(FormatError::UnsupportedOutputFormat(
                i64::from(other).to_string(),
            )),
        }
    }
}

/// Output format as it arrives on the wire: a numeric code or a name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOutputFormat {
    Code(i64),
    Name(String),
}

impl TryFrom<RawOutputFormat> for OutputFormat {
    type Error = FormatError;

    fn try_from(raw: RawOutputFormat) -> Result<Self, Self::Error> {
        match raw {
            RawOutputFormat::Code(code) => OutputType::try_from(code)?.try_into(),
            RawOutputFormat::Name(name) => match name.trim().to_ascii_uppercase().as_str() {
                "JSON" => Ok(Self::Json),
                "CSV" => Ok(Self::Csv),
                "MARKDOWN" => Ok(Self::Markdown),
                _ => Err(FormatError::UnsupportedOutputFormat(name)),
            },
        }
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.name().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Task definition ─────────────────────────────────────────────────

/// Position of the preview in the output sequence.
pub const PREVIEW_SLOT: usize = 0;
/// Position of the full response in the output sequence.
pub const FULL_RESPONSE_SLOT: usize = 1;
/// Position of the summary in the output sequence.
pub const SUMMARY_SLOT: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlSource {
    #[serde(rename = "type", default = "default_source_type")]
    pub kind: i64,
    #[serde(default)]
    pub url: String,
}

fn default_source_type() -> i64 {
    1
}

/// A requested field: `name` is the keyword, `value` the data type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type", default)]
    pub kind: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// One positional entry of a task's output sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    #[serde(rename = "type", default)]
    pub kind: OutputType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl OutputSlot {
    pub fn new(kind: OutputType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Empty entry used to pad the sequence before an indexed write.
    pub fn placeholder() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub run_type: Option<i64>,
    #[serde(default)]
    pub source: Vec<UrlSource>,
    #[serde(default)]
    pub target: Vec<Target>,
    #[serde(default)]
    pub output: Vec<OutputSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<i64>,
}

impl TaskDefinition {
    /// Pad the output sequence with placeholders to at least `len` entries.
    pub fn pad_outputs(&mut self, len: usize) {
        if self.output.len() < len {
            self.output.resize_with(len, OutputSlot::placeholder);
        }
    }

    /// Write `slot` at `index`, padding first so the index is addressable.
    pub fn set_output(&mut self, index: usize, slot: OutputSlot) {
        self.pad_outputs(index + 1);
        self.output[index] = slot;
    }

    /// The stored full response, if slot 1 holds a non-empty value.
    pub fn full_response(&self) -> Option<&str> {
        self.output
            .get(FULL_RESPONSE_SLOT)
            .map(|slot| slot.value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// The requested output format, taken from the first output entry.
    pub fn output_format(&self) -> Result<OutputFormat, FormatError> {
        let slot = self
            .output
            .first()
            .ok_or(FormatError::MissingField("task_definition.output"))?;
        OutputFormat::try_from(slot.kind)
    }
}

/// Task details as sent to (and accepted by) the store.
///
/// The store replaces name, definition and status wholesale on every update,
/// so a write must carry all three to keep them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<TaskDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskDetails {
    pub fn definition_mut(&mut self) -> &mut TaskDefinition {
        self.task_definition.get_or_insert_with(TaskDefinition::default)
    }
}

/// Transient projection of the authoritative task record.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    #[serde(default, alias = "ID", deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub task_name: String,
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "definition_object_or_string")]
    pub task_definition: Option<TaskDefinition>,
}

impl TaskRecord {
    /// The stored record with a new status, ready to be written back.
    pub fn with_status(self, status: TaskStatus) -> TaskDetails {
        TaskDetails {
            task_name: Some(self.task_name),
            task_definition: self.task_definition,
            status: Some(status),
        }
    }
}

/// The store reports ids as strings or numbers depending on the endpoint.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// The store returns the definition either inline or as a JSON-encoded string.
fn definition_object_or_string<'de, D>(deserializer: D) -> Result<Option<TaskDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).map(Some).map_err(D::Error::custom)
        }
        other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
    }
}
