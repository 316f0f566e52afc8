use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Free-form health background stored as JSONB on the user row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCondition {
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub diet_preference: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    /// Latest health-report extraction, merged in by the health_report
    /// processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_extract: Option<serde_json::Value>,
}

/// Health profile of a task owner, resolved for prompt context. Read-only in
/// the worker core except for `health_condition.report_extract`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub birthday: Option<NaiveDate>,
    pub activity_level: Option<String>,
    #[serde(default)]
    pub health_condition: HealthCondition,
    pub bmr: Option<f64>,
    pub tdee: Option<f64>,
}
