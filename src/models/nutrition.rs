use serde::{Deserialize, Serialize};

fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Model output is lenient: numbers may arrive as strings or be missing.
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Nutrients {
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub calories: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub protein: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub fat: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub fiber: f64,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub sugar: f64,
}

/// One recognised food item with estimated weight and nutrition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub name: String,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub estimated_weight_grams: f64,
    /// Kept equal to the estimate at analysis time; the client may adjust the
    /// estimate later while preserving the original.
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub original_weight_grams: f64,
    #[serde(default)]
    pub nutrients: Nutrients,
}

/// Normalized output of a food analysis (image or text input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodAnalysisResult {
    pub description: String,
    pub insight: String,
    pub items: Vec<FoodItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfc_ratio_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorption_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_advice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthIndicator {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub unit: String,
}

/// Structured extraction from a lab/medical report photo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthReportExtraction {
    #[serde(default)]
    pub indicators: Vec<HealthIndicator>,
    #[serde(default)]
    pub conclusions: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub medical_notes: String,
}
