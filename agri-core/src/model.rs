use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use std::fmt;

use crate::error::{ApiError, ApiResult};

/// Placeholder shown for a name the backend did not provide.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Which classifier an image is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Disease,
    Pest,
}

impl DetectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Disease => "disease",
            DetectionKind::Pest => "pest",
        }
    }

    /// Backend route relative to the base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DetectionKind::Disease => "disease-prediction/",
            DetectionKind::Pest => "pest-prediction/",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classifier score as reported by the backend, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(pub f64);

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Backends report scores either as numbers (`92.3`) or as formatted
/// strings (`"92.30%"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPercent {
    Number(f64),
    Text(String),
}

impl RawPercent {
    fn value(self) -> Result<f64, String> {
        match self {
            RawPercent::Number(n) => Ok(n),
            RawPercent::Text(s) => {
                let trimmed = s.trim().trim_end_matches('%').trim_end();
                trimmed.parse().map_err(|_| format!("invalid confidence value '{s}'"))
            }
        }
    }
}

fn percent<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    RawPercent::deserialize(d)?.value().map_err(D::Error::custom)
}

fn optional_percent<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Option::<RawPercent>::deserialize(d)?
        .map(|raw| raw.value().map_err(D::Error::custom))
        .transpose()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(alias = "pest", alias = "disease", alias = "class")]
    pub label: String,
    #[serde(default, deserialize_with = "percent")]
    pub confidence: f64,
}

/// Raw `/disease-prediction/` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiseasePrediction {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub predicted_class: Option<String>,
    pub plant: Option<String>,
    pub disease: Option<String>,
    #[serde(default, deserialize_with = "optional_percent")]
    pub confidence: Option<f64>,
    pub is_healthy: Option<bool>,
    #[serde(default)]
    pub top_3_predictions: Vec<Candidate>,
}

/// Raw `/pest-prediction/` payload. Older backends name the label `predicted_pest`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PestPrediction {
    pub success: Option<bool>,
    pub error: Option<String>,
    #[serde(alias = "predicted_pest")]
    pub pest: Option<String>,
    #[serde(default, deserialize_with = "optional_percent")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub top_3_predictions: Vec<Candidate>,
}

/// A prediction normalised for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub kind: DetectionKind,
    pub plant: Option<String>,
    /// Disease or pest name.
    pub name: String,
    pub confidence: Option<Confidence>,
    pub healthy: bool,
    pub candidates: Vec<Candidate>,
}

impl Diagnosis {
    /// Whether a "get solution" question makes sense for this result.
    pub fn needs_solution(&self) -> bool {
        !self.healthy && self.name != UNKNOWN_LABEL
    }
}

fn check_envelope(success: Option<bool>, error: Option<String>) -> ApiResult<()> {
    match (success, error) {
        (_, Some(err)) if !err.trim().is_empty() => Err(ApiError::Backend(err)),
        (Some(false), _) => Err(ApiError::Backend("Prediction failed".to_string())),
        _ => Ok(()),
    }
}

impl DiseasePrediction {
    pub fn into_diagnosis(self) -> ApiResult<Diagnosis> {
        check_envelope(self.success, self.error)?;

        let (parsed_plant, name) = match self.disease.or(self.predicted_class) {
            Some(label) => split_class_label(&label),
            None => (None, String::new()),
        };
        let name = if name.is_empty() { UNKNOWN_LABEL.to_string() } else { name };
        let plant = self.plant.map(|p| humanize(&p)).filter(|p| !p.is_empty()).or(parsed_plant);
        let healthy =
            self.is_healthy.unwrap_or_else(|| name.to_lowercase().contains("healthy"));

        Ok(Diagnosis {
            kind: DetectionKind::Disease,
            plant,
            name,
            confidence: self.confidence.map(Confidence),
            healthy,
            candidates: self.top_3_predictions,
        })
    }
}

impl PestPrediction {
    pub fn into_diagnosis(self) -> ApiResult<Diagnosis> {
        check_envelope(self.success, self.error)?;

        let name = self.pest.map(|p| humanize(&p)).filter(|p| !p.is_empty());

        Ok(Diagnosis {
            kind: DetectionKind::Pest,
            plant: None,
            name: name.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            confidence: self.confidence.map(Confidence),
            healthy: false,
            candidates: self.top_3_predictions,
        })
    }
}

/// Split a combined class label such as `Tomato___Late_blight` into plant and
/// condition. The separator is the first run of two or more underscores.
pub fn split_class_label(label: &str) -> (Option<String>, String) {
    match label.find("__") {
        Some(idx) => {
            let plant = humanize(&label[..idx]);
            let rest = label[idx..].trim_start_matches('_');
            (Some(plant).filter(|p| !p.is_empty()), humanize(rest))
        }
        None => (None, humanize(label)),
    }
}

/// Underscores become spaces; whitespace is collapsed and trimmed.
pub fn humanize(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// `/crop-advice/` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AdviceResponse {
    pub advice: String,
}

/// `/set-location/` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationAck {
    pub message: Option<String>,
}

impl LocationAck {
    pub fn confirmation(&self, location: &str) -> String {
        match self.message.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => format!("Location set to {location}!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub text: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub maxtemp_c: Option<f64>,
    pub mintemp_c: Option<f64>,
    pub daily_chance_of_rain: Option<f64>,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: Option<String>,
    pub day: DaySummary,
}

/// `/weather/` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub temperature: f64,
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub conditions: String,
    pub humidity: f64,
    #[serde(default)]
    pub rainfall: f64,
    pub wind_speed: f64,
    pub wind_direction: Option<String>,
    pub cloud_cover: Option<f64>,
    pub uv_index: f64,
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
}

impl WeatherReport {
    pub fn display_name(&self) -> String {
        match self.region.as_deref().filter(|r| !r.is_empty()) {
            Some(region) => format!("{}, {}", self.location, region),
            None => self.location.clone(),
        }
    }

    /// Today's condition, taken from the first forecast day.
    pub fn today(&self) -> Option<&Condition> {
        self.forecast.first().map(|d| &d.day.condition)
    }

    pub fn condition_text(&self) -> &str {
        match self.today() {
            Some(c) if !c.text.is_empty() => &c.text,
            _ => &self.conditions,
        }
    }

    pub fn icon_url(&self) -> Option<String> {
        self.today().and_then(|c| c.icon.as_deref()).map(resolve_icon_url)
    }
}

/// The backend hands out protocol-relative icon URLs (`//cdn...`).
pub fn resolve_icon_url(icon: &str) -> String {
    if icon.starts_with("//") { format!("https:{icon}") } else { icon.to_string() }
}
