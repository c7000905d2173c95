//! Record types kept in the record store.
//!
//! Field names serialize as camelCase, matching the layout the prototype
//! wrote to browser storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Record};

/// Patient status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Referred,
    Discharged,
}

impl PatientStatus {
    pub const ALL: [PatientStatus; 3] = [
        PatientStatus::Active,
        PatientStatus::Referred,
        PatientStatus::Discharged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Referred => "referred",
            PatientStatus::Discharged => "discharged",
        }
    }
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PatientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "referred" => Ok(Self::Referred),
            "discharged" => Ok(Self::Discharged),
            _ => Err(format!("Unknown patient status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    /// Whole years, computed once at registration
    pub age: u32,
    pub gender: String,
    pub condition: String,
    pub status: PatientStatus,
    pub last_visit: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upcoming_appointment: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Record for Patient {
    const COLLECTION: Collection = Collection::Patients;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Imaging modality of an analysis submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageModality {
    Xray,
    Mri,
    Ct,
    Ultrasound,
    Pathology,
    Other,
}

impl Default for ImageModality {
    fn default() -> Self {
        Self::Xray
    }
}

impl ImageModality {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Xray => "X-Ray",
            Self::Mri => "MRI",
            Self::Ct => "CT Scan",
            Self::Ultrasound => "Ultrasound",
            Self::Pathology => "Pathology",
            Self::Other => "Other",
        }
    }
}

impl std::str::FromStr for ImageModality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xray" | "x-ray" => Ok(Self::Xray),
            "mri" => Ok(Self::Mri),
            "ct" => Ok(Self::Ct),
            "ultrasound" => Ok(Self::Ultrasound),
            "pathology" => Ok(Self::Pathology),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown image type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Completed,
}

/// Fixed payload returned in simulated mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedFindings {
    pub diagnosis: String,
    pub confidence: f32,
    pub alternatives: Vec<String>,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl SimulatedFindings {
    pub fn canned() -> Self {
        Self {
            diagnosis: "Simulated diagnosis results (API key not provided)".to_string(),
            confidence: 0.85,
            alternatives: vec![
                "Alternative diagnosis 1".to_string(),
                "Alternative diagnosis 2".to_string(),
            ],
            findings: vec![
                "Finding 1".to_string(),
                "Finding 2".to_string(),
                "Finding 3".to_string(),
            ],
            recommendations: vec![
                "Recommendation 1".to_string(),
                "Recommendation 2".to_string(),
            ],
        }
    }
}

/// Outcome payload of a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisResult {
    /// No credential configured; canned findings
    Simulated(SimulatedFindings),
    /// Free text from the first candidate of a live response
    Generated { text: String },
}

impl AnalysisResult {
    pub const SUCCESS_MESSAGE: &'static str = "Analysis completed successfully";

    pub fn is_simulated(&self) -> bool {
        matches!(self, AnalysisResult::Simulated(_))
    }

    /// One-line headline for lists
    pub fn headline(&self) -> String {
        match self {
            AnalysisResult::Simulated(findings) => format!(
                "{} ({:.0}%)",
                findings.diagnosis,
                findings.confidence * 100.0
            ),
            AnalysisResult::Generated { text } => text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("(empty response)")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub patient_id: String,
    pub created_at: DateTime<Utc>,
    pub image_type: ImageModality,
    pub notes: String,
    pub status: AnalysisStatus,
    pub result: AnalysisResult,
}

impl Record for Analysis {
    const COLLECTION: Collection = Collection::Analyses;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Record for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Read by the dashboard; nothing writes these yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCase {
    pub id: String,
    pub patient_id: String,
    pub diagnosis: String,
}

impl Record for SavedCase {
    const COLLECTION: Collection = Collection::SavedCases;

    fn id(&self) -> &str {
        &self.id
    }
}
