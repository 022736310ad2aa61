use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle state of a stored report. Only verified reports are ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ReportStatus {
    #[serde(rename = "Verified Hotspot")]
    #[strum(serialize = "Verified Hotspot")]
    VerifiedHotspot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubmitStatus {
    Success,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    pub message: String,
    pub details: String,
    pub confidence: f64,
}

/// Map-ready projection of a verified report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotView {
    pub lat: f64,
    pub lon: f64,
    pub status: ReportStatus,
    pub image: String,
    pub time: String,
    pub analysis: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
