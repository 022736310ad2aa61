use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::ReportStatus;

/// A verified report as persisted. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub image_path: String,
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
    pub ai_analysis: String,
    pub confidence: f64,
}

/// Fields supplied by the caller; the store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub lat: f64,
    pub lon: f64,
    pub image_path: String,
    pub status: ReportStatus,
    pub ai_analysis: String,
    pub confidence: f64,
}

impl NewReport {
    pub fn verified(lat: f64, lon: f64, image_path: String, ai_analysis: String, confidence: f64) -> Self {
        Self {
            lat,
            lon,
            image_path,
            status: ReportStatus::VerifiedHotspot,
            ai_analysis,
            confidence,
        }
    }

    pub fn into_report(self, id: i64, timestamp: DateTime<Utc>) -> Report {
        Report {
            id,
            lat: self.lat,
            lon: self.lon,
            image_path: self.image_path,
            status: self.status,
            timestamp,
            ai_analysis: self.ai_analysis,
            confidence: self.confidence,
        }
    }
}
