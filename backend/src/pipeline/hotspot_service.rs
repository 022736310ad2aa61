use chrono::SecondsFormat;
use shared::HotspotView;
use std::sync::Arc;
use url::Url;

use crate::db::models::Report;
use crate::db::report_repository::{ReportStore, RepositoryError};

/// Read side: every verified report, shaped for the map.
#[derive(Clone)]
pub struct HotspotService {
    reports: Arc<dyn ReportStore>,
    public_base: Url,
}

impl HotspotService {
    pub fn new(reports: Arc<dyn ReportStore>, public_base: Url) -> Self {
        Self {
            reports,
            public_base,
        }
    }

    pub async fn list_hotspots(&self) -> Result<Vec<HotspotView>, RepositoryError> {
        let reports = self.reports.list_all().await?;
        Ok(reports.into_iter().map(|r| self.to_view(r)).collect())
    }

    fn image_url(&self, image_path: &str) -> String {
        match self.public_base.join(image_path) {
            Ok(url) => url.to_string(),
            Err(e) => {
                log::warn!("Cannot build image URL for {}: {}", image_path, e);
                format!("{}{}", self.public_base, image_path)
            }
        }
    }

    fn to_view(&self, report: Report) -> HotspotView {
        HotspotView {
            lat: report.lat,
            lon: report.lon,
            status: report.status,
            image: self.image_url(&report.image_path),
            time: report.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            analysis: report.ai_analysis,
            confidence: report.confidence,
        }
    }
}
