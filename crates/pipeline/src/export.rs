use async_trait::async_trait;
use chrono::Local;
use extract::EntityRecord;
use std::path::PathBuf;
use tracing::info;

use crate::error::ExportError;

/// Receives the final entity set of a run and returns where it went.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, entities: &[EntityRecord]) -> Result<String, ExportError>;
}

/// Writes entities as a pretty-printed JSON array to
/// `<dir>/market_research_<YYYYmmdd_HHMMSS>.json`.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn report_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("market_research_{}.json", stamp))
    }
}

#[async_trait]
impl ExportSink for JsonFileSink {
    async fn export(&self, entities: &[EntityRecord]) -> Result<String, ExportError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.report_path();
        let body = serde_json::to_vec_pretty(entities)?;
        tokio::fs::write(&path, body).await?;

        let location = path.display().to_string();
        info!(path = %location, entities = entities.len(), "Report written");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::{EntityDetails, ReviewMetadata};
    use indexmap::IndexMap;

    fn acme() -> EntityRecord {
        EntityRecord {
            name: "Acme Cleaning".to_string(),
            services: vec!["Deep Clean".to_string()],
            pricing: IndexMap::from([("Deep Clean".to_string(), "$250".to_string())]),
            contact: "555-0100".to_string(),
            website: "https://acme.example".to_string(),
            rating: "4.5".to_string(),
            reviews: ReviewMetadata {
                total_reviews: "120".to_string(),
                highlights: vec!["Punctual".to_string()],
                concerns: Vec::new(),
            },
            details: EntityDetails::default(),
        }
    }

    #[tokio::test]
    async fn test_writes_timestamped_report() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("reports"));

        let location = sink.export(&[acme()]).await.unwrap();

        let file_name = PathBuf::from(&location)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(file_name.starts_with("market_research_"));
        assert!(file_name.ends_with(".json"));

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&location).unwrap()).unwrap();
        assert_eq!(written[0]["name"], "Acme Cleaning");
        assert_eq!(written[0]["pricing"]["Deep Clean"], "$250");
        assert_eq!(written[0]["reviews"]["total_reviews"], "120");
        // Empty details are left out of the report.
        assert!(written[0].get("details").is_none());
    }
}
