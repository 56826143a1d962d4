//! Rebuild the cross-source summary from the documents on disk.

use crate::{
    config::SnowConfig,
    explore::{SourceKind, SUMMARY_FILE},
    write_json,
};
use log::info;
use serde_json::Value;
use snow_data::summary::{merge, SourceReport, Summary};
use std::path::Path;

/// One report per known source. Missing or unreadable documents become
/// failed reports rather than being skipped.
pub fn load_reports(data_dir: &Path) -> Vec<SourceReport> {
    SourceKind::ALL
        .iter()
        .map(|kind| {
            let path = data_dir.join(kind.document());
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    return SourceReport::failed(
                        kind.name(),
                        "MissingDocument",
                        format!("{}: {}", path.display(), e),
                    )
                }
            };
            match serde_json::from_str::<Value>(&text) {
                Ok(doc) => SourceReport::from_document(kind.name(), &doc),
                Err(e) => SourceReport::failed(
                    kind.name(),
                    "MalformedDocument",
                    format!("{}: {}", path.display(), e),
                ),
            }
        })
        .collect()
}

pub fn run_summarize(config: &SnowConfig) -> anyhow::Result<Summary> {
    let summary = merge(&load_reports(&config.data_dir));
    for (name, status) in &summary.run_status {
        info!("{name:15}: {status}");
    }
    let path = write_json(&config.data_dir, SUMMARY_FILE, &summary)?;
    info!("Summary saved to {}", path.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_malformed_documents_are_reported() {
        let dir = std::env::temp_dir().join(format!("snow-summary-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("daymet_sample.json"),
            json!({
                "date_range": { "start": "1980-01-01", "end": "2024-12-31" },
                "bands": ["dayl", "prcp", "srad", "swe", "tmax", "tmin", "vp"],
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(dir.join("gridmet_sample.json"), "{ not json").unwrap();

        let reports = load_reports(&dir);
        assert_eq!(reports.len(), 6);
        let summary = merge(&reports);
        assert_eq!(summary.run_status["Daymet V4"], "OK");
        assert_eq!(summary.datasets["Daymet V4"].bands.len(), 5);
        assert!(summary.run_status["gridMET"].starts_with("FAIL (MalformedDocument)"));
        assert!(summary.run_status["SNODAS"].starts_with("FAIL (MissingDocument)"));
        assert!(summary.datasets["SNODAS"].error.is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
