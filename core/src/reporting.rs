use crate::classifier::Recognition;
use crate::scanner::ScanSummary;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const REPORT_VERSION: u32 = 1;

/// JSON document written by `sightline scan --output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub version: u32,
    pub generated_at: String,
    pub root: PathBuf,
    pub summary: ScanSummary,
}

impl ScanReport {
    pub fn new(root: PathBuf, summary: ScanSummary) -> Self {
        Self {
            version: REPORT_VERSION,
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("unknown")),
            root,
            summary,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("io error for {}: {source}", .path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub fn print_recognitions(path: &Path, recognitions: &[Recognition]) {
    println!("{}", path.display());
    if recognitions.is_empty() {
        println!("  (no result above threshold)");
    }
    for (rank, recognition) in recognitions.iter().enumerate() {
        println!(
            "  {}. [{}] {} ({:.1}%)",
            rank + 1,
            recognition.id,
            recognition.label,
            recognition.confidence * 100.0
        );
    }
}

pub fn print_results(summary: &ScanSummary) {
    for entry in summary.classified() {
        print_recognitions(&entry.path, &entry.recognitions);
        println!();
    }

    let failed: Vec<_> = summary.failed().collect();
    if !failed.is_empty() {
        println!("Failed:");
        for entry in failed {
            println!(
                "  {}: {}",
                entry.path.display(),
                entry.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

pub fn create_report(root: &Path, summary: ScanSummary) -> ScanReport {
    ScanReport::new(root.to_path_buf(), summary)
}

pub fn write_json<P: AsRef<Path>>(report: &ScanReport, path: P) -> Result<(), ReportingError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ReportingError::Io {
            source,
            path: parent.to_path_buf(),
        })?;
    }
    let file = File::create(path).map_err(|source| ReportingError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    tracing::debug!(path = %path.display(), "report written");
    Ok(())
}

pub fn read_report<P: AsRef<Path>>(path: P) -> Result<ScanReport, ReportingError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ReportingError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanEntry;
    use tempfile::tempdir;

    fn summary() -> ScanSummary {
        ScanSummary {
            entries: vec![
                ScanEntry {
                    path: PathBuf::from("a.jpg"),
                    dimensions: (640, 480),
                    recognitions: vec![Recognition {
                        id: String::from("1"),
                        label: String::from("dog"),
                        confidence: 0.82,
                    }],
                    error: None,
                },
                ScanEntry {
                    path: PathBuf::from("b.jpg"),
                    dimensions: (0, 0),
                    recognitions: Vec::new(),
                    error: Some(String::from("image error: bad header")),
                },
            ],
        }
    }

    #[test]
    fn writes_and_reads_report() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("reports").join("scan.json");
        let report = create_report(Path::new("photos"), summary());

        write_json(&report, &output).unwrap();
        let loaded = read_report(&output).unwrap();

        assert_eq!(loaded, report);
        assert_eq!(loaded.version, REPORT_VERSION);
        assert_eq!(loaded.root, PathBuf::from("photos"));
        assert_eq!(loaded.summary.failed().count(), 1);
    }

    #[test]
    fn report_timestamp_is_rfc3339() {
        let report = create_report(Path::new("."), ScanSummary::default());
        assert!(OffsetDateTime::parse(&report.generated_at, &Rfc3339).is_ok());
    }

    #[test]
    fn failed_entries_omit_recognitions_in_json() {
        let report = create_report(Path::new("."), summary());
        let json = serde_json::to_value(&report).unwrap();
        let failed = &json["summary"]["entries"][1];
        assert!(failed.get("recognitions").is_none());
        assert_eq!(failed["error"], "image error: bad header");
        assert!(json["summary"]["entries"][0].get("error").is_none());
    }

    #[test]
    fn reading_missing_report_reports_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = read_report(&missing).unwrap_err();
        assert!(matches!(err, ReportingError::Io { ref path, .. } if path == &missing));
    }
}
