//! Label store for classification models.
//!
//! Labels are indexed by class id, so loading never drops, trims or
//! reorders entries. Supported sources:
//! - Plain text (one label per line, the default)
//! - CSV (header row, label in the second column)
//! - JSON (array of strings or an object with a `labels` field)

use super::error::ClassifierError;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Label reported for class indices beyond the end of the label set.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Ordered, immutable list of class labels. Index = class id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Read one label per line from any byte stream.
    ///
    /// Blank lines are kept as empty labels so that positions still line up
    /// with the model's output indices. `\r\n` endings are accepted.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ClassifierError> {
        read_lines(BufReader::new(reader), "label resource")
    }

    /// Load labels from a file, picking the format from its extension.
    ///
    /// `.csv` and `.json` get their dedicated parsers; everything else is
    /// read as plain text.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::Resource`] when the file cannot be opened or
    /// read, and [`ClassifierError::LabelFormat`] when a CSV or JSON file is
    /// malformed.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => load_labels_from_csv(path),
            Some("json") => load_labels_from_json(path),
            _ => load_labels_from_text(path),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Label for `index`, or [`UNKNOWN_LABEL`] when out of range.
    pub fn label_or_unknown(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl From<Vec<String>> for LabelSet {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl<'a> FromIterator<&'a str> for LabelSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(String::from).collect())
    }
}

/// Load labels from a plain text file, one per line.
///
/// ```text
/// background
/// cat
/// dog
/// ```
pub fn load_labels_from_text(path: &Path) -> Result<LabelSet, ClassifierError> {
    let resource = path.display().to_string();
    let file = File::open(path).map_err(|e| ClassifierError::resource(resource.clone(), e))?;
    read_lines(BufReader::new(file), &resource)
}

/// Load labels from a CSV file with a header row.
///
/// The label is taken verbatim from the second column; every record must
/// have one, since skipping a row would shift all later class ids.
///
/// ```csv
/// id,name,category
/// 0,cat,animal
/// 1,dog,animal
/// ```
pub fn load_labels_from_csv(path: &Path) -> Result<LabelSet, ClassifierError> {
    let resource = path.display().to_string();
    let file = File::open(path).map_err(|e| ClassifierError::resource(resource.clone(), e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut labels = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ClassifierError::LabelFormat {
            resource: resource.clone(),
            reason: format!("invalid label record: {}", e),
        })?;
        let name = record.get(1).ok_or_else(|| ClassifierError::LabelFormat {
            resource: resource.clone(),
            reason: format!("record {} has no label column", row + 1),
        })?;
        labels.push(name.to_string());
    }

    Ok(LabelSet::new(labels))
}

/// Load labels from a JSON file.
///
/// Accepts either `["cat", "dog"]` or `{ "labels": ["cat", "dog"] }`.
pub fn load_labels_from_json(path: &Path) -> Result<LabelSet, ClassifierError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LabelDocument {
        List(Vec<String>),
        Object { labels: Vec<String> },
    }

    let resource = path.display().to_string();
    let file = File::open(path).map_err(|e| ClassifierError::resource(resource.clone(), e))?;
    let document: LabelDocument =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| ClassifierError::LabelFormat {
            resource,
            reason: e.to_string(),
        })?;

    let labels = match document {
        LabelDocument::List(labels) | LabelDocument::Object { labels } => labels,
    };
    Ok(LabelSet::new(labels))
}

fn read_lines<R: BufRead>(reader: R, resource: &str) -> Result<LabelSet, ClassifierError> {
    let labels = reader
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClassifierError::resource(resource, e))?;
    Ok(LabelSet::new(labels))
}
