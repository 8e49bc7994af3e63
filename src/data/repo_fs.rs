//! Filesystem loader for headered CSV training data.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::common::error::TrainingError;

use super::domain::{Dataset, RawRecord, RawValue};

/// Options controlling how CSV cells are interpreted.
#[derive(Clone, Debug)]
pub struct CsvOptions {
    /// Cells equal to one of these (after trimming) are treated as absent.
    pub missing_markers: Vec<String>,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            missing_markers: vec![String::new(), "?".to_string()],
            delimiter: b',',
        }
    }
}

/// Read a headered CSV file into a [`Dataset`].
pub fn read_csv(path: &Path, opts: &CsvOptions) -> Result<Dataset, TrainingError> {
    let file = File::open(path)
        .map_err(|e| TrainingError::InvalidDataset(format!("{}: {e}", path.display())))?;
    let dataset = read_csv_from(file, opts)?;
    debug!(path = %path.display(), rows = dataset.len(), "dataset loaded");
    Ok(dataset)
}

/// Read headered CSV from any reader.
pub fn read_csv_from<R: Read>(reader: R, opts: &CsvOptions) -> Result<Dataset, TrainingError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = rdr
        .headers()
        .map_err(|e| TrainingError::InvalidDataset(format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| TrainingError::InvalidDataset(format!("row {idx}: {e}")))?;
        let row: RawRecord = header
            .iter()
            .zip(record.iter())
            .filter(|(_, cell)| !opts.missing_markers.iter().any(|m| m == cell.trim()))
            .map(|(name, cell)| (name.clone(), RawValue::Text(cell.trim().to_string())))
            .collect();
        rows.push(row);
    }

    Ok(Dataset::new(header, rows)?)
}
