//! Reader for the `.episgt` on-target files: one `<sequence>\t<label>` per line.

use super::encoding::{encode_label, encode_sequence, EncodeError, EncodingMode};
use super::SequenceSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}:{line}: expected 2 tab-separated fields, found {found}", .path.display())]
    FieldCount { path: PathBuf, line: u64, found: usize },
    #[error("{}:{line}: {source}", .path.display())]
    Record {
        path: PathBuf,
        line: u64,
        #[source]
        source: EncodeError,
    },
    #[error("{} contains no records", .path.display())]
    Empty { path: PathBuf },
}

pub fn read_episgt(path: &Path, mode: EncodingMode) -> Result<SequenceSet, DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .map_err(csv_err)?;

    let mut set = SequenceSet::default();
    let mut record = csv::ByteRecord::new();
    let mut line = 0u64;
    while reader.read_byte_record(&mut record).map_err(csv_err)? {
        line = record.position().map_or(line + 1, |p| p.line());
        if record.len() != 2 {
            return Err(DatasetError::FieldCount {
                path: path.to_path_buf(),
                line,
                found: record.len(),
            });
        }
        let wrap = |source| DatasetError::Record {
            path: path.to_path_buf(),
            line,
            source,
        };
        let (image, unknown) = encode_sequence(&record[0], mode).map_err(wrap)?;
        if unknown > 0 {
            log::warn!(
                "{}:{line}: {unknown} unknown nucleotide(s) encoded as zero rows",
                path.display()
            );
        }
        let label = encode_label(&String::from_utf8_lossy(&record[1])).map_err(wrap)?;
        set.push(image, label);
    }

    if set.is_empty() {
        return Err(DatasetError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(set)
}
