mod batcher;
pub mod encoding;
mod episgt;
mod split;
use clap::ValueEnum;
use std::path::{Path, PathBuf};

pub use batcher::BatchCursor;
pub use encoding::{EncodingMode, Label, OneHot};
pub use episgt::DatasetError;
use episgt::read_episgt;
pub use split::train_test_split;

/// Fraction of every cell line held out for testing.
pub const TEST_FRACTION: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CellLine {
    Hct116,
    Hek293t,
    Hela,
    Hl60,
}

impl CellLine {
    pub const ALL: [CellLine; 4] = [
        CellLine::Hct116,
        CellLine::Hek293t,
        CellLine::Hela,
        CellLine::Hl60,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CellLine::Hct116 => "hct116",
            CellLine::Hek293t => "hek293t",
            CellLine::Hela => "hela",
            CellLine::Hl60 => "hl60",
        }
    }

    /// File name and record count of the published dataset.
    fn source(self) -> (&'static str, usize) {
        match self {
            CellLine::Hct116 => ("hct116.episgt", 4239),
            CellLine::Hek293t => ("hek293t.episgt", 4666),
            CellLine::Hela => ("hela.episgt", 8101),
            CellLine::Hl60 => ("hl60.episgt", 2076),
        }
    }

    pub fn config(self, data_dir: &Path) -> DatasetConfig {
        let (file, count) = self.source();
        DatasetConfig {
            name: self.name().to_string(),
            path: data_dir.join(file),
            expected_records: Some(count),
        }
    }
}

/// Where one dataset lives and how large it should be.
#[derive(Clone, Debug)]
pub struct DatasetConfig {
    pub name: String,
    pub path: PathBuf,
    pub expected_records: Option<usize>,
}

/// Parallel one-hot images and labels.
#[derive(Clone, Debug, Default)]
pub struct SequenceSet {
    images: Vec<OneHot>,
    labels: Vec<Label>,
}

impl SequenceSet {
    pub fn new(images: Vec<OneHot>, labels: Vec<Label>) -> Self {
        assert_eq!(
            images.len(),
            labels.len(),
            "images: {} labels: {}",
            images.len(),
            labels.len()
        );
        Self { images, labels }
    }

    pub fn push(&mut self, image: OneHot, label: Label) {
        self.images.push(image);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[OneHot] {
        &self.images
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn classes(&self) -> Vec<u8> {
        self.labels.iter().map(encoding::class_of).collect()
    }

    /// Flattened `SEQ_LEN * ALPHABET_LEN` feature rows.
    pub fn features(&self) -> Vec<Vec<f32>> {
        self.images.iter().map(encoding::flatten).collect()
    }

    pub fn select(&self, indices: &[usize]) -> SequenceSet {
        SequenceSet::new(
            indices.iter().map(|&i| self.images[i]).collect(),
            indices.iter().map(|&i| self.labels[i]).collect(),
        )
    }

    pub fn into_parts(self) -> (Vec<OneHot>, Vec<Label>) {
        (self.images, self.labels)
    }
}

pub fn get_dataset(config: &DatasetConfig, mode: EncodingMode) -> Result<SequenceSet, DatasetError> {
    log::info!("Load dataset: {} from {}", config.name, config.path.display());
    let set = read_episgt(&config.path, mode)?;
    if let Some(expected) = config.expected_records {
        if expected != set.len() {
            log::warn!(
                "{}: expected {expected} records, read {}",
                config.name,
                set.len()
            );
        }
    }
    Ok(set)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::encoding::{ALPHABET, ALPHABET_LEN, SEQ_LEN};
    use super::*;

    /// `n` distinct sequences, record `i` spells `i` in base 4 and carries
    /// `label_of(i)`.
    pub fn toy_set(n: usize, label_of: impl Fn(usize) -> u8) -> SequenceSet {
        let mut set = SequenceSet::default();
        for i in 0..n {
            let mut seq = [ALPHABET[0]; SEQ_LEN];
            let mut rest = i;
            for slot in seq.iter_mut().rev() {
                *slot = ALPHABET[rest % ALPHABET_LEN];
                rest /= ALPHABET_LEN;
            }
            let (image, _) = encoding::encode_sequence(&seq, EncodingMode::Strict).unwrap();
            let label = if label_of(i) == 1 { [0.0, 1.0] } else { [1.0, 0.0] };
            set.push(image, label);
        }
        set
    }

    /// Inverse of the numbering used by [`toy_set`].
    pub fn toy_index(image: &OneHot) -> usize {
        image.iter().fold(0, |acc, row| {
            let digit = row.iter().position(|&v| v == 1.0).unwrap();
            acc * ALPHABET_LEN + digit
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_against_data_dir() {
        let cfg = CellLine::Hela.config(Path::new("/data"));
        assert_eq!(cfg.path, PathBuf::from("/data/hela.episgt"));
        assert_eq!(cfg.expected_records, Some(8101));
        assert_eq!(CellLine::Hl60.config(Path::new(".")).expected_records, Some(2076));
    }

    #[test]
    fn get_dataset_tolerates_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hl60.episgt"),
            "ACGTACGTACGTACGTACGTAGG\t1\n",
        )
        .unwrap();
        let set = get_dataset(&CellLine::Hl60.config(dir.path()), EncodingMode::Strict).unwrap();
        assert_eq!(set.len(), 1);
    }
}
