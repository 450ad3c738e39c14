use clap::ValueEnum;
use thiserror::Error;

/// Nucleotides in one-hot column order.
pub const ALPHABET: [u8; 4] = *b"ACGT";
pub const ALPHABET_LEN: usize = ALPHABET.len();
/// sgRNA target length, 20nt protospacer + 3nt PAM.
pub const SEQ_LEN: usize = 23;
pub const NUM_CLASSES: usize = 2;

/// `(SEQ_LEN, ALPHABET_LEN)` one-hot matrix of a single sequence.
pub type OneHot = [[f32; ALPHABET_LEN]; SEQ_LEN];
/// One-hot editing-efficiency label, `[low, high]`.
pub type Label = [f32; NUM_CLASSES];

/// How to treat symbols outside of `ACGT`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EncodingMode {
    /// Reject the record.
    #[default]
    Strict,
    /// Encode the position as an all-zero row.
    Lenient,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("sequence has length {len}, expected {SEQ_LEN}")]
    Length { len: usize },
    #[error("unknown nucleotide {symbol:?} at position {pos}")]
    Symbol { pos: usize, symbol: char },
    #[error("label {raw:?} is not 0 or 1")]
    Label { raw: String },
}

fn column_of(symbol: u8) -> Option<usize> {
    ALPHABET.iter().position(|&c| c == symbol)
}

/// Order-preserving one-hot encoding of a sequence of any length.
///
/// Row `i` holds a single 1 in the column of `seq[i]`. In lenient mode an
/// unknown symbol leaves its row at zero, the number of such rows is
/// returned alongside the matrix so callers can report it.
pub fn one_hot(seq: &[u8], mode: EncodingMode) -> Result<(Vec<[f32; ALPHABET_LEN]>, usize), EncodeError> {
    let mut rows = vec![[0f32; ALPHABET_LEN]; seq.len()];
    let mut unknown = 0;
    for (pos, (&symbol, row)) in seq.iter().zip(rows.iter_mut()).enumerate() {
        match (column_of(symbol), mode) {
            (Some(col), _) => row[col] = 1.0,
            (None, EncodingMode::Lenient) => unknown += 1,
            (None, EncodingMode::Strict) => {
                return Err(EncodeError::Symbol {
                    pos,
                    symbol: symbol as char,
                })
            }
        }
    }
    Ok((rows, unknown))
}

/// Encodes a full-length target sequence into a fixed-size matrix.
pub fn encode_sequence(seq: &[u8], mode: EncodingMode) -> Result<(OneHot, usize), EncodeError> {
    if seq.len() != SEQ_LEN {
        return Err(EncodeError::Length { len: seq.len() });
    }
    let (rows, unknown) = one_hot(seq, mode)?;
    let mut image = [[0f32; ALPHABET_LEN]; SEQ_LEN];
    image.copy_from_slice(&rows);
    Ok((image, unknown))
}

pub fn encode_label(raw: &str) -> Result<Label, EncodeError> {
    match raw.trim() {
        "0" => Ok([1.0, 0.0]),
        "1" => Ok([0.0, 1.0]),
        other => Err(EncodeError::Label {
            raw: other.to_string(),
        }),
    }
}

/// Index of the hot entry of a one-hot label.
pub fn class_of(label: &Label) -> u8 {
    if label[1] > label[0] {
        1
    } else {
        0
    }
}

/// Row-major flattening, used as the feature vector of tree models.
pub fn flatten(image: &OneHot) -> Vec<f32> {
    image.iter().flatten().copied().collect()
}
