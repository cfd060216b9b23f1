//! Canonical names derived from metadata records and from file paths.

use crate::domain::{
    ArtifactType, FLOWCELL_LANE, LIBRARY_ID, MetadataRecord, SAMPLE_BARCODE, SAMPLE_NAME,
};
use crate::error::SubmitError;

const LIBRARY_SUFFIX: &str = "-DL";
const SAMPLE_SUFFIX: &str = "-DS";
const COMPRESSED_EXTENSIONS: [&str; 4] = ["gz", "bz2", "xz", "zst"];

/// Local folder (and file) prefix for a record.
///
/// Reads use `barcode_libraryid_lane`, alignments the bare sample name.
pub fn derive_prefix(record: &MetadataRecord, kind: ArtifactType) -> Result<String, SubmitError> {
    match kind {
        ArtifactType::Reads => {
            let barcode = normalize_barcode(record.require(SAMPLE_BARCODE)?);
            let library = record.require(LIBRARY_ID)?;
            let lane = normalize_lane(record.require(FLOWCELL_LANE)?);
            Ok(format!("{barcode}_{library}_{lane}"))
        }
        ArtifactType::Alignment => Ok(record.require(SAMPLE_NAME)?.to_string()),
    }
}

/// Barcodes printed for the library (`-DL`) name the same sample as the
/// DNA sample barcode (`-DS`) used in folder names.
pub fn normalize_barcode(barcode: &str) -> String {
    match barcode.strip_suffix(LIBRARY_SUFFIX) {
        Some(stem) => format!("{stem}{SAMPLE_SUFFIX}"),
        None => barcode.to_string(),
    }
}

/// `1` and `001` become `L001`; anything else is kept as written.
pub fn normalize_lane(lane: &str) -> String {
    let trimmed = lane.trim();
    match trimmed.parse::<u32>() {
        Ok(number) if trimmed.chars().all(|ch| ch.is_ascii_digit()) => format!("L{number:03}"),
        _ => trimmed.to_string(),
    }
}

pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 => Some(&name[index + 1..]),
        _ => None,
    }
}

pub fn strip_extension(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 => name[..index].to_string(),
        _ => name.to_string(),
    }
}

pub fn strip_compressed_extension(path: &str) -> String {
    let stripped = strip_extension(path);
    if extension(path).is_some_and(|ext| COMPRESSED_EXTENSIONS.contains(&ext)) {
        strip_extension(&stripped)
    } else {
        stripped
    }
}

/// Read token of an Illumina style name: `X_R1_001.fastq.gz` gives `R1`.
pub fn read_token(path: &str) -> Option<String> {
    let stem = strip_compressed_extension(path);
    let parts = stem.split('_').collect::<Vec<_>>();
    if parts.len() < 2 {
        return None;
    }
    Some(parts[parts.len() - 2].to_string())
}
