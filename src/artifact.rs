use serde::Serialize;

use crate::domain::{
    ArtifactType, FLOWCELL_LANE, LIBRARY_ID, MetadataAttribute, MetadataRecord, SAMPLE_BARCODE,
    SAMPLE_NAME,
};
use crate::error::SubmitError;
use crate::naming;
use crate::resolve::ResolvedFileSet;

pub const PAIR_END_READ_KEY: &str = "pair_end_read";
pub const PAIRED_READS_KEY: &str = "paired_reads";
const STRING_UNIT: &str = "String";
const FASTQ_CHUNK: &str = "001";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Read1,
    Read2,
    Alignment,
    AlignmentIndex,
}

impl FileRole {
    pub fn read_token(self) -> Option<&'static str> {
        match self {
            FileRole::Read1 => Some("R1"),
            FileRole::Read2 => Some("R2"),
            FileRole::Alignment | FileRole::AlignmentIndex => None,
        }
    }
}

/// What differs between artifact kinds. Resolution and synthesis only go
/// through this trait.
pub trait ArtifactKind {
    fn artifact_type(&self) -> ArtifactType;

    /// Fields that must be present before a record is resolved.
    fn identity_fields(&self) -> &'static [&'static str];

    /// Key that must be unique across one batch.
    fn identity_key(&self, record: &MetadataRecord) -> Result<String, SubmitError>;

    fn prefix(&self, record: &MetadataRecord) -> Result<String, SubmitError> {
        naming::derive_prefix(record, self.artifact_type())
    }

    /// Whether a local folder called `name` holds the files for `prefix`.
    /// By default a run suffix (`prefix_<run>`) is accepted too.
    fn matches_dir(&self, name: &str, prefix: &str) -> bool {
        name.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
    }

    /// Primary files in transfer order. Every role also gets a checksum sidecar.
    fn expected_roles(&self) -> &'static [FileRole];

    /// Files that receive metadata.
    fn metadata_roles(&self) -> &'static [FileRole];

    /// File name for `role` inside the matched local folder `dir_name`.
    fn file_name(
        &self,
        dir_name: &str,
        record: &MetadataRecord,
        role: FileRole,
    ) -> Result<String, SubmitError>;

    fn derive_container_name(&self, files: &ResolvedFileSet) -> String;

    /// Keys this kind adds on top of the sheet's own attributes.
    fn synthetic_keys(&self) -> &'static [&'static str];

    fn synthetic_metadata(
        &self,
        record: &MetadataRecord,
        role: FileRole,
    ) -> Result<Vec<MetadataAttribute>, SubmitError>;
}

pub fn kind_for(artifact: ArtifactType) -> Box<dyn ArtifactKind> {
    match artifact {
        ArtifactType::Reads => Box::new(PairedReads),
        ArtifactType::Alignment => Box::new(Alignment),
    }
}

pub fn fastq_name(prefix: &str, role: FileRole) -> Option<String> {
    role.read_token()
        .map(|token| format!("{prefix}_{token}_{FASTQ_CHUNK}.fastq.gz"))
}

/// Paired-end Illumina FASTQ: `<folder>/<folder>_R{1,2}_001.fastq.gz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairedReads;

impl ArtifactKind for PairedReads {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::Reads
    }

    fn identity_fields(&self) -> &'static [&'static str] {
        &[SAMPLE_BARCODE, LIBRARY_ID, FLOWCELL_LANE]
    }

    fn identity_key(&self, record: &MetadataRecord) -> Result<String, SubmitError> {
        Ok(naming::normalize_barcode(record.require(SAMPLE_BARCODE)?))
    }

    fn expected_roles(&self) -> &'static [FileRole] {
        &[FileRole::Read1, FileRole::Read2]
    }

    fn metadata_roles(&self) -> &'static [FileRole] {
        &[FileRole::Read1, FileRole::Read2]
    }

    fn file_name(
        &self,
        dir_name: &str,
        record: &MetadataRecord,
        role: FileRole,
    ) -> Result<String, SubmitError> {
        fastq_name(dir_name, role).ok_or_else(|| SubmitError::MissingFile {
            record: record.location().clone(),
            path: format!("{dir_name} ({role:?})"),
        })
    }

    fn derive_container_name(&self, files: &ResolvedFileSet) -> String {
        // Reads are uploaded under the name of the folder that holds them.
        files
            .file(FileRole::Read1)
            .and_then(|file| file.path.parent())
            .map(|parent| naming::basename(parent.as_str()).to_string())
            .unwrap_or_else(|| naming::basename(files.container_dir.as_str()).to_string())
    }

    fn synthetic_keys(&self) -> &'static [&'static str] {
        &[PAIR_END_READ_KEY]
    }

    fn synthetic_metadata(
        &self,
        _record: &MetadataRecord,
        role: FileRole,
    ) -> Result<Vec<MetadataAttribute>, SubmitError> {
        let value = match role {
            FileRole::Read1 => "Read1",
            FileRole::Read2 => "Read2",
            FileRole::Alignment | FileRole::AlignmentIndex => return Ok(Vec::new()),
        };
        Ok(vec![MetadataAttribute::new(
            PAIR_END_READ_KEY,
            value,
            STRING_UNIT,
        )])
    }
}

/// CRAM alignment with its index: `<folder>/<sample>.cram{,.crai}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Alignment;

impl ArtifactKind for Alignment {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::Alignment
    }

    fn identity_fields(&self) -> &'static [&'static str] {
        &[SAMPLE_NAME, SAMPLE_BARCODE, LIBRARY_ID, FLOWCELL_LANE]
    }

    fn identity_key(&self, record: &MetadataRecord) -> Result<String, SubmitError> {
        Ok(record.require(SAMPLE_NAME)?.to_string())
    }

    // Sample names may themselves contain `_`, so only the exact folder counts.
    fn matches_dir(&self, name: &str, prefix: &str) -> bool {
        name == prefix
    }

    fn expected_roles(&self) -> &'static [FileRole] {
        &[FileRole::Alignment, FileRole::AlignmentIndex]
    }

    fn metadata_roles(&self) -> &'static [FileRole] {
        &[FileRole::Alignment]
    }

    fn file_name(
        &self,
        _dir_name: &str,
        record: &MetadataRecord,
        role: FileRole,
    ) -> Result<String, SubmitError> {
        let sample = record.require(SAMPLE_NAME)?;
        Ok(match role {
            FileRole::AlignmentIndex => format!("{sample}.cram.crai"),
            _ => format!("{sample}.cram"),
        })
    }

    fn derive_container_name(&self, files: &ResolvedFileSet) -> String {
        files
            .file(FileRole::Alignment)
            .map(|file| naming::strip_compressed_extension(file.path.as_str()))
            .unwrap_or_else(|| naming::basename(files.container_dir.as_str()).to_string())
    }

    fn synthetic_keys(&self) -> &'static [&'static str] {
        &[PAIRED_READS_KEY]
    }

    fn synthetic_metadata(
        &self,
        record: &MetadataRecord,
        role: FileRole,
    ) -> Result<Vec<MetadataAttribute>, SubmitError> {
        if role != FileRole::Alignment {
            return Ok(Vec::new());
        }
        let reads_prefix = naming::derive_prefix(record, ArtifactType::Reads)?;
        let names = [FileRole::Read1, FileRole::Read2]
            .into_iter()
            .filter_map(|read| fastq_name(&reads_prefix, read))
            .collect::<Vec<_>>();
        Ok(vec![MetadataAttribute::new(
            PAIRED_READS_KEY,
            names.join(","),
            STRING_UNIT,
        )])
    }
}
