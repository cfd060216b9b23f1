use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;

pub const SAMPLE_BARCODE: &str = "sample_barcode";
pub const SAMPLE_NAME: &str = "sample_name";
pub const LIBRARY_ID: &str = "library_id";
pub const FLOWCELL_LANE: &str = "flowcell_lane";

/// Absolute collection path on the iRODS side. Relative paths are rejected
/// because the remote side resolves them against a per-user home.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct RemoteRoot(String);

impl RemoteRoot {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn container(&self, container: &str) -> String {
        format!("{}/{container}", self.0.trim_end_matches('/'))
    }
}

impl fmt::Display for RemoteRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteRoot {
    type Err = SubmitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !trimmed.starts_with('/') {
            return Err(SubmitError::RelativePath(value.to_string()));
        }
        let normalized = trimmed.trim_end_matches('/');
        if normalized.is_empty() {
            return Ok(Self("/".to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for RemoteRoot {
    type Error = SubmitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub name: String,
    pub value: String,
    pub unit: String,
}

impl MetadataAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: unit.into(),
        }
    }
}

/// Where a record came from: its line in the sheet, and the sheet itself
/// when records of several sheets share one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RecordRef {
    pub sheet: Option<Utf8PathBuf>,
    pub row: usize,
}

impl RecordRef {
    pub fn row(row: usize) -> Self {
        Self { sheet: None, row }
    }

    pub fn in_sheet(sheet: &Utf8Path, row: usize) -> Self {
        Self {
            sheet: Some(sheet.to_path_buf()),
            row,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{sheet} row {}", self.row),
            None => write!(f, "row {}", self.row),
        }
    }
}

/// One sheet row. Attributes keep the sheet's column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    location: RecordRef,
    attributes: Vec<MetadataAttribute>,
}

impl MetadataRecord {
    pub fn new(row: usize, attributes: Vec<MetadataAttribute>) -> Result<Self, SubmitError> {
        Self::at(RecordRef::row(row), attributes)
    }

    pub fn at(location: RecordRef, attributes: Vec<MetadataAttribute>) -> Result<Self, SubmitError> {
        for (index, attribute) in attributes.iter().enumerate() {
            if attributes[..index]
                .iter()
                .any(|seen| seen.name == attribute.name)
            {
                return Err(SubmitError::DuplicateAttribute {
                    record: location,
                    name: attribute.name.clone(),
                });
            }
        }
        Ok(Self {
            location,
            attributes,
        })
    }

    pub fn row(&self) -> usize {
        self.location.row
    }

    pub fn location(&self) -> &RecordRef {
        &self.location
    }

    pub fn attributes(&self) -> &[MetadataAttribute] {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str, SubmitError> {
        self.get(name)
            .map(str::trim)
            .ok_or_else(|| SubmitError::MissingField {
                record: self.location.clone(),
                field: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Reads,
    Alignment,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactType::Reads => write!(f, "reads"),
            ArtifactType::Alignment => write!(f, "alignment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SynthesisMode {
    Full,
    TransferOnly,
    MetadataOnly,
}

impl SynthesisMode {
    pub fn from_flags(transfer_only: bool, metadata_only: bool) -> Result<Self, SubmitError> {
        match (transfer_only, metadata_only) {
            (true, true) => Err(SubmitError::ModeConflict),
            (true, false) => Ok(SynthesisMode::TransferOnly),
            (false, true) => Ok(SynthesisMode::MetadataOnly),
            (false, false) => Ok(SynthesisMode::Full),
        }
    }

    pub fn transfers(self) -> bool {
        matches!(self, SynthesisMode::Full | SynthesisMode::TransferOnly)
    }

    pub fn metadata(self) -> bool {
        matches!(self, SynthesisMode::Full | SynthesisMode::MetadataOnly)
    }

    /// Prefix used for generated script names.
    pub fn script_prefix(self) -> &'static str {
        match self {
            SynthesisMode::Full => "all",
            SynthesisMode::TransferOnly => "upload",
            SynthesisMode::MetadataOnly => "meta",
        }
    }
}

/// Raw `--upload` / `--meta` switches, validated into a [`SynthesisMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub transfer_only: bool,
    pub metadata_only: bool,
}

impl ModeFlags {
    pub fn mode(self) -> Result<SynthesisMode, SubmitError> {
        SynthesisMode::from_flags(self.transfer_only, self.metadata_only)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_remote_root_valid() {
        let root: RemoteRoot = "/zone/home/project/".parse().unwrap();
        assert_eq!(root.as_str(), "/zone/home/project");
        assert_eq!(root.container("run1"), "/zone/home/project/run1");
    }

    #[test]
    fn parse_remote_root_relative() {
        let err = "home/project".parse::<RemoteRoot>().unwrap_err();
        assert_matches!(err, SubmitError::RelativePath(_));
    }

    #[test]
    fn deserialized_remote_root_is_checked() {
        let root: RemoteRoot = serde_json::from_str(r#""/zone/home/""#).unwrap();
        assert_eq!(root.as_str(), "/zone/home");
        let err = serde_json::from_str::<RemoteRoot>(r#""home/project""#).unwrap_err();
        assert!(err.to_string().contains("not absolute"));
    }

    #[test]
    fn artifact_type_names() {
        assert_eq!(ArtifactType::Alignment.to_string(), "alignment");
        assert_eq!(serde_json::to_string(&ArtifactType::Reads).unwrap(), r#""reads""#);
    }

    #[test]
    fn record_location_names_the_sheet() {
        assert_eq!(RecordRef::row(4).to_string(), "row 4");
        assert_eq!(
            RecordRef::in_sheet(Utf8Path::new("runs/b.csv"), 3).to_string(),
            "runs/b.csv row 3"
        );
    }

    #[test]
    fn record_rejects_duplicate_names() {
        let err = MetadataRecord::new(
            3,
            vec![
                MetadataAttribute::new("library_id", "L1", "String"),
                MetadataAttribute::new("library_id", "L2", "String"),
            ],
        )
        .unwrap_err();
        assert_matches!(
            err,
            SubmitError::DuplicateAttribute { record, .. } if record == RecordRef::row(3)
        );
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let record =
            MetadataRecord::new(3, vec![MetadataAttribute::new(LIBRARY_ID, "  ", "")]).unwrap();
        assert_matches!(
            record.require(LIBRARY_ID),
            Err(SubmitError::MissingField { record, .. }) if record.row == 3
        );
    }

    #[test]
    fn mode_flags() {
        assert_eq!(
            SynthesisMode::from_flags(false, false).unwrap(),
            SynthesisMode::Full
        );
        assert_matches!(
            SynthesisMode::from_flags(true, true),
            Err(SubmitError::ModeConflict)
        );
        assert!(!SynthesisMode::MetadataOnly.transfers());
        assert!(!SynthesisMode::TransferOnly.metadata());
    }
}
