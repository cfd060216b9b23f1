use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::RecordRef;

#[derive(Debug, Error, Diagnostic)]
pub enum SubmitError {
    #[error("{record}: missing required field `{field}`")]
    #[diagnostic(help("fill in the field in the metadata sheet or delete the row"))]
    MissingField { record: RecordRef, field: String },

    #[error("{record}: attribute `{name}` appears more than once")]
    DuplicateAttribute { record: RecordRef, name: String },

    #[error("remote folder is not absolute: {0}")]
    #[diagnostic(help("pass an absolute iRODS path, e.g. /zone/home/project"))]
    RelativePath(String),

    #[error("{record}: no local folder found, expected {expected}")]
    #[diagnostic(help("check the metadata sheet; if the folder does not exist delete the row"))]
    NotFound { record: RecordRef, expected: String },

    #[error("{record}: more than one local folder matches {prefix}: {candidates:?}")]
    #[diagnostic(help("multiple lanes or runs for one library are not supported"))]
    AmbiguousMatch {
        record: RecordRef,
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("{record}: expected file is missing: {path}")]
    MissingFile { record: RecordRef, path: String },

    #[error("--upload and --meta cannot be used together")]
    #[diagnostic(help("omit both flags to upload and annotate in one go"))]
    ModeConflict,

    #[error("{first} and {second} describe the same sample {identity}")]
    #[diagnostic(help("more than one run of a sample per batch is not supported"))]
    DuplicateIdentity {
        identity: String,
        first: RecordRef,
        second: RecordRef,
    },

    #[error("{first} and {second} both resolve to remote container {container}")]
    ContainerCollision {
        container: String,
        first: RecordRef,
        second: RecordRef,
    },

    #[error("invalid metadata sheet {path}: {message}")]
    InvalidSheet { path: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("job {name} failed: {message}")]
    JobFailed { name: String, message: String },
}
