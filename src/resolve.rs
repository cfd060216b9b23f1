use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::artifact::{ArtifactKind, FileRole};
use crate::domain::MetadataRecord;
use crate::error::SubmitError;
use crate::naming;

pub const DEFAULT_CHECKSUM_EXTENSION: &str = "md5";

/// Read-only view of the local disk used while resolving records.
pub trait Filesystem {
    fn list_dir(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SubmitError>;
    fn is_dir(&self, path: &Utf8Path) -> bool;
    fn is_file(&self, path: &Utf8Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn list_dir(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SubmitError> {
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| SubmitError::Filesystem(format!("read {dir}: {err}")))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SubmitError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
                SubmitError::Filesystem(format!("non-utf8 path: {}", path.display()))
            })?;
            paths.push(path);
        }
        Ok(paths)
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        path.as_std_path().is_dir()
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        path.as_std_path().is_file()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile {
    pub role: FileRole,
    pub path: Utf8PathBuf,
    pub checksum: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFileSet {
    pub container_dir: Utf8PathBuf,
    pub files: Vec<ResolvedFile>,
}

impl ResolvedFileSet {
    pub fn file(&self, role: FileRole) -> Option<&ResolvedFile> {
        self.files.iter().find(|file| file.role == role)
    }

    /// Every local path to upload: each primary file followed by its sidecar.
    pub fn transfer_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.files
            .iter()
            .flat_map(|file| [file.path.as_path(), file.checksum.as_path()])
    }
}

pub struct FileSetResolver<'a, F: Filesystem> {
    fs: &'a F,
    local_root: Utf8PathBuf,
    checksum_extension: String,
}

impl<'a, F: Filesystem> FileSetResolver<'a, F> {
    pub fn new(fs: &'a F, local_root: Utf8PathBuf, checksum_extension: impl Into<String>) -> Self {
        Self {
            fs,
            local_root,
            checksum_extension: checksum_extension.into(),
        }
    }

    pub fn local_root(&self) -> &Utf8Path {
        &self.local_root
    }

    pub fn resolve(
        &self,
        record: &MetadataRecord,
        kind: &dyn ArtifactKind,
    ) -> Result<ResolvedFileSet, SubmitError> {
        let prefix = kind.prefix(record)?;
        let container_dir = self.locate(record, kind, &prefix)?;
        debug!(record = %record.location(), folder = %container_dir, "matched local folder");

        let dir_name = naming::basename(container_dir.as_str()).to_string();
        let mut files = Vec::with_capacity(kind.expected_roles().len());
        for &role in kind.expected_roles() {
            let path = container_dir.join(kind.file_name(&dir_name, record, role)?);
            let checksum = Utf8PathBuf::from(format!("{path}.{}", self.checksum_extension));
            for required in [&path, &checksum] {
                if !self.fs.is_file(required) {
                    return Err(SubmitError::MissingFile {
                        record: record.location().clone(),
                        path: required.to_string(),
                    });
                }
            }
            files.push(ResolvedFile {
                role,
                path,
                checksum,
            });
        }

        Ok(ResolvedFileSet {
            container_dir,
            files,
        })
    }

    fn locate(
        &self,
        record: &MetadataRecord,
        kind: &dyn ArtifactKind,
        prefix: &str,
    ) -> Result<Utf8PathBuf, SubmitError> {
        let mut candidates = self
            .fs
            .list_dir(&self.local_root)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| kind.matches_dir(name, prefix))
            })
            .filter(|path| self.fs.is_dir(path))
            .collect::<Vec<_>>();
        candidates.sort();

        match candidates.len() {
            0 => Err(SubmitError::NotFound {
                record: record.location().clone(),
                expected: self.local_root.join(prefix).to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(SubmitError::AmbiguousMatch {
                record: record.location().clone(),
                prefix: prefix.to_string(),
                candidates: candidates.iter().map(|path| path.to_string()).collect(),
            }),
        }
    }
}
