use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::SubmitError;
use crate::naming;

/// A path given on the command line: a folder of inputs, one input, or a
/// text file listing inputs one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    Directory(Utf8PathBuf),
    SingleFile(Utf8PathBuf),
    ManifestFile(Utf8PathBuf),
}

impl InputSpec {
    pub fn classify(path: &Utf8Path, extensions: &[&str]) -> Result<Self, SubmitError> {
        let std_path = path.as_std_path();
        if std_path.is_dir() {
            return Ok(InputSpec::Directory(path.to_path_buf()));
        }
        if !std_path.is_file() {
            return Err(SubmitError::Filesystem(format!(
                "input does not exist: {path}"
            )));
        }
        if has_extension(path, extensions) {
            Ok(InputSpec::SingleFile(path.to_path_buf()))
        } else {
            Ok(InputSpec::ManifestFile(path.to_path_buf()))
        }
    }

    pub fn resolve(&self, extensions: &[&str]) -> Result<Vec<Utf8PathBuf>, SubmitError> {
        match self {
            InputSpec::Directory(dir) => {
                let entries = fs::read_dir(dir.as_std_path())
                    .map_err(|err| SubmitError::Filesystem(format!("read {dir}: {err}")))?;
                let mut files = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|err| SubmitError::Filesystem(err.to_string()))?;
                    let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                        continue;
                    };
                    if path.as_std_path().is_file() && has_extension(&path, extensions) {
                        files.push(path);
                    }
                }
                files.sort();
                Ok(files)
            }
            InputSpec::SingleFile(path) => Ok(vec![path.clone()]),
            InputSpec::ManifestFile(manifest) => {
                let content = fs::read_to_string(manifest.as_std_path())
                    .map_err(|err| SubmitError::Filesystem(format!("read {manifest}: {err}")))?;
                let base = manifest.parent().unwrap_or(Utf8Path::new(""));
                let mut files = Vec::new();
                for line in content.lines().map(str::trim) {
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let listed = Utf8Path::new(line);
                    let path = if listed.is_absolute() {
                        listed.to_path_buf()
                    } else {
                        base.join(listed)
                    };
                    if !path.as_std_path().is_file() {
                        return Err(SubmitError::Filesystem(format!(
                            "{manifest} lists a missing file: {path}"
                        )));
                    }
                    files.push(path);
                }
                Ok(files)
            }
        }
    }
}

pub fn resolve_inputs(
    path: &Utf8Path,
    extensions: &[&str],
) -> Result<Vec<Utf8PathBuf>, SubmitError> {
    InputSpec::classify(path, extensions)?.resolve(extensions)
}

/// `path` made absolute against the working directory; `None` is the
/// working directory itself.
pub fn absolute_dir(path: Option<&str>) -> Result<Utf8PathBuf, SubmitError> {
    let cwd = std::env::current_dir().map_err(|err| SubmitError::Filesystem(err.to_string()))?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| SubmitError::Filesystem("non-utf8 working directory".to_string()))?;
    Ok(match path {
        Some(path) if Utf8Path::new(path).is_absolute() => Utf8PathBuf::from(path),
        Some(path) => cwd.join(path),
        None => cwd,
    })
}

fn has_extension(path: &Utf8Path, extensions: &[&str]) -> bool {
    naming::extension(path.as_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}
