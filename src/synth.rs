use std::fmt;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::warn;

use crate::artifact::ArtifactKind;
use crate::domain::{MetadataAttribute, MetadataRecord, RecordRef, RemoteRoot, SynthesisMode};
use crate::error::SubmitError;
use crate::naming;
use crate::resolve::ResolvedFileSet;

pub const VERSION_KEY: &str = "irods_submit_version";
const VERSION_UNIT: &str = "String";

/// One line of a generated upload script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    MakeCollection {
        collection: String,
    },
    Transfer {
        local: Utf8PathBuf,
        collection: String,
    },
    RemoveMetadata {
        object: String,
        key: String,
    },
    AddMetadata {
        object: String,
        key: String,
        value: String,
        unit: String,
    },
}

impl Command {
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            Command::MakeCollection { .. } | Command::Transfer { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::MakeCollection { collection } => {
                write!(f, "imkdir -p {}", shell_arg(collection))
            }
            Command::Transfer { local, collection } => write!(
                f,
                "irsync -K {} {}",
                shell_arg(local.as_str()),
                shell_arg(&format!("i:{collection}"))
            ),
            Command::RemoveMetadata { object, key } => write!(
                f,
                "imeta rmw -d {} {} % %",
                shell_arg(object),
                shell_arg(key)
            ),
            Command::AddMetadata {
                object,
                key,
                value,
                unit,
            } => {
                write!(
                    f,
                    "imeta add -d {} {} {}",
                    shell_arg(object),
                    shell_arg(key),
                    quote_value(value)
                )?;
                if !unit.is_empty() {
                    write!(f, " {}", shell_arg(unit))?;
                }
                Ok(())
            }
        }
    }
}

/// Commands for one record, uploaded into one remote container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandBlock {
    pub container: String,
    pub record: RecordRef,
    pub commands: Vec<Command>,
}

impl CommandBlock {
    pub fn render(&self) -> String {
        self.commands
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn transfer_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Transfer { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Synthesizer {
    remote_root: RemoteRoot,
    version: String,
}

impl Synthesizer {
    pub fn new(remote_root: RemoteRoot, version: impl Into<String>) -> Self {
        Self {
            remote_root,
            version: version.into(),
        }
    }

    pub fn remote_root(&self) -> &RemoteRoot {
        &self.remote_root
    }

    pub fn synthesize(
        &self,
        record: &MetadataRecord,
        kind: &dyn ArtifactKind,
        files: &ResolvedFileSet,
        mode: SynthesisMode,
    ) -> Result<CommandBlock, SubmitError> {
        let container = kind.derive_container_name(files);
        let collection = self.remote_root.container(&container);
        let mut commands = Vec::new();

        if mode.transfers() {
            commands.push(Command::MakeCollection {
                collection: collection.clone(),
            });
            commands.extend(files.transfer_paths().map(|path| Command::Transfer {
                local: path.to_path_buf(),
                collection: collection.clone(),
            }));
        }

        if mode.metadata() {
            let attributes = self.sheet_attributes(record, kind);
            for &role in kind.metadata_roles() {
                let file = files.file(role).ok_or_else(|| SubmitError::MissingFile {
                    record: record.location().clone(),
                    path: format!("{} ({role:?})", files.container_dir),
                })?;
                let object = format!("{collection}/{}", naming::basename(file.path.as_str()));
                let synthetic = kind.synthetic_metadata(record, role)?;
                commands.extend(self.removals(&object, &attributes, kind));
                commands.extend(self.additions(&object, &attributes, &synthetic));
            }
        }

        Ok(CommandBlock {
            container,
            record: record.location().clone(),
            commands,
        })
    }

    /// Sheet attributes minus the keys this tool writes itself.
    fn sheet_attributes<'r>(
        &self,
        record: &'r MetadataRecord,
        kind: &dyn ArtifactKind,
    ) -> Vec<&'r MetadataAttribute> {
        record
            .attributes()
            .iter()
            .filter(|attribute| {
                let reserved = attribute.name == VERSION_KEY
                    || kind.synthetic_keys().contains(&attribute.name.as_str());
                if reserved {
                    warn!(
                        record = %record.location(),
                        key = %attribute.name,
                        "sheet column shadows a generated key, ignoring it"
                    );
                }
                !reserved
            })
            .collect()
    }

    fn removals(
        &self,
        object: &str,
        attributes: &[&MetadataAttribute],
        kind: &dyn ArtifactKind,
    ) -> Vec<Command> {
        attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .chain(kind.synthetic_keys().iter().copied())
            .chain(std::iter::once(VERSION_KEY))
            .map(|key| Command::RemoveMetadata {
                object: object.to_string(),
                key: key.to_string(),
            })
            .collect()
    }

    fn additions(
        &self,
        object: &str,
        attributes: &[&MetadataAttribute],
        synthetic: &[MetadataAttribute],
    ) -> Vec<Command> {
        let version = MetadataAttribute::new(VERSION_KEY, self.version.as_str(), VERSION_UNIT);
        attributes
            .iter()
            .copied()
            .chain(synthetic.iter())
            .chain(std::iter::once(&version))
            .map(|attribute| Command::AddMetadata {
                object: object.to_string(),
                key: attribute.name.clone(),
                value: attribute.value.clone(),
                unit: attribute.unit.clone(),
            })
            .collect()
    }
}

fn shell_arg(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "_-./:%+,=@".contains(ch));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn quote_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
