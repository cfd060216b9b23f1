use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::ArtifactKind;
use crate::domain::{MetadataRecord, ModeFlags, RecordRef, SynthesisMode};
use crate::error::SubmitError;
use crate::resolve::{FileSetResolver, Filesystem};
use crate::synth::{CommandBlock, Synthesizer};

/// Command blocks of a whole sheet, in row order, unique by container.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPlan {
    pub mode: SynthesisMode,
    blocks: Vec<CommandBlock>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl BatchPlan {
    fn new(mode: SynthesisMode) -> Self {
        Self {
            mode,
            blocks: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, block: CommandBlock) -> Result<(), SubmitError> {
        if let Some(&existing) = self.index.get(&block.container) {
            return Err(SubmitError::ContainerCollision {
                container: block.container,
                first: self.blocks[existing].record.clone(),
                second: block.record,
            });
        }
        self.index.insert(block.container.clone(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    pub fn get(&self, container: &str) -> Option<&CommandBlock> {
        self.index.get(container).map(|&index| &self.blocks[index])
    }

    pub fn blocks(&self) -> &[CommandBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `container -> script text`, the hand-off to whatever runs the commands.
    pub fn rendered(&self) -> impl Iterator<Item = (&str, String)> {
        self.blocks
            .iter()
            .map(|block| (block.container.as_str(), block.render()))
    }
}

pub struct BatchDriver<'a, F: Filesystem> {
    kind: &'a dyn ArtifactKind,
    resolver: FileSetResolver<'a, F>,
    synthesizer: Synthesizer,
}

impl<'a, F: Filesystem> BatchDriver<'a, F> {
    pub fn new(
        kind: &'a dyn ArtifactKind,
        resolver: FileSetResolver<'a, F>,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            kind,
            resolver,
            synthesizer,
        }
    }

    /// Plans every record or nothing: the first failing row aborts the batch.
    pub fn plan(
        &self,
        records: &[MetadataRecord],
        flags: ModeFlags,
    ) -> Result<BatchPlan, SubmitError> {
        let mode = flags.mode()?;
        self.check_identities(records)?;
        info!(
            records = records.len(),
            kind = %self.kind.artifact_type(),
            local = %self.resolver.local_root(),
            remote = %self.synthesizer.remote_root(),
            "planning batch"
        );

        let mut plan = BatchPlan::new(mode);
        for record in records {
            let files = self.resolver.resolve(record, self.kind)?;
            let block = self
                .synthesizer
                .synthesize(record, self.kind, &files, mode)?;
            debug!(
                record = %record.location(),
                container = %block.container,
                commands = block.commands.len(),
                "planned record"
            );
            plan.insert(block)?;
        }
        Ok(plan)
    }

    fn check_identities(&self, records: &[MetadataRecord]) -> Result<(), SubmitError> {
        let mut seen = HashMap::<String, &RecordRef>::new();
        for record in records {
            for field in self.kind.identity_fields() {
                record.require(field)?;
            }
            let identity = self.kind.identity_key(record)?;
            if let Some(&first) = seen.get(&identity) {
                return Err(SubmitError::DuplicateIdentity {
                    identity,
                    first: first.clone(),
                    second: record.location().clone(),
                });
            }
            seen.insert(identity, record.location());
        }
        Ok(())
    }
}
