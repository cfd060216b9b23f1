use std::io::{self, Write};

use serde::Serialize;

use crate::batch::BatchPlan;
use crate::domain::{ArtifactType, RecordRef, SynthesisMode};
use crate::jobs::{JobOutcome, Script};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub kind: ArtifactType,
    pub mode: SynthesisMode,
    pub remote_root: String,
    pub items: Vec<PlanItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    pub container: String,
    pub record: RecordRef,
    pub commands: usize,
    pub transfers: usize,
    pub script: Option<String>,
    pub action: String,
    pub detail: Option<String>,
}

impl PlanSummary {
    pub fn new(kind: ArtifactType, remote_root: &str, plan: &BatchPlan) -> Self {
        Self {
            kind,
            mode: plan.mode,
            remote_root: remote_root.to_string(),
            items: plan
                .blocks()
                .iter()
                .map(|block| PlanItem {
                    container: block.container.clone(),
                    record: block.record.clone(),
                    commands: block.commands.len(),
                    transfers: block.transfer_count(),
                    script: None,
                    action: "planned".to_string(),
                    detail: None,
                })
                .collect(),
        }
    }

    pub fn record_scripts(&mut self, scripts: &[Script]) {
        for script in scripts {
            if let Some(item) = self.item_mut(&script.name) {
                item.script = Some(script.path.to_string());
                item.action = "written".to_string();
            }
        }
    }

    pub fn record_jobs(&mut self, outcomes: &[JobOutcome], action: &str) {
        for outcome in outcomes {
            if let Some(item) = self.item_mut(&outcome.name) {
                item.action = action.to_string();
                item.detail = Some(outcome.detail.clone());
            }
        }
    }

    fn item_mut(&mut self, container: &str) -> Option<&mut PlanItem> {
        self.items
            .iter_mut()
            .find(|item| item.container == container)
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &PlanSummary) -> io::Result<()> {
        let json = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_summary(summary: &PlanSummary) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!(
        "{cyan}{} batch for {} ({:?}): {} record(s){reset}",
        summary.kind,
        summary.remote_root,
        summary.mode,
        summary.items.len()
    );
    for item in &summary.items {
        println!(
            "{green}  {} -> {} ({} commands, {} transfers, {}){reset}",
            item.record, item.container, item.commands, item.transfers, item.action
        );
        if let Some(script) = &item.script {
            println!("     script: {script}");
        }
        if let Some(detail) = item.detail.as_deref().filter(|detail| !detail.is_empty()) {
            println!("     {detail}");
        }
    }
}
