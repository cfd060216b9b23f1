use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::batch::BatchPlan;
use crate::config::SchedulerConfig;
use crate::error::SubmitError;

const SCRIPT_HEADER: &str = "#!/bin/sh\nset -e\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub name: String,
    pub path: Utf8PathBuf,
    pub commands: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub name: String,
    pub detail: String,
}

/// Persists every block of a plan as `<dir>/<mode>_<container>.sh`.
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    dir: Utf8PathBuf,
}

impl ScriptWriter {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn write_plan(&self, plan: &BatchPlan) -> Result<Vec<Script>, SubmitError> {
        fs::create_dir_all(self.dir.as_std_path())
            .map_err(|err| SubmitError::Filesystem(format!("create {}: {err}", self.dir)))?;

        let prefix = plan.mode.script_prefix();
        let mut scripts = Vec::with_capacity(plan.len());
        for block in plan.blocks() {
            let path = self.dir.join(format!("{prefix}_{}.sh", block.container));
            let content = format!("{SCRIPT_HEADER}{}\n", block.render());
            write_atomic(&path, content.as_bytes())?;
            scripts.push(Script {
                name: block.container.clone(),
                path,
                commands: block.commands.len(),
            });
        }
        info!(count = scripts.len(), dir = %self.dir, "wrote scripts");
        Ok(scripts)
    }
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SubmitError> {
    let parent = path
        .parent()
        .ok_or_else(|| SubmitError::Filesystem(format!("invalid script path {path}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix("irods-submit")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SubmitError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| SubmitError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SubmitError::Filesystem(err.to_string()))?;
    Ok(())
}

pub trait JobRunner {
    fn run(&self, script: &Script) -> Result<JobOutcome, SubmitError>;
}

/// Runs scripts one after another, stopping at the first failure.
pub fn run_all(
    runner: &dyn JobRunner,
    scripts: &[Script],
) -> Result<Vec<JobOutcome>, SubmitError> {
    scripts.iter().map(|script| runner.run(script)).collect()
}

/// Executes scripts in the current terminal.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: find_in_path("sh").unwrap_or_else(|| PathBuf::from("/bin/sh")),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner for ShellRunner {
    fn run(&self, script: &Script) -> Result<JobOutcome, SubmitError> {
        info!(job = %script.name, script = %script.path, "running");
        run_cmd(&script.name, &self.shell, &[script.path.to_string()])?;
        Ok(JobOutcome {
            name: script.name.clone(),
            detail: "done".to_string(),
        })
    }
}

/// Hands scripts to SLURM with `sbatch`.
#[derive(Debug, Clone)]
pub struct SlurmRunner {
    sbatch: Option<PathBuf>,
    scheduler: SchedulerConfig,
}

impl SlurmRunner {
    pub fn new(scheduler: SchedulerConfig) -> Self {
        Self {
            sbatch: find_in_path("sbatch"),
            scheduler,
        }
    }

    pub fn sbatch_args(&self, script: &Script) -> Vec<String> {
        let mut args = vec![
            "--job-name".to_string(),
            script.name.clone(),
            format!("--mem={}", self.scheduler.memory_mb),
        ];
        if let Some(partition) = &self.scheduler.partition {
            args.push(format!("--partition={partition}"));
        }
        if self.scheduler.log {
            args.push(format!("--output={}.log", script.path));
        }
        args.push(script.path.to_string());
        args
    }
}

impl JobRunner for SlurmRunner {
    fn run(&self, script: &Script) -> Result<JobOutcome, SubmitError> {
        let sbatch = self
            .sbatch
            .as_ref()
            .ok_or_else(|| SubmitError::MissingTool("sbatch".to_string()))?;
        let stdout = run_cmd(&script.name, sbatch, &self.sbatch_args(script))?;
        info!(job = %script.name, "{stdout}");
        Ok(JobOutcome {
            name: script.name.clone(),
            detail: stdout,
        })
    }
}

fn run_cmd(name: &str, program: &Path, args: &[String]) -> Result<String, SubmitError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| SubmitError::JobFailed {
            name: name.to_string(),
            message: err.to_string(),
        })?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("{} exited with {}", program.display(), output.status)
    } else {
        stderr
    };
    Err(SubmitError::JobFailed {
        name: name.to_string(),
        message,
    })
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}
