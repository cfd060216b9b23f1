use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use irods_submit::artifact::kind_for;
use irods_submit::batch::BatchDriver;
use irods_submit::config::ConfigLoader;
use irods_submit::domain::{ArtifactType, MetadataRecord, ModeFlags, RemoteRoot};
use irods_submit::error::SubmitError;
use irods_submit::fs_util::{absolute_dir, resolve_inputs};
use irods_submit::jobs::{ScriptWriter, ShellRunner, SlurmRunner, run_all};
use irods_submit::output::{JsonOutput, OutputMode, PlanSummary, print_summary};
use irods_submit::resolve::{FileSetResolver, LocalFs};
use irods_submit::sheet::{MetadataSheet, SHEET_EXTENSIONS};
use irods_submit::synth::Synthesizer;

#[derive(Parser)]
#[command(name = "irods-submit")]
#[command(
    about = "Upload sequencing files to iRODS/Yoda and attach their metadata (log in with iinit first)"
)]
#[command(version, author)]
struct Cli {
    /// JSON config file (default: ./irods-submit.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print the batch summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Paired-end FASTQ files, one folder per library and lane", alias = "fastq")]
    Reads(UploadArgs),
    #[command(about = "CRAM alignments with their index", alias = "cram")]
    Alignment(UploadArgs),
}

#[derive(Args)]
struct UploadArgs {
    /// Metadata sheet (CSV/TSV: units row, names row, then one row per upload),
    /// a folder of sheets, or a text file listing sheets
    metadata: String,

    /// Absolute iRODS collection to upload into
    #[arg(long)]
    ifolder: String,

    /// Local folder holding the run folders (default: current directory)
    #[arg(long)]
    folder: Option<String>,

    /// Only create collections and upload files
    #[arg(long)]
    upload: bool,

    /// Only replace metadata of files uploaded earlier
    #[arg(long)]
    meta: bool,

    /// Execute the scripts now, one after another
    #[arg(long, conflicts_with = "submit")]
    run: bool,

    /// Submit every script to SLURM with sbatch
    #[arg(long)]
    submit: bool,

    /// Where to write scripts (overrides the config file)
    #[arg(long)]
    script_dir: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SubmitError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SubmitError) -> u8 {
    match error {
        SubmitError::MissingField { .. }
        | SubmitError::DuplicateAttribute { .. }
        | SubmitError::RelativePath(_)
        | SubmitError::NotFound { .. }
        | SubmitError::AmbiguousMatch { .. }
        | SubmitError::MissingFile { .. }
        | SubmitError::ModeConflict
        | SubmitError::DuplicateIdentity { .. }
        | SubmitError::ContainerCollision { .. }
        | SubmitError::InvalidSheet { .. } => 2,
        SubmitError::MissingTool(_) | SubmitError::JobFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let (artifact, args) = match cli.command {
        Commands::Reads(args) => (ArtifactType::Reads, args),
        Commands::Alignment(args) => (ArtifactType::Alignment, args),
    };

    // Cheap argument checks come before any disk access.
    let flags = ModeFlags {
        transfer_only: args.upload,
        metadata_only: args.meta,
    };
    flags.mode()?;
    let remote_root: RemoteRoot = args.ifolder.parse()?;

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let local_root = absolute_dir(args.folder.as_deref())?;
    let records = read_records(&args.metadata)?;

    let kind = kind_for(artifact);
    let fs = LocalFs;
    let resolver = FileSetResolver::new(&fs, local_root, config.checksum_extension.as_str());
    let synthesizer = Synthesizer::new(remote_root.clone(), config.version.as_str());
    let driver = BatchDriver::new(kind.as_ref(), resolver, synthesizer);
    let plan = driver.plan(&records, flags)?;

    let mut summary = PlanSummary::new(artifact, remote_root.as_str(), &plan);
    let script_dir = absolute_dir(Some(
        args.script_dir.as_deref().unwrap_or(config.script_dir.as_str()),
    ))?;
    let scripts = ScriptWriter::new(script_dir).write_plan(&plan)?;
    summary.record_scripts(&scripts);

    if args.run {
        let outcomes = run_all(&ShellRunner::new(), &scripts)?;
        summary.record_jobs(&outcomes, "executed");
    } else if args.submit {
        let outcomes = run_all(&SlurmRunner::new(config.scheduler.clone()), &scripts)?;
        summary.record_jobs(&outcomes, "submitted");
    }

    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Human => print_summary(&summary),
    }
    Ok(())
}

fn read_records(metadata: &str) -> Result<Vec<MetadataRecord>, SubmitError> {
    let input = absolute_dir(Some(metadata))?;
    let sheets = resolve_inputs(&input, &SHEET_EXTENSIONS)?;
    if sheets.is_empty() {
        return Err(SubmitError::InvalidSheet {
            path: input.to_string(),
            message: "no metadata sheet found".to_string(),
        });
    }

    let mut records = Vec::new();
    for sheet in sheets {
        let sheet = MetadataSheet::read(&sheet)?;
        info!(sheet = %sheet.path(), records = sheet.records().len(), "loaded sheet");
        records.extend(sheet.into_records());
    }
    Ok(records)
}
