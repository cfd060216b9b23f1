use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use irods_submit::artifact::{Alignment, ArtifactKind, PAIR_END_READ_KEY, PAIRED_READS_KEY, PairedReads};
use irods_submit::batch::BatchDriver;
use irods_submit::domain::{MetadataAttribute, MetadataRecord, ModeFlags, SynthesisMode};
use irods_submit::error::SubmitError;
use irods_submit::resolve::{FileSetResolver, Filesystem, LocalFs};
use irods_submit::synth::{Command, CommandBlock, Synthesizer};

#[derive(Default)]
struct RecordingFs {
    listings: Mutex<usize>,
}

impl Filesystem for RecordingFs {
    fn list_dir(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SubmitError> {
        *self.listings.lock().unwrap() += 1;
        LocalFs.list_dir(dir)
    }

    fn is_dir(&self, path: &Utf8Path) -> bool {
        LocalFs.is_dir(path)
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        LocalFs.is_file(path)
    }
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn touch_all(dir: &Utf8Path, names: &[String]) {
    fs::create_dir_all(dir.as_std_path()).unwrap();
    for name in names {
        fs::write(dir.join(name).as_std_path(), b"").unwrap();
    }
}

fn reads_fixture(root: &Utf8Path, prefix: &str) -> Vec<Utf8PathBuf> {
    let dir = root.join(prefix);
    let names = ["R1", "R2"]
        .iter()
        .flat_map(|read| {
            let fastq = format!("{prefix}_{read}_001.fastq.gz");
            [format!("{fastq}.md5"), fastq]
        })
        .collect::<Vec<_>>();
    touch_all(&dir, &names);
    names.iter().map(|name| dir.join(name)).collect()
}

fn reads_record(row: usize, barcode: &str, library: &str) -> MetadataRecord {
    MetadataRecord::new(
        row,
        vec![
            MetadataAttribute::new("sample_barcode", barcode, "String"),
            MetadataAttribute::new("library_id", library, "String"),
            MetadataAttribute::new("flowcell_lane", "L001", "String"),
            MetadataAttribute::new("read_length", "150", "bp"),
        ],
    )
    .unwrap()
}

fn alignment_record(row: usize) -> MetadataRecord {
    MetadataRecord::new(
        row,
        vec![
            MetadataAttribute::new("sample_name", "S2", "String"),
            MetadataAttribute::new("sample_barcode", "S2-DL", "String"),
            MetadataAttribute::new("library_id", "L2", "String"),
            MetadataAttribute::new("flowcell_lane", "1", "String"),
            MetadataAttribute::new("reference", "GRCh38", "String"),
        ],
    )
    .unwrap()
}

fn plan<F: Filesystem>(
    fs: &F,
    root: &Utf8Path,
    kind: &dyn ArtifactKind,
    records: &[MetadataRecord],
    flags: ModeFlags,
) -> Result<irods_submit::batch::BatchPlan, SubmitError> {
    let resolver = FileSetResolver::new(fs, root.to_path_buf(), "md5");
    let synthesizer = Synthesizer::new("/zone/home/seq".parse().unwrap(), "0.1.0");
    BatchDriver::new(kind, resolver, synthesizer).plan(records, flags)
}

/// Transfers first, and per file and key every removal before any addition.
fn assert_ordering(block: &CommandBlock) {
    let first_metadata = block
        .commands
        .iter()
        .position(|command| !command.is_transfer())
        .unwrap_or(block.commands.len());
    assert!(block.commands[first_metadata..]
        .iter()
        .all(|command| !command.is_transfer()));

    let mut last_removal = HashMap::new();
    let mut first_addition = HashMap::new();
    for (index, command) in block.commands.iter().enumerate() {
        match command {
            Command::RemoveMetadata { object, key } => {
                last_removal.insert((object.clone(), key.clone()), index);
            }
            Command::AddMetadata { object, key, .. } => {
                first_addition
                    .entry((object.clone(), key.clone()))
                    .or_insert(index);
            }
            _ => {}
        }
    }
    for (target, added) in &first_addition {
        let removed = last_removal
            .get(target)
            .unwrap_or_else(|| panic!("{target:?} added without removal"));
        assert!(removed < added, "{target:?} removed after it was added");
    }
}

fn shape(block: &CommandBlock) -> String {
    block
        .commands
        .iter()
        .map(|command| match command {
            Command::MakeCollection { .. } => 'M',
            Command::Transfer { .. } => 'T',
            Command::RemoveMetadata { .. } => 'R',
            Command::AddMetadata { .. } => 'A',
        })
        .collect()
}

#[test]
fn reads_full_batch() {
    let (_temp, root) = temp_root();
    reads_fixture(&root, "S1-DS_L1_L001");

    let plan = plan(
        &LocalFs,
        &root,
        &PairedReads,
        &[reads_record(3, "S1-DL", "L1")],
        ModeFlags::default(),
    )
    .unwrap();
    assert_eq!(plan.mode, SynthesisMode::Full);
    let block = plan.get("S1-DS_L1_L001").unwrap();

    // 4 sheet keys + pair_end_read + version per removal and addition set.
    assert_eq!(
        shape(block),
        format!("MTTTT{}", ["R".repeat(6), "A".repeat(6)].concat().repeat(2))
    );
    assert_ordering(block);

    let read1 = "/zone/home/seq/S1-DS_L1_L001/S1-DS_L1_L001_R1_001.fastq.gz";
    assert!(block.commands.contains(&Command::AddMetadata {
        object: read1.to_string(),
        key: PAIR_END_READ_KEY.to_string(),
        value: "Read1".to_string(),
        unit: "String".to_string(),
    }));
    assert!(block
        .render()
        .contains(&format!("imeta add -d {read1} read_length \"150\" bp")));
    assert_eq!(block.transfer_count(), 4);
}

#[test]
fn every_required_file_is_checked() {
    let (_temp, root) = temp_root();
    let files = reads_fixture(&root, "S1-DS_L1_L001");
    let records = [reads_record(3, "S1-DL", "L1")];

    for file in &files {
        fs::rename(file.as_std_path(), root.join("parked").as_std_path()).unwrap();
        let err = plan(&LocalFs, &root, &PairedReads, &records, ModeFlags::default())
            .unwrap_err();
        assert_matches!(err, SubmitError::MissingFile { path, .. } if path == file.as_str());
        fs::rename(root.join("parked").as_std_path(), file.as_std_path()).unwrap();
    }
    assert!(plan(&LocalFs, &root, &PairedReads, &records, ModeFlags::default()).is_ok());
}

#[test]
fn alignment_samples_sharing_a_stem() {
    let (_temp, root) = temp_root();
    for sample in ["S2", "S2_b"] {
        touch_all(
            &root.join(sample),
            &["cram", "cram.crai", "cram.md5", "cram.crai.md5"].map(|ext| format!("{sample}.{ext}")),
        );
    }
    let second = MetadataRecord::new(
        4,
        alignment_record(4)
            .attributes()
            .iter()
            .map(|attribute| match attribute.name.as_str() {
                "sample_name" => MetadataAttribute::new("sample_name", "S2_b", "String"),
                "sample_barcode" => MetadataAttribute::new("sample_barcode", "S2b-DL", "String"),
                _ => attribute.clone(),
            })
            .collect(),
    )
    .unwrap();

    let plan = plan(
        &LocalFs,
        &root,
        &Alignment,
        &[alignment_record(3), second],
        ModeFlags::default(),
    )
    .unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.get("S2").map(|block| block.record.row), Some(3));
    assert_eq!(plan.get("S2_b").map(|block| block.record.row), Some(4));
}

#[test]
fn alignment_metadata_only() {
    let (_temp, root) = temp_root();
    touch_all(
        &root.join("S2"),
        &["S2.cram", "S2.cram.crai", "S2.cram.md5", "S2.cram.crai.md5"].map(String::from),
    );
    let flags = ModeFlags {
        transfer_only: false,
        metadata_only: true,
    };

    let plan = plan(&LocalFs, &root, &Alignment, &[alignment_record(3)], flags).unwrap();
    let block = plan.get("S2").unwrap();
    assert_eq!(block.transfer_count(), 0);
    assert!(!block.commands.iter().any(Command::is_transfer));
    assert_ordering(block);

    let object = "/zone/home/seq/S2/S2.cram".to_string();
    let cross_refs = block
        .commands
        .iter()
        .filter(|command| match command {
            Command::RemoveMetadata { key, .. } | Command::AddMetadata { key, .. } => {
                key == PAIRED_READS_KEY
            }
            _ => false,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        cross_refs,
        vec![
            &Command::RemoveMetadata {
                object: object.clone(),
                key: PAIRED_READS_KEY.to_string(),
            },
            &Command::AddMetadata {
                object,
                key: PAIRED_READS_KEY.to_string(),
                value: "S2-DS_L2_L001_R1_001.fastq.gz,S2-DS_L2_L001_R2_001.fastq.gz".to_string(),
                unit: "String".to_string(),
            },
        ]
    );
}

#[test]
fn metadata_only_is_repeatable() {
    let (_temp, root) = temp_root();
    reads_fixture(&root, "S1-DS_L1_L001");
    let records = [reads_record(3, "S1-DL", "L1")];
    let flags = ModeFlags {
        transfer_only: false,
        metadata_only: true,
    };

    let first = plan(&LocalFs, &root, &PairedReads, &records, flags).unwrap();
    let second = plan(&LocalFs, &root, &PairedReads, &records, flags).unwrap();
    let first = first.rendered().collect::<Vec<_>>();
    let second = second.rendered().collect::<Vec<_>>();
    assert_eq!(first, second);
    assert!(first[0].1.starts_with("imeta rmw"));
}

#[test]
fn duplicate_sample_fails_whole_batch() {
    let (_temp, root) = temp_root();
    reads_fixture(&root, "S1-DS_L1_L001");
    reads_fixture(&root, "S1-DS_L9_L001");
    let records = [reads_record(3, "S1-DL", "L1"), reads_record(4, "S1-DS", "L9")];
    let fs = RecordingFs::default();

    let err = plan(&fs, &root, &PairedReads, &records, ModeFlags::default()).unwrap_err();
    assert_matches!(
        err,
        SubmitError::DuplicateIdentity { ref first, ref second, ref identity }
            if first.row == 3 && second.row == 4 && identity == "S1-DS"
    );
    assert_eq!(*fs.listings.lock().unwrap(), 0);
}

#[test]
fn mode_conflict_before_any_listing() {
    let (_temp, root) = temp_root();
    reads_fixture(&root, "S1-DS_L1_L001");
    let fs = RecordingFs::default();
    let flags = ModeFlags {
        transfer_only: true,
        metadata_only: true,
    };

    let err = plan(&fs, &root, &PairedReads, &[reads_record(3, "S1-DL", "L1")], flags)
        .unwrap_err();
    assert_matches!(err, SubmitError::ModeConflict);
    assert_eq!(*fs.listings.lock().unwrap(), 0);
}

#[test]
fn failing_row_aborts_batch() {
    let (_temp, root) = temp_root();
    reads_fixture(&root, "S1-DS_L1_L001");
    let records = [reads_record(3, "S1-DL", "L1"), reads_record(4, "S3-DL", "L3")];

    let err = plan(&LocalFs, &root, &PairedReads, &records, ModeFlags::default()).unwrap_err();
    assert_matches!(err, SubmitError::NotFound { record, .. } if record.row == 4);
}

#[test]
fn missing_identity_field() {
    let (_temp, root) = temp_root();
    let record = MetadataRecord::new(
        7,
        vec![MetadataAttribute::new("sample_barcode", "S1-DL", "String")],
    )
    .unwrap();

    let err = plan(&LocalFs, &root, &PairedReads, &[record], ModeFlags::default()).unwrap_err();
    assert_matches!(
        err,
        SubmitError::MissingField { ref record, ref field } if record.row == 7 && field == "library_id"
    );
}
