use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slant_core::{Trial, TrialResult};

use crate::error::RecorderError;

/// One entry of a result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub image: usize,
    pub height_ratio: f64,
    pub slant: f64,
    /// Reaction time in seconds
    pub rt: f64,
    /// Response angle in degrees
    pub answer: f64,
}

impl From<&TrialResult> for ResultRecord {
    fn from(r: &TrialResult) -> Self {
        Self {
            image: r.trial.stimulus_id,
            height_ratio: r.trial.height_ratio,
            slant: r.trial.slant_angle,
            rt: r.reaction_time,
            answer: r.response_angle,
        }
    }
}

/// Buffers completed trials and writes them out per block.
#[derive(Debug)]
pub struct DataRecorder {
    dir: PathBuf,
    buffer: Vec<TrialResult>,
    written: Vec<PathBuf>,
}

impl DataRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            buffer: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn accumulate(&mut self, trial: Trial, reaction_time: f64, response_angle: f64) {
        self.buffer
            .push(TrialResult::new(trial, reaction_time, response_angle));
    }

    pub fn pending(&self) -> &[TrialResult] {
        &self.buffer
    }

    /// Files written so far, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the buffer to `<label>_<session>.json`, or the first free
    /// `<label>_<session>A.json`, `...B.json`, ... An empty buffer writes
    /// nothing.
    pub fn flush(&mut self, label: &str, session: u32) -> Result<Option<PathBuf>, RecorderError> {
        if self.buffer.is_empty() {
            log::debug!("nothing to flush for {label} session {session}");
            return Ok(None);
        }

        let records: BTreeMap<usize, ResultRecord> = self
            .buffer
            .iter()
            .enumerate()
            .map(|(i, r)| (i, ResultRecord::from(r)))
            .collect();

        fs::create_dir_all(&self.dir)?;
        let (path, file) = self.create_record(label, session)?;
        write_or_discard(&path, file, &records)?;

        log::info!("wrote {} results to {}", records.len(), path.display());
        self.buffer.clear();
        self.written.push(path.clone());
        Ok(Some(path))
    }

    fn create_record(&self, label: &str, session: u32) -> Result<(PathBuf, File), RecorderError> {
        let suffixes = std::iter::once(String::new()).chain(('A'..='Z').map(String::from));
        for suffix in suffixes {
            let path = self.dir.join(format!("{label}_{session}{suffix}.json"));
            match File::options().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(RecorderError::NamesExhausted {
            label: label.to_string(),
            session,
        })
    }
}

/// Serialize `value` into the freshly created `file`. On failure the file
/// is removed, so a partial record never holds its name.
fn write_or_discard<W: Write, T: Serialize>(
    path: &Path,
    file: W,
    value: &T,
) -> Result<(), RecorderError> {
    let mut writer = BufWriter::new(file);
    let written = serde_json::to_writer(&mut writer, value)
        .map_err(RecorderError::from)
        .and_then(|()| writer.flush().map_err(RecorderError::from));
    if let Err(e) = written {
        drop(writer);
        if let Err(rm) = fs::remove_file(path) {
            log::warn!("could not remove partial record {}: {rm}", path.display());
        }
        return Err(e);
    }
    Ok(())
}

/// Read a result file back.
pub fn load_records(path: &Path) -> Result<BTreeMap<usize, ResultRecord>, RecorderError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(id: usize) -> Trial {
        Trial::new(id, 0.06, 60.0)
    }

    #[test]
    fn flush_writes_indexed_records_and_clears() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = DataRecorder::new(tmp.path());
        recorder.accumulate(trial(1), 0.75, 58.0);
        recorder.accumulate(trial(0), 1.25, 63.5);

        let path = recorder.flush("session", 1).unwrap().unwrap();
        assert_eq!(path, tmp.path().join("session_1.json"));
        assert!(recorder.pending().is_empty());

        let text = fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["0"]["image"], 1);
        assert_eq!(raw["1"]["rt"], 1.25);
        assert_eq!(raw["1"]["answer"], 63.5);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[&0].slant, 60.0);
    }

    #[test]
    fn second_flush_with_same_key_gets_a_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = DataRecorder::new(tmp.path());

        recorder.accumulate(trial(0), 0.5, 60.0);
        let first = recorder.flush("practice", 2).unwrap().unwrap();
        recorder.accumulate(trial(1), 0.5, 60.0);
        let second = recorder.flush("practice", 2).unwrap().unwrap();
        recorder.accumulate(trial(2), 0.5, 60.0);
        let third = recorder.flush("practice", 2).unwrap().unwrap();

        assert_eq!(first.file_name().unwrap(), "practice_2.json");
        assert_eq!(second.file_name().unwrap(), "practice_2A.json");
        assert_eq!(third.file_name().unwrap(), "practice_2B.json");
        assert_eq!(load_records(&first).unwrap()[&0].image, 0);
        assert_eq!(recorder.written().len(), 3);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("session_1.json");
        File::create(&path).unwrap();

        let records = BTreeMap::from([(0, ResultRecord::from(&TrialResult::new(trial(0), 0.5, 60.0)))]);
        assert!(write_or_discard(&path, FullDisk, &records).is_err());
        assert!(!path.exists());

        // the unsuffixed name is free again for the retry
        let mut recorder = DataRecorder::new(tmp.path());
        recorder.accumulate(trial(0), 0.5, 60.0);
        assert_eq!(recorder.flush("session", 1).unwrap(), Some(path));
    }

    #[test]
    fn empty_buffer_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = DataRecorder::new(tmp.path().join("p"));
        assert_eq!(recorder.flush("session", 1).unwrap(), None);
        assert!(!tmp.path().join("p").exists());
    }

    #[test]
    fn runs_out_of_names_after_z() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("session_1.json")).unwrap();
        for c in 'A'..='Z' {
            File::create(tmp.path().join(format!("session_1{c}.json"))).unwrap();
        }
        let mut recorder = DataRecorder::new(tmp.path());
        recorder.accumulate(trial(0), 0.5, 60.0);
        assert!(matches!(
            recorder.flush("session", 1),
            Err(RecorderError::NamesExhausted { .. })
        ));
        assert_eq!(recorder.pending().len(), 1);
    }
}
