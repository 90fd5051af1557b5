use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slant_core::ConfigurationError;

use crate::error::{RecorderError, SessionError};

const MANIFEST: &str = "data.json";

/// Participant manifest, written once per participant directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Pupil Size")]
    pub pupil_size: f64,
}

/// Values collected from the operator before a session.
#[derive(Debug, Clone, Default)]
pub struct Intake {
    pub id: Option<String>,
    pub name: Option<String>,
    pub pupil_size: Option<f64>,
    pub session: u32,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub manifest: Manifest,
    pub dir: PathBuf,
    pub session: u32,
    /// This run wrote the manifest
    pub is_new: bool,
}

impl Participant {
    /// Resolve the participant directory, reusing an existing manifest for a
    /// returning participant and creating both for a new one.
    pub fn resolve(data_dir: &Path, intake: &Intake, total_sessions: u32) -> Result<Self, SessionError> {
        if intake.session == 0 || intake.session > total_sessions {
            return Err(ConfigurationError::invalid(format!(
                "session {} outside 1..={total_sessions}",
                intake.session
            ))
            .into());
        }
        fs::create_dir_all(data_dir).map_err(RecorderError::from)?;

        if let Some(id) = &intake.id {
            if let Some(dir) = find_existing(data_dir, id).map_err(RecorderError::from)? {
                let manifest = read_manifest(&dir)?;
                log::info!("returning participant {} ({})", manifest.id, manifest.name);
                return Ok(Self {
                    manifest,
                    dir,
                    session: intake.session,
                    is_new: false,
                });
            }
        }

        let id = match &intake.id {
            Some(id) => id.clone(),
            None => next_id(data_dir).map_err(RecorderError::from)?,
        };
        let name = intake
            .name
            .as_deref()
            .map(title_case)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ConfigurationError::invalid("participant name is required"))?;
        let pupil_size = intake
            .pupil_size
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| ConfigurationError::invalid("a positive pupil size is required"))?;

        let dir = data_dir.join(format!("{id}_{}", name.replace(' ', "")));
        fs::create_dir_all(&dir).map_err(RecorderError::from)?;

        let mut participant = Self {
            manifest: Manifest {
                id,
                name,
                pupil_size,
            },
            dir,
            session: intake.session,
            is_new: false,
        };
        participant.is_new = participant.write_manifest()?;
        Ok(participant)
    }

    /// Write `data.json` unless it already exists. Returns whether it was
    /// written.
    fn write_manifest(&self) -> Result<bool, RecorderError> {
        let path = self.dir.join(MANIFEST);
        let file = match File::options().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.manifest)?;
        writer.flush()?;
        log::info!("wrote participant manifest {}", path.display());
        Ok(true)
    }
}

/// Next free three-digit participant id: one past the largest numeric
/// directory prefix, `"001"` for an empty data directory.
pub fn next_id(data_dir: &Path) -> io::Result<String> {
    let mut max = 0u32;
    for entry in fs::read_dir(data_dir)? {
        let name = entry?.file_name();
        let Some(prefix) = name.to_str().and_then(|n| n.get(..3)) else {
            continue;
        };
        if prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = prefix.parse::<u32>() {
                max = max.max(n);
            }
        }
    }
    Ok(format!("{:03}", max + 1))
}

fn find_existing(data_dir: &Path, id: &str) -> io::Result<Option<PathBuf>> {
    let prefix = format!("{id}_");
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(&prefix));
        if matches && entry.path().join(MANIFEST).is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn read_manifest(dir: &Path) -> Result<Manifest, RecorderError> {
    let text = fs::read_to_string(dir.join(MANIFEST))?;
    Ok(serde_json::from_str(&text)?)
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
