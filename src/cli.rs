use std::path::PathBuf;

use clap::Parser;
use slant_experiment::Intake;

/// Slanted relief stimulus presentation rig.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// Participant id; a fresh three-digit id is assigned when omitted
    #[arg(long)]
    pub id: Option<String>,

    /// Participant name, required for new participants
    #[arg(long)]
    pub name: Option<String>,

    /// Session number, 1-based
    #[arg(long, default_value_t = 1)]
    pub session: u32,

    /// Interpupillary distance (cm), required for new participants
    #[arg(long)]
    pub pupil_size: Option<f64>,

    /// Run a practice block before the experimental block
    #[arg(long)]
    pub practice: bool,

    /// Render one view per eye side by side
    #[arg(long)]
    pub stereo: bool,

    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,
}

impl Cli {
    pub fn intake(&self) -> Intake {
        Intake {
            id: self.id.clone(),
            name: self.name.clone(),
            pupil_size: self.pupil_size,
            session: self.session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_intake_flags() {
        let cli = Cli::try_parse_from([
            "slant-rig",
            "--id",
            "007",
            "--session",
            "2",
            "--practice",
            "--stereo",
        ])
        .unwrap();
        assert!(cli.practice && cli.stereo);
        let intake = cli.intake();
        assert_eq!(intake.id.as_deref(), Some("007"));
        assert_eq!(intake.session, 2);
        assert_eq!(intake.pupil_size, None);
    }

    #[test]
    fn defaults_to_first_session_without_practice() {
        let cli = Cli::try_parse_from(["slant-rig", "--name", "ada", "--pupil-size", "6.2"]).unwrap();
        assert_eq!(cli.session, 1);
        assert!(!cli.practice && !cli.stereo);
        assert_eq!(cli.config_dir, PathBuf::from("config"));
        assert_eq!(cli.intake().pupil_size, Some(6.2));
    }

    #[test]
    fn rejects_non_numeric_pupil_size() {
        assert!(Cli::try_parse_from(["slant-rig", "--pupil-size", "wide"]).is_err());
    }
}
