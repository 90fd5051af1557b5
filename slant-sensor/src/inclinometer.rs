use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use slant_core::ConfigurationError;

use crate::error::SensorError;
use crate::protocol::{LineSession, Response, SensorCommand};
use crate::TiltSensor;

const QUIT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Helper program speaking the line protocol on stdin/stdout
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Added to the raw Y reading to give the response angle (degrees)
    pub angle_offset: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("inclinometer"),
            args: Vec::new(),
            angle_offset: 90.0,
        }
    }
}

type PipeSession = LineSession<ChildStdin, BufReader<ChildStdout>>;

/// Tilt sensor driven through a child process.
pub struct Inclinometer {
    child: Child,
    session: Option<PipeSession>,
    angle_offset: f64,
}

impl Inclinometer {
    pub fn spawn(config: &SensorConfig) -> Result<Self, ConfigurationError> {
        let mut child = Command::new(&config.executable)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ConfigurationError::MissingSensorExecutable {
                        path: config.executable.clone(),
                    }
                }
                _ => ConfigurationError::invalid(format!(
                    "failed to start sensor {}: {e}",
                    config.executable.display()
                )),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConfigurationError::invalid("sensor pipes unavailable"));
        };

        log::info!("started sensor {} (pid {})", config.executable.display(), child.id());
        Ok(Self {
            child,
            session: Some(LineSession::new(stdin, BufReader::new(stdout))),
            angle_offset: config.angle_offset,
        })
    }

    pub fn serial_number(&mut self) -> Result<i64, SensorError> {
        match self.exchange(SensorCommand::GetSerialNumber)? {
            Response::Int(n) => Ok(n),
            Response::Float(v) => Ok(v as i64),
        }
    }

    /// Raw reading for one of the angle commands.
    pub fn read(&mut self, command: SensorCommand) -> Result<f64, SensorError> {
        Ok(self.exchange(command)?.as_f64())
    }

    fn exchange(&mut self, command: SensorCommand) -> Result<Response, SensorError> {
        let session = self.session.as_mut().ok_or(SensorError::Closed)?;
        match session.exchange(command) {
            Ok(reply) => Ok(reply),
            Err(err @ (SensorError::UnexpectedEof { .. } | SensorError::Io(_))) => {
                // a dead helper is reported as an exit rather than a pipe error
                match self.child.try_wait() {
                    Ok(Some(status)) => Err(SensorError::Exited {
                        status: status.to_string(),
                    }),
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn shutdown(&mut self) -> Result<(), SensorError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        if let Err(e) = session.send(SensorCommand::Quit) {
            log::debug!("sensor quit not delivered: {e}");
        }
        drop(session);

        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            if let Some(status) = self.child.try_wait()? {
                log::info!("sensor exited ({status})");
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        log::warn!("sensor ignored quit, terminating it");
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl TiltSensor for Inclinometer {
    fn read_angle(&mut self) -> Result<f64, SensorError> {
        Ok(self.read(SensorCommand::GetY)? + self.angle_offset)
    }

    fn zero_offset(&mut self) -> Result<(), SensorError> {
        self.exchange(SensorCommand::SetOffsetY).map(|_| ())
    }

    fn close(&mut self) -> Result<(), SensorError> {
        self.shutdown()
    }
}

impl Drop for Inclinometer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("sensor shutdown failed: {e}");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const FAKE_SENSOR: &str = r#"
while read cmd; do
  case "$cmd" in
    getY) echo -12.5 ;;
    setOffsetY) echo 1 ;;
    getSerialNumber) echo 4242 ;;
    quit) exit 0 ;;
    *) echo bogus ;;
  esac
done
"#;

    fn fake(script: &str) -> SensorConfig {
        SensorConfig {
            executable: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            angle_offset: 90.0,
        }
    }

    #[test]
    fn reads_angle_with_offset() {
        let mut sensor = Inclinometer::spawn(&fake(FAKE_SENSOR)).unwrap();
        sensor.zero_offset().unwrap();
        assert_eq!(sensor.serial_number().unwrap(), 4242);
        assert_eq!(sensor.read_angle().unwrap(), 77.5);
        sensor.close().unwrap();
    }

    #[test]
    fn close_is_idempotent_and_blocks_later_reads() {
        let mut sensor = Inclinometer::spawn(&fake(FAKE_SENSOR)).unwrap();
        sensor.close().unwrap();
        sensor.close().unwrap();
        assert!(matches!(sensor.read_angle(), Err(SensorError::Closed)));
    }

    #[test]
    fn malformed_reply_is_reported() {
        let mut sensor = Inclinometer::spawn(&fake(FAKE_SENSOR)).unwrap();
        assert!(matches!(
            sensor.read(SensorCommand::GetX),
            Err(SensorError::Malformed { command: "getX", .. })
        ));
    }

    #[test]
    fn exited_helper_is_detected() {
        let mut sensor = Inclinometer::spawn(&fake("read cmd; exit 3")).unwrap();
        match sensor.read_angle() {
            Err(SensorError::Exited { .. }) | Err(SensorError::UnexpectedEof { .. }) => {}
            other => panic!("expected the exit to surface, got {other:?}"),
        }
    }

    #[test]
    fn missing_executable_is_a_configuration_error() {
        let config = SensorConfig {
            executable: PathBuf::from("/nonexistent/inclinometer"),
            ..SensorConfig::default()
        };
        assert!(matches!(
            Inclinometer::spawn(&config),
            Err(ConfigurationError::MissingSensorExecutable { .. })
        ));
    }
}
