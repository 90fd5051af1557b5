use std::collections::VecDeque;

use crate::error::SensorError;
use crate::TiltSensor;

/// Deterministic sensor for tests and dry runs. Replays queued readings, then
/// repeats `fallback`.
#[derive(Debug, Clone, Default)]
pub struct StubSensor {
    pub readings: VecDeque<f64>,
    pub fallback: f64,
    /// Read number (1-based) that fails with an unexpected EOF
    pub fail_on_read: Option<usize>,
    pub reads: usize,
    pub zero_offsets: usize,
    pub closes: usize,
    closed: bool,
}

impl StubSensor {
    pub fn new(fallback: f64) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub fn with_readings(readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, read: usize) -> Self {
        self.fail_on_read = Some(read);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TiltSensor for StubSensor {
    fn read_angle(&mut self) -> Result<f64, SensorError> {
        if self.closed {
            return Err(SensorError::Closed);
        }
        self.reads += 1;
        if self.fail_on_read == Some(self.reads) {
            return Err(SensorError::UnexpectedEof { command: "getY" });
        }
        Ok(self.readings.pop_front().unwrap_or(self.fallback))
    }

    fn zero_offset(&mut self) -> Result<(), SensorError> {
        if self.closed {
            return Err(SensorError::Closed);
        }
        self.zero_offsets += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SensorError> {
        if !self.closed {
            self.closed = true;
            self.closes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_then_falls_back() {
        let mut stub = StubSensor::with_readings([61.0, 58.5]);
        stub.fallback = 90.0;
        assert_eq!(stub.read_angle().unwrap(), 61.0);
        assert_eq!(stub.read_angle().unwrap(), 58.5);
        assert_eq!(stub.read_angle().unwrap(), 90.0);
        assert_eq!(stub.reads, 3);
    }

    #[test]
    fn scripted_failure_and_single_close() {
        let mut stub = StubSensor::new(0.0).failing_on(2);
        assert!(stub.read_angle().is_ok());
        assert!(stub.read_angle().is_err());
        stub.close().unwrap();
        stub.close().unwrap();
        assert_eq!(stub.closes, 1);
        assert!(matches!(stub.read_angle(), Err(SensorError::Closed)));
    }
}
