pub mod error;
pub mod inclinometer;
pub mod protocol;
pub mod stub;

pub use error::SensorError;
pub use inclinometer::{Inclinometer, SensorConfig};
pub use protocol::{LineSession, Response, SensorCommand};
pub use stub::StubSensor;

/// Synchronous tilt sensor as seen by the presentation controller.
pub trait TiltSensor {
    /// Current response angle in degrees.
    fn read_angle(&mut self) -> Result<f64, SensorError>;

    /// Make the current orientation the sensor's zero. Called once per session.
    fn zero_offset(&mut self) -> Result<(), SensorError>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), SensorError>;
}
