use std::io::{BufRead, Write};

use crate::error::SensorError;

/// Line protocol understood by the inclinometer helper. Every command except
/// `Quit` is answered with exactly one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    GetSerialNumber,
    GetX,
    GetY,
    GetOffsetX,
    SetOffsetX,
    ResetOffsetX,
    GetOffsetY,
    SetOffsetY,
    ResetOffsetY,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Int(i64),
    Float(f64),
}

impl Response {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Response::Int(v) => v as f64,
            Response::Float(v) => v,
        }
    }
}

impl SensorCommand {
    pub fn wire(&self) -> &'static str {
        match self {
            SensorCommand::GetSerialNumber => "getSerialNumber",
            SensorCommand::GetX => "getX",
            SensorCommand::GetY => "getY",
            SensorCommand::GetOffsetX => "getOffsetX",
            SensorCommand::SetOffsetX => "setOffsetX",
            SensorCommand::ResetOffsetX => "resetOffsetX",
            SensorCommand::GetOffsetY => "getOffsetY",
            SensorCommand::SetOffsetY => "setOffsetY",
            SensorCommand::ResetOffsetY => "resetOffsetY",
            SensorCommand::Quit => "quit",
        }
    }

    pub fn expects_reply(&self) -> bool {
        !matches!(self, SensorCommand::Quit)
    }

    /// Parse one reply line as the type this command returns.
    pub fn parse_reply(&self, line: &str) -> Result<Response, SensorError> {
        let text = line.trim();
        let malformed = || SensorError::Malformed {
            command: self.wire(),
            line: line.trim_end_matches(['\r', '\n']).to_string(),
        };
        match self {
            SensorCommand::GetX
            | SensorCommand::GetY
            | SensorCommand::GetOffsetX
            | SensorCommand::GetOffsetY => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Response::Float)
                .ok_or_else(malformed),
            SensorCommand::GetSerialNumber
            | SensorCommand::SetOffsetX
            | SensorCommand::ResetOffsetX
            | SensorCommand::SetOffsetY
            | SensorCommand::ResetOffsetY => {
                text.parse::<i64>().map(Response::Int).map_err(|_| malformed())
            }
            SensorCommand::Quit => Err(malformed()),
        }
    }
}

/// Strict request/response exchange over a writer/reader pair.
#[derive(Debug)]
pub struct LineSession<W, R> {
    writer: W,
    reader: R,
}

impl<W: Write, R: BufRead> LineSession<W, R> {
    pub fn new(writer: W, reader: R) -> Self {
        Self { writer, reader }
    }

    /// Send a command that has no reply.
    pub fn send(&mut self, command: SensorCommand) -> Result<(), SensorError> {
        writeln!(self.writer, "{}", command.wire())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Send a command and block for its single reply line.
    pub fn exchange(&mut self, command: SensorCommand) -> Result<Response, SensorError> {
        self.send(command)?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(SensorError::UnexpectedEof {
                command: command.wire(),
            });
        }
        log::trace!("sensor {} -> {}", command.wire(), line.trim_end());
        command.parse_reply(&line)
    }

    pub fn into_parts(self) -> (W, R) {
        (self.writer, self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session(replies: &str) -> LineSession<Vec<u8>, Cursor<Vec<u8>>> {
        LineSession::new(Vec::new(), Cursor::new(replies.as_bytes().to_vec()))
    }

    #[test]
    fn float_and_int_replies_are_typed_per_command() {
        let mut s = session("-12.25\n1\n4242\n");
        assert_eq!(s.exchange(SensorCommand::GetY).unwrap(), Response::Float(-12.25));
        assert_eq!(s.exchange(SensorCommand::SetOffsetY).unwrap(), Response::Int(1));
        assert_eq!(
            s.exchange(SensorCommand::GetSerialNumber).unwrap(),
            Response::Int(4242)
        );

        let (written, _) = s.into_parts();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "getY\nsetOffsetY\ngetSerialNumber\n"
        );
    }

    #[test]
    fn integer_command_rejects_float_reply() {
        let mut s = session("1.5\n");
        match s.exchange(SensorCommand::ResetOffsetX) {
            Err(SensorError::Malformed { command, line }) => {
                assert_eq!(command, "resetOffsetX");
                assert_eq!(line, "1.5");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn garbage_and_non_finite_replies_are_malformed() {
        let mut s = session("tilt?\nNaN\n");
        assert!(matches!(
            s.exchange(SensorCommand::GetX),
            Err(SensorError::Malformed { .. })
        ));
        assert!(matches!(
            s.exchange(SensorCommand::GetX),
            Err(SensorError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_reply_is_unexpected_eof() {
        let mut s = session("");
        assert!(matches!(
            s.exchange(SensorCommand::GetY),
            Err(SensorError::UnexpectedEof { command: "getY" })
        ));
    }

    #[test]
    fn quit_is_fire_and_forget() {
        assert!(!SensorCommand::Quit.expects_reply());
        let mut s = session("");
        s.send(SensorCommand::Quit).unwrap();
        let (written, _) = s.into_parts();
        assert_eq!(written, b"quit\n");
    }
}
