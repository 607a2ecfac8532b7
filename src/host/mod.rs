//! Control host: the stdio channel between a running session and the
//! external lock-screen UI.
//!
//! Frames are a 4-byte little-endian length followed by that many bytes of
//! JSON. The UI sends input codes and stop requests; the host answers status
//! requests and forwards overlay show/close commands as they happen.

use crate::config::{usage_limit_text, MonitorConfig};
use crate::error::AppError;
use crate::lock::OverlayCommand;
use crate::matcher::InputCode;
use crate::service::SessionHandle;
use crate::session::SessionStatus;
use crossbeam_channel::{select, unbounded, Receiver};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};
use std::thread;

/// Frames larger than this are rejected (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Input { code: InputCode },
    ExternalStop,
    RequestStatus,
    #[serde(rename_all = "camelCase")]
    Configure {
        target_app_id: String,
        #[serde(default)]
        usage_limit_minutes: Option<Value>,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    Status(SessionStatus),
    Overlay { action: OverlayCommand },
    Error { message: String },
}

/// What the stdin reader thread saw.
#[derive(Debug)]
pub enum ReaderEvent {
    Message(IncomingMessage),
    /// A well-framed payload that is not a valid message.
    Malformed(String),
    Closed,
    Failed(io::Error),
}

pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = usize::try_from(u32::from_le_bytes(len_bytes))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Message too large: {len} bytes (max: {MAX_MESSAGE_SIZE} bytes)"),
        ));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

pub fn read_message<R: Read>(reader: &mut R) -> io::Result<IncomingMessage> {
    let frame = read_frame(reader)?;
    serde_json::from_slice(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn write_message<W: Write>(writer: &mut W, message: &OutgoingMessage) -> io::Result<()> {
    let json = serde_json::to_vec(message)?;
    let len = u32::try_from(json.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Read frames on a background thread until EOF or an I/O failure.
pub fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> Receiver<ReaderEvent> {
    let (tx, rx) = unbounded();

    thread::spawn(move || loop {
        let event = match read_frame(&mut reader) {
            Ok(frame) => match serde_json::from_slice(&frame) {
                Ok(message) => ReaderEvent::Message(message),
                Err(e) => ReaderEvent::Malformed(e.to_string()),
            },
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => ReaderEvent::Closed,
            Err(e) => ReaderEvent::Failed(e),
        };
        let done = matches!(event, ReaderEvent::Closed | ReaderEvent::Failed(_));
        if tx.send(event).is_err() || done {
            break;
        }
    });

    rx
}

pub struct ControlHost {
    session: SessionHandle,
}

impl ControlHost {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    /// Serve until the peer asks to stop, hangs up, or the session ends.
    /// Then stop the session and forward the overlay commands its teardown
    /// produced.
    pub fn run<W: Write>(
        self,
        incoming: &Receiver<ReaderEvent>,
        overlay: &Receiver<OverlayCommand>,
        writer: &mut W,
    ) -> Result<(), AppError> {
        let served = self.serve(incoming, overlay, writer);
        let stopped = self.session.stop();
        served?;

        for action in overlay.try_iter() {
            write_message(writer, &OutgoingMessage::Overlay { action })?;
        }
        stopped
    }

    fn serve<W: Write>(
        &self,
        incoming: &Receiver<ReaderEvent>,
        overlay: &Receiver<OverlayCommand>,
        writer: &mut W,
    ) -> io::Result<()> {
        loop {
            select! {
                recv(incoming) -> event => match event {
                    Ok(ReaderEvent::Message(IncomingMessage::Stop)) => {
                        debug!("Control peer requested stop");
                        return Ok(());
                    }
                    Ok(ReaderEvent::Message(message)) => {
                        if let Some(reply) = self.handle_message(message) {
                            write_message(writer, &reply)?;
                        }
                    }
                    Ok(ReaderEvent::Malformed(reason)) => {
                        warn!("Ignoring malformed control message: {reason}");
                        write_message(writer, &OutgoingMessage::Error { message: reason })?;
                    }
                    Ok(ReaderEvent::Closed) | Err(_) => return Ok(()),
                    Ok(ReaderEvent::Failed(e)) => return Err(e),
                },
                recv(overlay) -> command => match command {
                    Ok(action) => write_message(writer, &OutgoingMessage::Overlay { action })?,
                    Err(_) => return Ok(()),
                },
            }
        }
    }

    fn handle_message(&self, message: IncomingMessage) -> Option<OutgoingMessage> {
        let result = match message {
            IncomingMessage::Input { code } => self.session.send_input(code),
            IncomingMessage::ExternalStop => self.session.request_close(),
            IncomingMessage::RequestStatus => {
                return Some(OutgoingMessage::Status(self.session.status()));
            }
            IncomingMessage::Configure {
                target_app_id,
                usage_limit_minutes,
            } => {
                let raw_limit = usage_limit_minutes.as_ref().and_then(usage_limit_text);
                MonitorConfig::from_minutes(&target_app_id, raw_limit.as_deref())
                    .and_then(|config| self.session.reconfigure(config))
            }
            IncomingMessage::Stop => Ok(()),
        };

        result.err().map(|e| OutgoingMessage::Error {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MonotonicClock};
    use crate::lock::ChannelPresenter;
    use crate::probe::ForegroundApp;
    use crate::session::{Session, SessionOptions};
    use std::io::Cursor;
    use std::time::Duration;

    fn frame(json: &str) -> Vec<u8> {
        let mut bytes = u32::try_from(json.len()).unwrap().to_le_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    fn written_messages(bytes: &[u8]) -> Vec<Value> {
        let mut cursor = Cursor::new(bytes);
        let mut messages = Vec::new();
        while usize::try_from(cursor.position()).unwrap() < bytes.len() {
            let payload = read_frame(&mut cursor).unwrap();
            messages.push(serde_json::from_slice(&payload).unwrap());
        }
        messages
    }

    fn spawn_session(limit_ms: i64) -> (SessionHandle, Receiver<OverlayCommand>) {
        let (tx, rx) = unbounded();
        let options = SessionOptions {
            tick_interval: Duration::from_millis(10),
            sequence_timeout_ms: 3000,
        };
        let clock = MonotonicClock::new();
        let session = Session::start(
            MonitorConfig::new("game", limit_ms).unwrap(),
            Box::new(|_now: i64| ForegroundApp::Known("game".into())),
            ChannelPresenter::new(tx),
            options,
            clock.now_millis(),
        );
        (SessionHandle::spawn(session, options, clock).unwrap(), rx)
    }

    #[test]
    fn test_read_message_variants() {
        let mut cursor = Cursor::new(frame(r#"{"type":"input","code":24}"#));
        assert_eq!(
            read_message(&mut cursor).unwrap(),
            IncomingMessage::Input { code: InputCode::VolumeUp }
        );

        let mut cursor = Cursor::new(frame(r#"{"type":"external_stop"}"#));
        assert_eq!(read_message(&mut cursor).unwrap(), IncomingMessage::ExternalStop);

        let mut cursor = Cursor::new(frame(
            r#"{"type":"configure","targetAppId":"game","usageLimitMinutes":"15"}"#,
        ));
        assert_eq!(
            read_message(&mut cursor).unwrap(),
            IncomingMessage::Configure {
                target_app_id: "game".into(),
                usage_limit_minutes: Some(Value::String("15".into())),
            }
        );
    }

    #[test]
    fn test_read_frame_rejects_oversized() {
        let len = u32::try_from(MAX_MESSAGE_SIZE + 1).unwrap();
        let mut cursor = Cursor::new(len.to_le_bytes().to_vec());
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_frame_truncated_is_eof() {
        let mut bytes = frame(r#"{"type":"stop"}"#);
        bytes.truncate(6);
        let err = read_frame(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_write_message_is_length_prefixed() {
        let mut out = Vec::new();
        write_message(&mut out, &OutgoingMessage::Overlay { action: OverlayCommand::Show }).unwrap();

        let messages = written_messages(&out);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "overlay");
        assert_eq!(messages[0]["action"], "show");
    }

    #[test]
    fn test_reader_reports_malformed_then_closed() {
        let mut bytes = frame(r#"{"type":"dance"}"#);
        bytes.extend(frame(r#"{"type":"request_status"}"#));
        let events = spawn_reader(Cursor::new(bytes));

        assert!(matches!(events.recv().unwrap(), ReaderEvent::Malformed(_)));
        assert!(matches!(
            events.recv().unwrap(),
            ReaderEvent::Message(IncomingMessage::RequestStatus)
        ));
        assert!(matches!(events.recv().unwrap(), ReaderEvent::Closed));
    }

    #[test]
    fn test_status_and_validation_replies() {
        let (session, overlay) = spawn_session(60_000);
        let host = ControlHost::new(session);

        let mut bytes = frame(r#"{"type":"request_status"}"#);
        bytes.extend(frame(r#"{"type":"configure","targetAppId":"  "}"#));
        bytes.extend(frame(r#"{"type":"stop"}"#));
        let incoming = spawn_reader(Cursor::new(bytes));

        let mut out = Vec::new();
        host.run(&incoming, &overlay, &mut out).unwrap();

        let messages = written_messages(&out);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "status");
        assert_eq!(messages[0]["targetAppId"], "game");
        assert_eq!(messages[0]["state"], "monitoring");
        assert_eq!(messages[1]["type"], "error");
    }

    #[test]
    fn test_overlay_commands_forwarded_and_input_unlocks() {
        let (session, overlay) = spawn_session(50);
        let host = ControlHost::new(session);
        let (tx, incoming) = unbounded();

        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            for code in [24u32, 24, 25] {
                tx.send(ReaderEvent::Message(IncomingMessage::Input { code: code.into() }))
                    .unwrap();
            }
            thread::sleep(Duration::from_millis(100));
            tx.send(ReaderEvent::Message(IncomingMessage::Stop)).unwrap();
        });

        let mut out = Vec::new();
        host.run(&incoming, &overlay, &mut out).unwrap();
        feeder.join().unwrap();

        let actions: Vec<_> = written_messages(&out)
            .into_iter()
            .filter(|m| m["type"] == "overlay")
            .map(|m| m["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions.first().map(String::as_str), Some("show"));
        assert_eq!(actions.get(1).map(String::as_str), Some("close"));
    }

    #[test]
    fn test_stop_while_locked_delivers_close() {
        let (session, overlay) = spawn_session(50);
        let host = ControlHost::new(session);
        let (tx, incoming) = unbounded();

        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            tx.send(ReaderEvent::Message(IncomingMessage::Stop)).unwrap();
        });

        let mut out = Vec::new();
        host.run(&incoming, &overlay, &mut out).unwrap();
        feeder.join().unwrap();

        let actions: Vec<_> = written_messages(&out)
            .into_iter()
            .filter(|m| m["type"] == "overlay")
            .map(|m| m["action"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(actions, vec!["show", "close"]);
    }
}
