//! The Coprocess Recognizer variant and its wire protocol (§4.4): a child
//! process reached over its stdin/stdout pipes, speaking a line-based
//! control protocol with interleaved binary PCM payloads.
//!
//! Wire protocol, exactly as specified:
//!
//! ```text
//! Client -> Child, one of:
//!   PROCESS <nbytes>\n  followed by exactly <nbytes> raw PCM bytes
//!   FINAL\n
//!   RESET\n
//!   MODEL <path>\n
//!
//! Child -> Client, one JSON object per line, one of:
//!   {"partial": "..."}
//!   {"alternatives": [{"text":"...","confidence":<num>}, ...]}
//!   {"status": "ok"}
//!   {"error": "<message>"}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{error, warn};

use crate::audio::chunk::PcmChunk;
use crate::engine::recognizer::{Alternative, RecognitionResult};
use crate::error::{Error, Result};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChildMessage {
    Partial { partial: String },
    Final { alternatives: Vec<WireAlternative> },
    Status { status: String },
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct WireAlternative {
    text: String,
    confidence: Option<f32>,
}

/// A child-process recognizer reached over its stdin/stdout pipes.
pub struct CoprocessRecognizer {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl CoprocessRecognizer {
    /// Spawn `program`, send `MODEL <model_path>`, and block for `status: ok`
    /// within [`HANDSHAKE_TIMEOUT`]. Fails loudly (per §4.4) if the child
    /// does not ack in time.
    pub fn spawn(program: &str, args: &[String], model_path: &Path) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::EngineInit {
                detail: format!("failed to spawn coprocess '{program}': {e}"),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| Error::EngineInit {
            detail: "coprocess stdin not piped".into(),
        })?;
        let stdout = BufReader::new(child.stdout.take().ok_or_else(|| Error::EngineInit {
            detail: "coprocess stdout not piped".into(),
        })?);

        let mut recognizer = Self {
            child,
            stdin,
            stdout,
        };

        recognizer.send_line(&format!("MODEL {}\n", model_path.display()))?;
        recognizer.await_ack(HANDSHAKE_TIMEOUT)?;
        Ok(recognizer)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).map_err(Error::Io)?;
        self.stdin.flush().map_err(Error::Io)
    }

    fn send_pcm(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_line(&format!("PROCESS {}\n", bytes.len()))?;
        self.stdin.write_all(bytes).map_err(Error::Io)?;
        self.stdin.flush().map_err(Error::Io)
    }

    /// Block (up to `timeout`) for the next `{"status": "ok"}` line, treating
    /// any `error` line or premature EOF as a fatal handshake failure.
    fn await_ack(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(Error::CoprocessHandshakeTimeout);
            }
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).map_err(Error::Io)?;
            if n == 0 {
                return Err(Error::CoprocessHandshakeTimeout);
            }
            match parse_message(&line)? {
                ChildMessage::Status { status } if status == "ok" => return Ok(()),
                ChildMessage::Error { error: msg } => {
                    return Err(Error::EngineInit { detail: msg })
                }
                _ => continue,
            }
        }
    }

    /// Read the next NDJSON line and translate it into a [`RecognitionResult`],
    /// or `None` for a bare `{"status":"ok"}` acknowledgment.
    fn read_result(&mut self) -> Result<Option<RecognitionResult>> {
        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).map_err(Error::Io)?;
        if n == 0 {
            return Err(Error::EngineFatal {
                detail: "coprocess closed stdout unexpectedly".into(),
            });
        }
        match parse_message(&line)? {
            ChildMessage::Partial { partial } => {
                Ok(Some(RecognitionResult::Partial { text: partial }))
            }
            ChildMessage::Final { alternatives } => Ok(Some(RecognitionResult::Final {
                alternatives: alternatives
                    .into_iter()
                    .map(|a| Alternative {
                        text: a.text,
                        confidence: a.confidence,
                    })
                    .collect(),
            })),
            ChildMessage::Status { .. } => Ok(None),
            ChildMessage::Error { error: msg } => {
                // Recognition errors inside a chunk are non-fatal (§4.4):
                // log and treat as "no result" rather than propagating.
                warn!(error = %msg, "coprocess reported a recognition error");
                Ok(None)
            }
        }
    }

    pub fn process(&mut self, chunk: &PcmChunk) -> Result<Option<RecognitionResult>> {
        if let Err(e) = self.send_pcm(&chunk.bytes) {
            return Err(Error::EngineFatal {
                detail: format!("coprocess write failed: {e}"),
            });
        }
        self.read_result()
    }

    pub fn final_(&mut self) -> Result<Option<RecognitionResult>> {
        self.send_line("FINAL\n")?;
        self.read_result()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.send_line("RESET\n")?;
        // RESET is a synchronous barrier: wait for the ack before returning.
        self.await_ack(Duration::from_secs(5))
    }

    pub fn close(mut self) -> Result<()> {
        // Dropping stdin closes the pipe, sending EOF — the child's cue to exit.
        drop(self.stdin.flush());
        drop(self.stdin);
        match self.child.wait() {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(error = %e, "failed to reap coprocess");
                Err(Error::Io(e))
            }
        }
    }
}

fn parse_message(line: &str) -> Result<ChildMessage> {
    serde_json::from_str(line.trim()).map_err(|e| Error::CoprocessProtocol {
        detail: format!("malformed NDJSON line {line:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_message() {
        let msg = parse_message(r#"{"partial": "hello"}"#).unwrap();
        matches!(msg, ChildMessage::Partial { partial } if partial == "hello");
    }

    #[test]
    fn parses_final_message_with_alternatives() {
        let msg = parse_message(
            r#"{"alternatives": [{"text":"hello world","confidence":300}]}"#,
        )
        .unwrap();
        match msg {
            ChildMessage::Final { alternatives } => {
                assert_eq!(alternatives[0].text, "hello world");
                assert_eq!(alternatives[0].confidence, Some(300.0));
            }
            _ => panic!("expected Final"),
        }
    }

    #[test]
    fn parses_status_and_error_messages() {
        assert!(matches!(
            parse_message(r#"{"status":"ok"}"#).unwrap(),
            ChildMessage::Status { status } if status == "ok"
        ));
        assert!(matches!(
            parse_message(r#"{"error":"model not found"}"#).unwrap(),
            ChildMessage::Error { .. }
        ));
    }

    #[test]
    fn malformed_line_is_a_protocol_error() {
        let err = parse_message("not json").unwrap_err();
        assert!(matches!(err, Error::CoprocessProtocol { .. }));
    }
}
