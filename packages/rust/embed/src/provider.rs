//! Embedding provider interface and the model bridge subprocess.
//!
//! The sentence-embedding model runs in an external process (loaded once,
//! offline at call time) driven over a JSON-lines stdin/stdout protocol:
//! the bridge announces `ready`, then answers each `embed` request with a
//! `result` carrying the vector, until `shutdown`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rollcall_shared::{EmbeddingConfig, Result, RollcallError};

/// A text-to-vector capability.
///
/// Implementations are deterministic for a fixed model version and return
/// vectors of one fixed length. Constructed once per process and injected
/// into the batch runner and search, never referenced as ambient state.
pub trait EmbeddingProvider {
    /// Encode one text into a dense vector.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;
}

// ---------------------------------------------------------------------------
// Protocol types (mirroring the bridge script's schemas)
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum RequestMessage {
    #[serde(rename = "embed")]
    Embed { id: String, text: String },
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result { id: String, vector: Vec<f32> },
    #[serde(rename = "error")]
    Error {
        #[allow(dead_code)]
        id: String,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Bridge provider
// ---------------------------------------------------------------------------

/// Handle to the spawned model bridge subprocess.
pub struct BridgeProvider {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
    dimensions: Option<usize>,
}

impl BridgeProvider {
    /// Spawn the bridge subprocess and wait for its ready signal.
    pub fn spawn(config: &EmbeddingConfig) -> Result<Self> {
        info!(
            cmd = %config.bridge_cmd,
            script = %config.bridge_script,
            model = %config.model_id,
            "spawning embedding bridge"
        );

        let mut child = Command::new(&config.bridge_cmd)
            .arg(&config.bridge_script)
            .arg("--model")
            .arg(&config.model_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Bridge logs go to parent stderr
            .spawn()
            .map_err(|e| {
                RollcallError::Embedding(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    config.bridge_cmd
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RollcallError::Embedding("failed to capture bridge stdin".into()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RollcallError::Embedding("failed to capture bridge stdout".into()))?;

        let mut provider = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
            dimensions: config.dimensions,
        };

        provider.wait_for_ready()?;

        Ok(provider)
    }

    /// Vector length observed so far (configured, or learned from the first
    /// result).
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Wait for the bridge to send its "ready" message.
    fn wait_for_ready(&mut self) -> Result<()> {
        let line = self.read_line()?;

        let msg: ResponseMessage = serde_json::from_str(line.trim()).map_err(|e| {
            RollcallError::Embedding(format!("invalid bridge ready message: {e} (got: {line})"))
        })?;

        match msg {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(())
            }
            _ => Err(RollcallError::Embedding(format!(
                "expected ready message, got: {line}"
            ))),
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| RollcallError::Embedding(format!("bridge read error: {e}")))?;

        if line.is_empty() {
            return Err(RollcallError::Embedding(
                "bridge closed stdout unexpectedly".into(),
            ));
        }

        Ok(line)
    }

    /// Send shutdown and wait for the bridge to exit.
    pub fn shutdown(mut self) -> Result<()> {
        let json = serde_json::to_string(&RequestMessage::Shutdown).unwrap_or_default();
        let _ = writeln!(self.stdin, "{json}");
        let _ = self.stdin.flush();

        match self.child.wait() {
            Ok(status) => {
                info!(?status, "bridge exited");
                Ok(())
            }
            Err(e) => {
                warn!("bridge wait error: {e}");
                Ok(())
            }
        }
    }
}

impl EmbeddingProvider for BridgeProvider {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        let request = RequestMessage::Embed {
            id: id.clone(),
            text: text.to_string(),
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| RollcallError::Embedding(format!("failed to serialize request: {e}")))?;

        writeln!(self.stdin, "{json}")
            .map_err(|e| RollcallError::Embedding(format!("failed to write to bridge stdin: {e}")))?;
        self.stdin
            .flush()
            .map_err(|e| RollcallError::Embedding(format!("failed to flush bridge stdin: {e}")))?;

        let line = self.read_line()?;

        let msg: ResponseMessage = serde_json::from_str(line.trim()).map_err(|e| {
            RollcallError::Embedding(format!(
                "invalid bridge response: {e} (got: {})",
                &line[..line.len().min(200)]
            ))
        })?;

        match msg {
            ResponseMessage::Result {
                id: resp_id,
                vector,
            } => {
                debug_assert_eq!(resp_id, id);
                check_dimensions(&mut self.dimensions, &vector)?;
                Ok(vector)
            }
            ResponseMessage::Error { id: _, error } => Err(RollcallError::Embedding(error)),
            ResponseMessage::Ready => Err(RollcallError::Embedding(
                "unexpected ready message during embedding".into(),
            )),
        }
    }
}

/// Enforce one fixed vector length per provider: the first observed length
/// (or the configured one) binds every later result.
fn check_dimensions(expected: &mut Option<usize>, vector: &[f32]) -> Result<()> {
    match *expected {
        Some(dims) if vector.len() != dims => Err(RollcallError::validation(format!(
            "embedding has {} dims, expected {dims}",
            vector.len()
        ))),
        Some(_) => Ok(()),
        None => {
            *expected = Some(vector.len());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_request_serializes_correctly() {
        let msg = RequestMessage::Embed {
            id: "req-1".into(),
            text: "Jane Doe John Doe".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"embed"#));
        assert!(json.contains(r#""id":"req-1"#));
        assert!(json.contains(r#""text":"Jane Doe John Doe"#));
    }

    #[test]
    fn shutdown_message_serializes_correctly() {
        let msg = RequestMessage::Shutdown;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"shutdown"}"#);
    }

    #[test]
    fn response_message_deserializes_ready() {
        let json = r#"{"type":"ready"}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ResponseMessage::Ready));
    }

    #[test]
    fn response_message_deserializes_result() {
        let json = r#"{"type":"result","id":"req-1","vector":[0.25,-0.5,1.0]}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        match msg {
            ResponseMessage::Result { id, vector } => {
                assert_eq!(id, "req-1");
                assert_eq!(vector, vec![0.25, -0.5, 1.0]);
            }
            _ => panic!("expected Result"),
        }
    }

    #[test]
    fn response_message_deserializes_error() {
        let json = r#"{"type":"error","id":"req-2","error":"model not loaded"}"#;
        let msg: ResponseMessage = serde_json::from_str(json).unwrap();
        match msg {
            ResponseMessage::Error { id, error } => {
                assert_eq!(id, "req-2");
                assert_eq!(error, "model not loaded");
            }
            _ => panic!("expected Error"),
        }
    }

    #[test]
    fn dimensions_learned_from_first_vector() {
        let mut dims = None;
        check_dimensions(&mut dims, &[0.1, 0.2, 0.3]).unwrap();
        assert_eq!(dims, Some(3));
        check_dimensions(&mut dims, &[0.4, 0.5, 0.6]).unwrap();
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut dims = Some(384);
        let err = check_dimensions(&mut dims, &[0.1, 0.2]).unwrap_err();
        assert!(err.to_string().contains("expected 384"));
    }
}
