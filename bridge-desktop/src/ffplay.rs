//! Decode backend running one `ffplay` child process per session

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{DecodeBackend, PlaybackCompletion, PlaybackSessionId},
};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

enum SessionState {
    Loaded(PathBuf),
    Playing(oneshot::Sender<()>),
}

/// `ffplay`-based audio output.
///
/// `load` only validates the file; the child process starts on `play` and
/// its exit is the session's end-of-stream. `stop` kills the child.
pub struct FfplayBackend {
    program: PathBuf,
    sessions: Arc<Mutex<HashMap<PlaybackSessionId, SessionState>>>,
}

impl FfplayBackend {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffplay"),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Use a specific executable (e.g. an absolute path on the device).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Number of sessions that are loaded or playing.
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for FfplayBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecodeBackend for FfplayBackend {
    async fn load(&self, path: &Path) -> Result<PlaybackSessionId> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(BridgeError::OperationFailed(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let session = PlaybackSessionId::new();
        self.sessions
            .lock()
            .insert(session, SessionState::Loaded(path.to_path_buf()));
        debug!(%session, path = %path.display(), "Loaded playback session");
        Ok(session)
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<PlaybackCompletion> {
        let state = self.sessions.lock().remove(&session);
        let path = match state {
            Some(SessionState::Loaded(path)) => path,
            Some(playing @ SessionState::Playing(_)) => {
                self.sessions.lock().insert(session, playing);
                return Err(BridgeError::OperationFailed(format!(
                    "session {} is already playing",
                    session
                )));
            }
            None => {
                return Err(BridgeError::OperationFailed(format!(
                    "unknown session {}",
                    session
                )))
            }
        };

        let mut child = Command::new(&self.program)
            .args(["-nodisp", "-autoexit", "-loglevel", "error"])
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BridgeError::NotAvailable(format!(
                        "{} executable not found",
                        self.program.display()
                    ))
                } else {
                    BridgeError::Io(e)
                }
            })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        self.sessions
            .lock()
            .insert(session, SessionState::Playing(kill_tx));
        info!(%session, path = %path.display(), "ffplay started");

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };
            let outcome = match exited {
                Some(Ok(status)) if status.success() => Ok(()),
                Some(Ok(status)) => {
                    let mut stderr = String::new();
                    if let Some(mut pipe) = child.stderr.take() {
                        let _ = pipe.read_to_string(&mut stderr).await;
                    }
                    Err(BridgeError::Decode(format!(
                        "ffplay exited with {}: {}",
                        status,
                        stderr.trim()
                    )))
                }
                Some(Err(e)) => Err(BridgeError::Io(e)),
                None => {
                    if let Err(e) = child.kill().await {
                        warn!(%session, error = %e, "Failed to kill ffplay");
                    }
                    Ok(())
                }
            };
            sessions.lock().remove(&session);
            debug!(%session, ok = outcome.is_ok(), "ffplay session ended");
            let _ = done_tx.send(outcome);
        });

        Ok(done_rx
            .map(|result| {
                result.unwrap_or_else(|_| {
                    Err(BridgeError::OperationFailed(
                        "ffplay supervisor vanished".to_string(),
                    ))
                })
            })
            .boxed())
    }

    async fn stop(&self, session: PlaybackSessionId) -> Result<()> {
        let state = self.sessions.lock().remove(&session);
        match state {
            Some(SessionState::Playing(kill)) => {
                let _ = kill.send(());
                debug!(%session, "Stop requested");
            }
            Some(SessionState::Loaded(_)) | None => {}
        }
        Ok(())
    }
}
