//! Lecteur local de la file de flux signés.
//!
//! [`MpvPlayer`] lance `mpv --idle` et le pilote par son socket IPC JSON
//! (une requête par ligne, réponses corrélées par `request_id`, événements
//! asynchrones ignorés).

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::PlayerError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Paused,
    Idle,
}

/// État instantané du lecteur
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// Position dans la file chargée
    pub index: Option<usize>,
    pub position_ms: u64,
}

impl PlayerStatus {
    pub fn idle() -> Self {
        Self {
            state: PlayerState::Idle,
            index: None,
            position_ms: 0,
        }
    }
}

/// Lecteur de file d'URLs
pub trait QueuePlayer: Send {
    /// Remplace la file et démarre `urls[start_index]` à `position_ms`
    fn load(&mut self, urls: &[String], start_index: usize, position_ms: u64)
    -> Result<(), PlayerError>;

    fn pause(&mut self) -> Result<(), PlayerError>;

    fn resume(&mut self) -> Result<(), PlayerError>;

    fn status(&mut self) -> Result<PlayerStatus, PlayerError>;
}

impl<P: QueuePlayer + ?Sized> QueuePlayer for Box<P> {
    fn load(&mut self, urls: &[String], start_index: usize, position_ms: u64)
    -> Result<(), PlayerError> {
        (**self).load(urls, start_index, position_ms)
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        (**self).resume()
    }

    fn status(&mut self) -> Result<PlayerStatus, PlayerError> {
        (**self).status()
    }
}

/// Connexion IPC vers un processus mpv
struct MpvConnection {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
    next_request_id: u64,
}

impl MpvConnection {
    fn connect(path: &Path) -> Result<Self, PlayerError> {
        let writer = UnixStream::connect(path)?;
        writer.set_read_timeout(Some(IPC_READ_TIMEOUT))?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self {
            writer,
            reader,
            next_request_id: 1,
        })
    }

    /// Envoie une commande et attend la réponse correspondante
    fn command(&mut self, args: Value) -> Result<Value, PlayerError> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let command_name = args
            .get(0)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string();
        let mut line = json!({ "command": args, "request_id": request_id }).to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;

        loop {
            let mut reply = String::new();
            if self.reader.read_line(&mut reply)? == 0 {
                return Err(PlayerError::Protocol("mpv closed the IPC socket".to_string()));
            }
            let reply: Value = serde_json::from_str(reply.trim())
                .map_err(|e| PlayerError::Protocol(e.to_string()))?;

            if reply.get("request_id").and_then(Value::as_u64) != Some(request_id) {
                // Événement asynchrone ou réponse périmée
                continue;
            }

            return match reply.get("error").and_then(Value::as_str) {
                Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                Some(reason) => Err(PlayerError::Command {
                    command: command_name,
                    reason: reason.to_string(),
                }),
                None => Err(PlayerError::Protocol(format!("reply without status: {}", reply))),
            };
        }
    }

    fn get_property(&mut self, name: &str) -> Result<Value, PlayerError> {
        self.command(json!(["get_property", name]))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), PlayerError> {
        self.command(json!(["set_property", name, value])).map(|_| ())
    }
}

/// Lecteur mpv piloté par IPC
pub struct MpvPlayer {
    mpv_path: String,
    socket_path: PathBuf,
    child: Option<Child>,
    connection: Option<MpvConnection>,
}

impl MpvPlayer {
    /// Le processus n'est lancé qu'au premier chargement
    pub fn new(mpv_path: impl Into<String>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            mpv_path: mpv_path.into(),
            socket_path: socket_path.into(),
            child: None,
            connection: None,
        }
    }

    pub fn from_config(config: &pmoconfig::PlayerConfig) -> Self {
        Self::new(&config.mpv_path, &config.ipc_socket)
    }

    fn is_alive(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                warn!(%status, "mpv exited");
                false
            }
            Some(Err(e)) => {
                warn!(error = %e, "Cannot query mpv process");
                false
            }
            None => false,
        }
    }

    fn ensure_running(&mut self) -> Result<&mut MpvConnection, PlayerError> {
        if !(self.connection.is_some() && self.is_alive()) {
            self.shutdown();
            self.spawn()?;
        }
        self.connection
            .as_mut()
            .ok_or_else(|| PlayerError::Spawn("mpv connection lost".to_string()))
    }

    fn spawn(&mut self) -> Result<(), PlayerError> {
        // Socket laissé par une instance précédente
        let _ = std::fs::remove_file(&self.socket_path);

        let child = Command::new(&self.mpv_path)
            .arg("--idle=yes")
            .arg("--no-video")
            .arg("--no-terminal")
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlayerError::Spawn(format!("{}: {}", self.mpv_path, e)))?;
        info!(pid = child.id(), socket = %self.socket_path.display(), "mpv started");
        self.child = Some(child);

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            match MpvConnection::connect(&self.socket_path) {
                Ok(connection) => {
                    self.connection = Some(connection);
                    return Ok(());
                }
                Err(e) if Instant::now() >= deadline => {
                    self.shutdown();
                    return Err(PlayerError::Spawn(format!("IPC socket never came up: {}", e)));
                }
                Err(_) => thread::sleep(RETRY_DELAY),
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = connection.command(json!(["quit"]));
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

impl QueuePlayer for MpvPlayer {
    fn load(&mut self, urls: &[String], start_index: usize, position_ms: u64)
    -> Result<(), PlayerError> {
        let connection = self.ensure_running()?;

        connection.command(json!(["stop"]))?;
        for url in urls {
            connection.command(json!(["loadfile", url, "append-play"]))?;
        }
        if start_index > 0 {
            connection.command(json!(["playlist-play-index", start_index]))?;
        }
        connection.set_property("pause", json!(false))?;

        if position_ms > 0 {
            // Refusé tant que le flux n'est pas ouvert
            let seconds = position_ms as f64 / 1000.0;
            let deadline = Instant::now() + SEEK_TIMEOUT;
            loop {
                match connection.command(json!(["seek", seconds, "absolute"])) {
                    Ok(_) => break,
                    Err(PlayerError::Command { .. }) if Instant::now() < deadline => {
                        thread::sleep(RETRY_DELAY)
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(tracks = urls.len(), start_index, position_ms, "Queue loaded in mpv");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        match self.connection.as_mut() {
            Some(connection) => connection.set_property("pause", json!(true)),
            None => Ok(()),
        }
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        self.ensure_running()?.set_property("pause", json!(false))
    }

    fn status(&mut self) -> Result<PlayerStatus, PlayerError> {
        if !self.is_alive() {
            return Ok(PlayerStatus::idle());
        }
        let Some(connection) = self.connection.as_mut() else {
            return Ok(PlayerStatus::idle());
        };

        if connection.get_property("idle-active")?.as_bool() == Some(true) {
            return Ok(PlayerStatus::idle());
        }

        let paused = connection.get_property("pause")?.as_bool().unwrap_or(false);
        let index = connection
            .get_property("playlist-pos")?
            .as_i64()
            .and_then(|i| usize::try_from(i).ok());
        // time-pos est indisponible pendant l'ouverture d'un flux
        let position_ms = connection
            .get_property("time-pos")
            .ok()
            .and_then(|v| v.as_f64())
            .map(|secs| (secs.max(0.0) * 1000.0) as u64)
            .unwrap_or(0);

        Ok(PlayerStatus {
            state: if paused {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            },
            index,
            position_ms,
        })
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
