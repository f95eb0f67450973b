//! Administrative server lifecycle control (kill / stop / restart)

use axum_server::Handle;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::info;

/// Environment variable set by a restart wrapper script
pub const RESTART_ENV: &str = "SD_WEBUI_RESTART";

/// Exit code asking the wrapper to start the process again
pub const RESTART_EXIT_CODE: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Kill,
    Stop,
    Restart,
}

impl ServerCommand {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Restart => RESTART_EXIT_CODE,
            Self::Kill | Self::Stop => 0,
        }
    }

    fn grace(&self) -> Duration {
        match self {
            Self::Kill => Duration::from_secs(1),
            Self::Stop | Self::Restart => Duration::from_secs(10),
        }
    }
}

pub struct ServerControl {
    handle: Handle,
    restartable: bool,
    requested: Mutex<Option<ServerCommand>>,
}

impl ServerControl {
    pub fn new(restartable: bool) -> Self {
        Self {
            handle: Handle::new(),
            restartable,
            requested: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var_os(RESTART_ENV).is_some())
    }

    /// Handle the listener is bound with
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn is_restartable(&self) -> bool {
        self.restartable
    }

    /// Record `command` and start shutting the listener down; in-flight
    /// requests, including the one asking, still get their response
    pub fn request(&self, command: ServerCommand) {
        info!(command = ?command, "Server lifecycle command");
        *self.requested.lock() = Some(command);
        self.handle.graceful_shutdown(Some(command.grace()));
    }

    pub fn requested(&self) -> Option<ServerCommand> {
        *self.requested.lock()
    }
}
