//! Process lifecycle requests.
//!
//! Handlers publish a [`Lifecycle`] on a `tokio::sync::watch` channel; the
//! runner stops its loops and exits with [`Lifecycle::exit_code`]. Restarting
//! is left to the supervisor (systemd `Restart=`, a shell loop, ...).

/// Exit code asking the supervisor to start the bot again.
pub const RESTART_EXIT_CODE: i32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Shutdown,
    Restart,
}

impl Lifecycle {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Running | Self::Shutdown => 0,
            Self::Restart => RESTART_EXIT_CODE,
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}
