//! Concrete collaborators used by the `run` command.

use crate::bus::{HostBus, HostEvent};
use crate::config::SystemNotifyConfig;
use crate::notify::{
    Banner, Notification, NotifyError, Permission, PermissionState, SystemChannel, WindowControl,
};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// System channel backed by an external program such as `notify-send`.
/// Title and body are appended as the last two arguments.
#[derive(Clone)]
pub struct CommandChannel {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandChannel {
    pub fn new(cfg: &SystemNotifyConfig) -> Self {
        Self {
            program: cfg.command.clone(),
            args: cfg.args.clone(),
            timeout_secs: cfg.timeout_secs.max(1),
        }
    }
}

#[async_trait::async_trait]
impl SystemChannel for CommandChannel {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&notification.title)
            .arg(&notification.body)
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout_secs))?
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(NotifyError::ExitStatus {
                program: self.program.clone(),
                status: output.status.to_string(),
            })
        }
    }

    fn channel_name(&self) -> &str {
        &self.program
    }
}

/// Granted when the user allows system notifications and the configured
/// program resolves on `PATH`.
#[derive(Clone)]
pub struct CommandPermission {
    program: String,
    allowed: bool,
}

impl CommandPermission {
    pub fn new(cfg: &SystemNotifyConfig) -> Self {
        Self {
            program: cfg.command.clone(),
            allowed: cfg.allowed,
        }
    }

    fn check(&self) -> bool {
        self.allowed && resolve_program(&self.program).is_some()
    }
}

#[async_trait::async_trait]
impl Permission for CommandPermission {
    async fn is_granted(&self) -> bool {
        self.check()
    }

    async fn request(&self) -> PermissionState {
        if !self.allowed {
            info!(
                program = %self.program,
                "System notifications disabled; enable system.allowed via `femtoalarm configure`"
            );
            return PermissionState::Denied;
        }
        if self.check() {
            PermissionState::Granted
        } else {
            debug!(program = %self.program, "Notification program not found on PATH");
            PermissionState::Denied
        }
    }
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Banner rendered by the host loop listening on the bus.
#[derive(Clone)]
pub struct HostBanner {
    bus: HostBus,
}

impl HostBanner {
    pub fn new(bus: HostBus) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl Banner for HostBanner {
    async fn show(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.bus
            .publish(HostEvent::Banner {
                title: notification.title.clone(),
                body: notification.body.clone(),
            })
            .await
            .map_err(|_| NotifyError::HostClosed)
    }
}

#[derive(Clone)]
pub struct HostWindow {
    bus: HostBus,
}

impl HostWindow {
    pub fn new(bus: HostBus) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl WindowControl for HostWindow {
    async fn restore(&self) -> Result<(), NotifyError> {
        self.bus
            .publish(HostEvent::Restore)
            .await
            .map_err(|_| NotifyError::HostClosed)
    }
}
