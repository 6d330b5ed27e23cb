// Common types for FreeDATA Shell

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Name of a UI surface managed by the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceName {
    /// Startup splash, destroyed after the grace delay
    Splash,
    /// Main window; closing it tears the application down
    Main,
    /// Chat module
    Chat,
    /// Daemon log viewer
    Log,
    /// Mesh routing table viewer
    Mesh,
}

impl SurfaceName {
    /// Surfaces created at startup and kept until shutdown
    pub const PRIMARY: [SurfaceName; 4] = [
        SurfaceName::Main,
        SurfaceName::Chat,
        SurfaceName::Log,
        SurfaceName::Mesh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceName::Splash => "splash",
            SurfaceName::Main => "main",
            SurfaceName::Chat => "chat",
            SurfaceName::Log => "log",
            SurfaceName::Mesh => "mesh",
        }
    }
}

impl fmt::Display for SurfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurfaceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "splash" => Ok(SurfaceName::Splash),
            "main" => Ok(SurfaceName::Main),
            "chat" => Ok(SurfaceName::Chat),
            "log" => Ok(SurfaceName::Log),
            "mesh" => Ok(SurfaceName::Mesh),
            other => Err(Error::UnknownSurface(other.to_string())),
        }
    }
}

/// Role of a supervised child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRole {
    /// The FreeDATA protocol daemon
    Daemon,
    /// Hamlib rig-control daemon
    Rigctld,
}

impl ProcessRole {
    pub const ALL: [ProcessRole; 2] = [ProcessRole::Daemon, ProcessRole::Rigctld];

    /// Binary name without platform suffix
    pub fn binary_name(&self) -> &'static str {
        match self {
            ProcessRole::Daemon => "freedata-daemon",
            ProcessRole::Rigctld => "rigctld",
        }
    }

    /// Process names swept by name on shutdown.
    ///
    /// The daemon spawns `freedata-tnc` itself, so a sweep for the daemon
    /// role covers both.
    pub fn sweep_names(&self) -> &'static [&'static str] {
        match self {
            ProcessRole::Daemon => &["freedata-tnc", "freedata-daemon"],
            ProcessRole::Rigctld => &["rigctld"],
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Lifecycle state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    NotFound, // binary absent or spawn failed
    Starting, // spawn issued
    Running,  // child alive with a pid
    Exited,   // child closed or was killed
}

impl ProcessState {
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }
}

/// Which child stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Connection state of the rigctld monitor socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RigctldStatus {
    #[default]
    Unknown,
    Connected,
    NotConnected,
}

impl RigctldStatus {
    /// Label shown by the main surface
    pub fn label(&self) -> &'static str {
        match self {
            RigctldStatus::Unknown => "unknown",
            RigctldStatus::Connected => "Connected",
            RigctldStatus::NotConnected => "Not Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, RigctldStatus::Connected)
    }
}

/// Host operating system family, used for binary names and kill sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }

    /// File name of a role's binary on this platform
    pub fn binary_file_name(&self, role: ProcessRole) -> String {
        match self {
            Platform::Windows => format!("{}.exe", role.binary_name()),
            _ => role.binary_name().to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::MacOs => "darwin",
            Platform::Windows => "win32",
            Platform::Other => std::env::consts::OS,
        };
        f.write_str(name)
    }
}
