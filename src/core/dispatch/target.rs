//! Dispatch target addressing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default console control port.
pub const CONSOLE_PORT: u16 = 49280;
/// Default port of the desktop testing receiver.
pub const TESTING_GUI_PORT: u16 = 8080;
/// Default per-dispatch timeout.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Which kind of receiver a target addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// The physical mixing console.
    Console,
    /// The desktop testing receiver that echoes commands for development.
    TestingGui,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => f.write_str("console"),
            Self::TestingGui => f.write_str("testing-gui"),
        }
    }
}

/// Resolved dispatch destination, supplied by the settings collaborator and
/// treated as read-only per dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTarget {
    pub target_type: TargetType,
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl NetworkTarget {
    /// Target the mixing console at its standard control port.
    pub fn console(host: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Console,
            host: host.into(),
            port: CONSOLE_PORT,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Target the desktop testing receiver.
    pub fn testing_gui(host: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::TestingGui,
            host: host.into(),
            port: TESTING_GUI_PORT,
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a host has been configured at all.
    pub fn has_host(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// HTTP endpoint commands are POSTed to.
    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}/rcp", self.host, self.port)
    }

    /// `host:port` form used for the raw connectivity probe.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
