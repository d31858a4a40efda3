use std::fmt;

/// Hard ceilings applied to a single isolated run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    /// CPU cores; fractional values are allowed (e.g. `1.5`).
    pub cpus: f64,
    pub memory_mb: u32,
}

/// Network attachment of the isolated run.
///
/// No host-network variant exists: runs get outbound access
/// through a bridge at most and are never reachable from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// Outbound-capable, non-privileged bridge network.
    Bridge,
    /// Loopback only.
    None,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::None => "none",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
