use std::fmt;

/// Lifecycle state of the supervisor.
///
/// ```text
/// Starting ──► Running ◄──► Restarting
///                 │              │
///                 └──► ShuttingDown ◄┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ServiceState {
    /// Environment check, binding and the first spawn pass.
    #[default]
    Starting,
    /// Pools are kept at their desired size.
    Running,
    /// Rolling restart in progress, one unit per tick.
    Restarting,
    /// Every unit was asked to stop; nothing is replenished.
    ShuttingDown,
}

impl ServiceState {
    /// Short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Restarting => "restarting",
            ServiceState::ShuttingDown => "shutting-down",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
