use std::fmt;

/// Identifies this board to the remote service. Computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceIdentity(id.into())
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current score of the tracked game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScorePair {
    pub team_1: u64,
    pub team_2: u64,
}

impl ScorePair {
    #[cfg(test)]
    pub fn new(team_1: u64, team_2: u64) -> Self {
        ScorePair { team_1, team_2 }
    }
}

/// Result of a table update that changed the tracked game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSwitch {
    pub previous: Option<String>,
    pub current: Option<String>,
}
