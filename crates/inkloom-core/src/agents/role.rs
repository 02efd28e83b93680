//! Pipeline agent roles

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A named stage of the content-generation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Reads source material
    Reader,
    /// Analyzes structure and themes
    Analyst,
    /// Pulls out entities and facts
    Extractor,
    /// Produces the outline
    Planner,
    /// Drafts the text
    Writer,
    /// Polishes style
    Stylist,
    /// Reviews the draft
    Critic,
    /// Files results into long-term records
    Archivist,
}

impl AgentRole {
    /// The full role set, in pipeline order
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Reader,
        AgentRole::Analyst,
        AgentRole::Extractor,
        AgentRole::Planner,
        AgentRole::Writer,
        AgentRole::Stylist,
        AgentRole::Critic,
        AgentRole::Archivist,
    ];

    /// Stable identifier
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Analyst => "analyst",
            Self::Extractor => "extractor",
            Self::Planner => "planner",
            Self::Writer => "writer",
            Self::Stylist => "stylist",
            Self::Critic => "critic",
            Self::Archivist => "archivist",
        }
    }

    /// Whether this role may share a stage with other roles
    ///
    /// Writer and Archivist have ordered side effects and always run alone.
    #[must_use]
    pub fn allows_parallel(&self) -> bool {
        !matches!(self, Self::Writer | Self::Archivist)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| crate::error::Error::InvalidRequest(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        for role in AgentRole::ALL {
            assert_eq!(role.as_str().parse::<AgentRole>().unwrap(), role);
        }
        assert_eq!(" Writer ".parse::<AgentRole>().unwrap(), AgentRole::Writer);
        assert!("editor".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_serial_only_roles() {
        let serial: Vec<AgentRole> = AgentRole::ALL
            .into_iter()
            .filter(|r| !r.allows_parallel())
            .collect();
        assert_eq!(serial, vec![AgentRole::Writer, AgentRole::Archivist]);
    }
}
