use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of tools the service exposes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Searches the knowledge base.
    SearchKb,
    /// Opens a support ticket.
    CreateTicket,
    /// Books a follow-up with a customer.
    ScheduleFollowup,
}

impl ToolName {
    /// Every tool, in declaration order.
    pub const ALL: [ToolName; 3] = [
        ToolName::SearchKb,
        ToolName::CreateTicket,
        ToolName::ScheduleFollowup,
    ];

    /// Returns the wire name of the tool.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::SearchKb => "search_kb",
            ToolName::CreateTicket => "create_ticket",
            ToolName::ScheduleFollowup => "schedule_followup",
        }
    }
}

impl Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model asked for a tool that is not declared.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown tool: {0:?}")]
pub struct UnknownToolName(pub String);

impl FromStr for ToolName {
    type Err = UnknownToolName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownToolName(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>(), Ok(name));
        }
        assert_eq!(
            "delete_everything".parse::<ToolName>(),
            Err(UnknownToolName("delete_everything".to_owned()))
        );
        // Names are case-sensitive.
        assert!("Search_KB".parse::<ToolName>().is_err());
        assert_eq!(
            serde_json::to_value(ToolName::ScheduleFollowup).unwrap(),
            "schedule_followup"
        );
    }
}
