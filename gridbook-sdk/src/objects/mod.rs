pub mod events;
pub mod notification;
pub mod odds;
pub mod place_bet;

use serde::{Deserialize, Serialize};

/// Error returned when parsing a status string from a transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Bet status for API responses.
///
/// This is the API/DTO version. For internal state transitions, use the
/// version in `gridbook-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
    SettlementFailed,
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Void => write!(f, "void"),
            BetStatus::SettlementFailed => write!(f, "settlement_failed"),
        }
    }
}

impl std::str::FromStr for BetStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "won" => Ok(BetStatus::Won),
            "lost" => Ok(BetStatus::Lost),
            "void" => Ok(BetStatus::Void),
            "settlement_failed" => Ok(BetStatus::SettlementFailed),
            other => Err(ParseStatusError {
                kind: "bet status",
                value: other.to_string(),
            }),
        }
    }
}

/// Event status for API responses.
///
/// This is the API/DTO version. For catalog operations, use the version in
/// `gridbook-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Completed,
    ResultPublished,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Scheduled => write!(f, "scheduled"),
            EventStatus::Completed => write!(f, "completed"),
            EventStatus::ResultPublished => write!(f, "result_published"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "completed" => Ok(EventStatus::Completed),
            "result_published" => Ok(EventStatus::ResultPublished),
            other => Err(ParseStatusError {
                kind: "event status",
                value: other.to_string(),
            }),
        }
    }
}

/// Market kind for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    Winner,
    Podium,
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketKind::Winner => write!(f, "winner"),
            MarketKind::Podium => write!(f, "podium"),
        }
    }
}
