pub mod account;
pub mod bet;
pub mod event;
pub mod notification;

use gridbook_sdk::objects::{
    BetStatus as SdkBetStatus, EventStatus as SdkEventStatus, MarketKind as SdkMarketKind,
};

/// Bet state for lifecycle transitions.
///
/// This is the core-internal version. For API/DTO use, see
/// `gridbook_sdk::objects::BetStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BetState {
    Pending,
    Won,
    Lost,
    Void,
    SettlementFailed,
}

impl BetState {
    /// Whether the state is terminal. A terminal bet is immutable.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetState::Pending)
    }
}

impl From<BetState> for SdkBetStatus {
    fn from(value: BetState) -> Self {
        match value {
            BetState::Pending => SdkBetStatus::Pending,
            BetState::Won => SdkBetStatus::Won,
            BetState::Lost => SdkBetStatus::Lost,
            BetState::Void => SdkBetStatus::Void,
            BetState::SettlementFailed => SdkBetStatus::SettlementFailed,
        }
    }
}

/// Event status for catalog operations.
///
/// This is the core-internal version. For API/DTO use, see
/// `gridbook_sdk::objects::EventStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Scheduled,
    Completed,
    ResultPublished,
}

impl From<EventStatus> for SdkEventStatus {
    fn from(value: EventStatus) -> Self {
        match value {
            EventStatus::Scheduled => SdkEventStatus::Scheduled,
            EventStatus::Completed => SdkEventStatus::Completed,
            EventStatus::ResultPublished => SdkEventStatus::ResultPublished,
        }
    }
}

impl From<SdkEventStatus> for EventStatus {
    fn from(value: SdkEventStatus) -> Self {
        match value {
            SdkEventStatus::Scheduled => EventStatus::Scheduled,
            SdkEventStatus::Completed => EventStatus::Completed,
            SdkEventStatus::ResultPublished => EventStatus::ResultPublished,
        }
    }
}

/// Market kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketKind {
    Winner,
    Podium,
}

impl From<MarketKind> for SdkMarketKind {
    fn from(value: MarketKind) -> Self {
        match value {
            MarketKind::Winner => SdkMarketKind::Winner,
            MarketKind::Podium => SdkMarketKind::Podium,
        }
    }
}
