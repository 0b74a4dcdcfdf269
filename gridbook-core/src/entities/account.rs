use crate::entities::bet::UserId;

/// A user's play-money balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub user_id: UserId,
    pub balance: rust_decimal::Decimal,
}
