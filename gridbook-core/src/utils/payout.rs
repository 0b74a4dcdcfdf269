use crate::entities::bet::Bet;
use crate::ledger::SettleResolution;
use rust_decimal::Decimal;

/// Returns the amount credited back to the bettor for a resolution.
///
/// Won pays stake times the snapshot price; Void refunds the stake; Lost
/// pays nothing.
pub fn credit_for(bet: &Bet, resolution: SettleResolution) -> Decimal {
    match resolution {
        SettleResolution::Won => bet.stake * bet.snapshot.price,
        SettleResolution::Void => bet.stake,
        SettleResolution::Lost => Decimal::ZERO,
    }
}
