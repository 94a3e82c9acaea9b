//! Risk: position sizing, portfolio limits and the kill switch

pub mod kill_switch;
pub mod limits;
pub mod sizing;

pub use kill_switch::{KillSwitch, KillSwitchView, TripCause};
pub use limits::{check_new_position, daily_loss_breach, drawdown_breach, DailyPnl, LimitBreach};
pub use sizing::{
    compute_position_size, risk_pct_for_confidence, round_down_to_step, MarketRegime,
    PositionSize, SizingInput, SizingRejection,
};
