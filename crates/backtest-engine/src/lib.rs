pub mod engine;
pub mod models;
pub mod stacking;
pub mod walk_forward_opt;


pub use engine::{annualized_sharpe, run_backtest, SignalBacktester};
pub use models::*;
pub use stacking::{
    new_signal_activity, pearson_correlation, select_decorrelated, stack_by_correlation,
    stack_strategies,
};
pub use walk_forward_opt::{optimize_strategies, walk_forward_optimize, walk_forward_windows};
