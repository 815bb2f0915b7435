pub mod evaluator;
pub mod ledger;

pub use evaluator::{SignalEvaluator, confidence_score};
pub use ledger::{LedgerError, PositionLedger};
