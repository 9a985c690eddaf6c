//! Decision pipeline: filtering, combination choice, scoring, reconciliation

pub mod combination;
pub mod confidence;
pub mod filter;
pub mod pipeline;
pub mod reconcile;

// Re-export commonly used types
pub use combination::{select_combination, FieldShape};
pub use confidence::score;
pub use filter::filter_candidates;
pub use pipeline::{select_bets, select_bets_at, Selection, SkipReason, SkippedRace};
pub use reconcile::{find_open_record, reconcile, reconcile_in, resolution_for};
