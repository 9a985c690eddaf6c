pub mod health;
pub mod reconcile;
pub mod records;
pub mod select;
