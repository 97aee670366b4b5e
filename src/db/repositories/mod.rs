pub mod readings;
pub mod snapshots;
