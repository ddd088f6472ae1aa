// HTTP surface, detector wiring and offline mode of the `bugbeats` binary.

pub mod app;
pub mod cli;
pub mod detector;
pub mod hotreload;
pub mod offline;
pub mod response;
