pub mod backfill;
pub mod config;
pub mod interaction;
pub mod logging;
pub mod panel;
pub mod roster;
