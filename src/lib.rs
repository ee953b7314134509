//! Turn-based workday allocation for a fixed, ordered roster.
//!
//! A planning period (start date + number of weeks) defines a universe of
//! workdays. Each participant, in strict roster order, selects exactly their
//! quota of those days; the selection is validated and committed atomically,
//! which passes the turn to the next participant. State lives in a small
//! SQLite database.

pub mod backup;
pub mod export;
pub mod input;
pub mod plan;
pub mod service;
pub mod store;
