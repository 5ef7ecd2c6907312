//! Filter parsing and query planning.
//!
//! A filter arrives as a JSON-shaped object keyed by operator tokens.
//! [`filter::parse_filter`] turns it into typed expressions once, at
//! `find` entry; [`planner`] then executes each expression as ordered
//! scans over the relevant index keyspaces.

pub(crate) mod filter;
pub(crate) mod planner;

pub use filter::Direction;
