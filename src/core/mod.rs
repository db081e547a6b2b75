//! Core business logic - framework-agnostic menu, order, archive, and reconciliation
//! operations. Every function takes a database connection and returns structured data
//! that the HTTP layer serializes.

pub mod archive;
pub mod delivery;
pub mod export;
pub mod menu;
pub mod order;
pub mod statistics;
pub mod unpaid;
pub mod user;
pub mod weekday;

pub use weekday::Weekday;
