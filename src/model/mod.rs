//! Voters, votes, and the database that holds them.

pub mod ballot;
pub mod candidate_totals;
pub mod db;
pub mod id;
pub mod voter;
