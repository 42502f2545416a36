//! Core business logic for readit: the vote ledger, score projection and
//! the post / sub services that read through it.

pub mod services;

pub use services::*;
