//! # Storage Module — Persistence Layer
//!
//! Everything CreditDesk keeps on disk flows through [`db::DeskDb`], a thin
//! typed layer over sled's embedded key-value store. The three collaborator
//! stores the core consumes — settings, per-user balances, per-ticket
//! documents — are named sled trees inside a single database, so one
//! directory on disk holds the whole installation.

pub mod db;

pub use db::{DbError, DbResult, DeskDb};
