//! quizapi - HTTP backend for a classroom quiz
//!
//! Serves question sets, stores submitted results and reports leaderboards
//! and statistics over PostgreSQL or SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod http_server;
pub mod observability;
pub mod quiz;
