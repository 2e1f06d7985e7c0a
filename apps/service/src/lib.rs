#![warn(clippy::all)]

pub mod alerts;
pub mod config;
pub mod database;
pub mod models;
pub mod monitoring;
pub mod pool;
pub mod validation;
