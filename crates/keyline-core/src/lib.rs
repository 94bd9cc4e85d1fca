//! Core Keyline library (auth client, session store, controller, config).

pub mod client;
pub mod config;
pub mod controller;
pub mod models;
pub mod outcome;
pub mod profile;
pub mod store;
pub mod validation;
