pub mod api;
pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod models;
pub mod observability;
pub mod registry;
pub mod state;
