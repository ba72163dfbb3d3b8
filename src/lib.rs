pub mod analytics;
pub mod cache;
pub mod clock;
pub mod config;
pub mod cors;
pub mod error;
pub mod links;
pub mod logging;
pub mod resolver;
pub mod routes;
pub mod shortid;
pub mod startup;
pub mod state;
pub mod store;
