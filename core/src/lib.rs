pub mod bus;
pub mod chain;
pub mod clock;
pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod query;
pub mod rng;
pub mod scene;
pub mod snapshot;
pub mod types;
