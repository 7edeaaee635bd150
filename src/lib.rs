pub mod build_info;
pub mod cascade;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod generator;
pub mod grouping;
pub mod metrics;
pub mod model;
pub mod output;
pub mod recurrence;
pub mod store;
pub mod timezone;
pub mod views;
pub mod visibility;
