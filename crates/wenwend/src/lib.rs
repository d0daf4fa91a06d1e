//! 高文文 daemon library - exposes modules for testing and for wenwenctl.

pub mod admin;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod db;
pub mod jobs;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod server;
