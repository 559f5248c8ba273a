pub mod config;
pub mod events;
pub mod feed;
pub mod monitoring;
pub mod pipeline;
pub mod secrets;
