// Live telemetry client for the terrarium dashboard
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;
