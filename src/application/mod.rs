// Application layer - Connection handling, usage derivation and chart caching
pub mod connection_manager;
pub mod dispatcher;
pub mod history_cache;
pub mod history_source;
pub mod scheduler;
pub mod usage_deriver;
