// Domain layer - Telemetry samples and live channel messages
pub mod messages;
pub mod telemetry;
