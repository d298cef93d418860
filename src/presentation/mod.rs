// Presentation layer - Consumers of dispatched payloads and derived charts
pub mod consumers;
pub mod tiles;
