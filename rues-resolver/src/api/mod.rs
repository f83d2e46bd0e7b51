//! HTTP API handlers

pub mod health;
pub mod payload;
pub mod webhook;

pub use health::health_routes;
pub use payload::WebhookPayload;
pub use webhook::webhook_routes;
