//! Outgoing notifications: embed construction and webhook delivery.

pub mod builder;
pub mod webhook;

pub use builder::EmbedBuilder;
pub use webhook::WebhookClient;
