//! Data model: decoded mail and the outgoing notification document.

pub mod embed;
pub mod mail;
