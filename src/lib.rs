//! `lookout`: forwards Phabricator task mail from a mail drop to a chat webhook.
//!
//! New files in the watched directory are decoded, filtered on their
//! `X-Phabricator-Stamps` header and, when relevant, posted as a rich embed.
//! Each file is handled independently and fire-and-forget.

pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod watch;
