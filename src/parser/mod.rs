//! Email parsing: header blocks, MIME body decoding and stamp extraction.

pub mod header;
pub mod mime;
pub mod stamps;
