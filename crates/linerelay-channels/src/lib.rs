//! # linerelay-channels
//!
//! Messaging platform integrations for linerelay.

pub mod line;
pub mod utils;
