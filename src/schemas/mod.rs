//! Wire schemas for the two protocols this layer speaks
//!
//! `chat_completions` is the shape clients send and receive; `responses` is the alternate
//! protocol used upstream by the Codex family.

pub mod chat_completions;
pub mod responses;
