//! Flow-driven dialogue engine: a tree of prompts whose edges are taken when
//! a language model agrees the user's reply satisfies the edge's condition.

pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod frontend;
pub mod oracle;
pub mod session;
