//! Core types and trait definitions for the Agora discussion-thread engine.
//!
//! This crate is deliberately free of database and transport dependencies.
//! It owns the reply-tree algorithms, the vote toggle state machine, and the
//! [`store`] traits that storage backends implement.

pub mod error;
pub mod ids;
pub mod reply;
pub mod store;
pub mod tree;
pub mod vote;

pub use error::{Entity, Error, Result, ValidationError};
