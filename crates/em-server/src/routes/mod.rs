//! Route handler modules.

pub mod encoders;
pub mod events;
pub mod health;
pub mod videos;
