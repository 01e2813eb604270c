//! em-core: shared types, IDs, errors, configuration, and event system.
//!
//! Every other em-* crate depends on this one for typed identifiers, the
//! unified error type, the video lifecycle enum, application configuration,
//! and the broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod state;

pub use error::{Error, Result};
pub use ids::*;
pub use state::*;
