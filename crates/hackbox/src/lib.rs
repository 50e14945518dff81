//! # Hackbox
//!
//! An in-memory party game server. Clients create a room, join it by a
//! four-letter code, and play timed rounds in which two contestants answer
//! a category and everyone else votes. A lead percentage that drifts back
//! toward 50/50 every tick decides the winner when the clock runs out.
//!
//! The crate ties the layers together:
//!
//! - [`hackbox_transport`]: WebSocket connections
//! - [`hackbox_protocol`]: wire events and the JSON codec
//! - [`hackbox_room`]: room actors, rounds, and the room registry
//! - `hackbox-tick`: the per-room round timer, used by the room actors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hackbox::prelude::*;
//!
//! # async fn run() -> Result<(), HackboxError> {
//! let mut config = ServerConfig::load(None)?;
//! config.apply_env()?;
//! config.validate()?;
//! let categories = config.load_categories()?;
//!
//! let server = HackboxServerBuilder::from_config(&config, categories)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::HackboxError;
pub use server::{HackboxServer, HackboxServerBuilder};

pub mod prelude {
    pub use crate::{HackboxError, HackboxServer, HackboxServerBuilder, ServerConfig};
    pub use hackbox_protocol::{ClientEvent, Codec, JsonCodec, RoomCode, ServerEvent};
    pub use hackbox_room::{Categories, RoomError, RoundConfig};
}
