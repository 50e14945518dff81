//! Rooms and rounds for Hackbox.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! players, category pool, round clock, and broadcast group.
//!
//! # Key types
//!
//! - [`Room`]: the synchronous room state machine
//! - [`RoomRegistry`]: creates rooms and resolves room codes
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomPhase`]: round lifecycle
//! - [`RoundConfig`]: round length, tick cadence, and vote decay

mod category;
mod code;
mod config;
mod error;
mod manager;
mod player;
mod room;
mod state;

pub use category::{Categories, CategoryPool};
pub use code::{MAX_CODE_ATTEMPTS, random_code, unique_code};
pub use config::{RoomPhase, RoundConfig};
pub use error::{JoinRejected, RoomError};
pub use manager::{DEFAULT_CHANNEL_SIZE, RoomRegistry};
pub use player::{Player, Score, lead_percentage, shift_scores};
pub use room::{Member, MemberSender, RoomHandle, RoomInfo};
pub use state::{Room, RoundStart, Tick};
