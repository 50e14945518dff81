//! Room registry: creates rooms and resolves room codes to handles.

use std::collections::HashMap;

use hackbox_protocol::RoomCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::code::unique_code;
use crate::room::spawn_room;
use crate::{Categories, CategoryPool, RoomError, RoomHandle, RoundConfig};

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Maps room codes to running rooms.
///
/// The registry only tracks handles; every room's state lives in its own
/// actor. It is not internally synchronized. The server keeps it behind a
/// mutex of its own and clones handles out before talking to a room.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    config: RoundConfig,
    channel_size: usize,
    rng: StdRng,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms play with `config`.
    pub fn new(config: RoundConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Like [`RoomRegistry::new`] but with reproducible room codes, category
    /// draws and contestant picks.
    pub fn with_seed(config: RoundConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: RoundConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            channel_size: DEFAULT_CHANNEL_SIZE,
            rng,
        }
    }

    /// Sets the command channel size of rooms created from now on.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Starts a room under a fresh code, with its own copy of `categories`.
    pub fn create_room(&mut self, categories: &Categories) -> Result<RoomHandle, RoomError> {
        let code = unique_code(&mut self.rng, |c| self.rooms.contains_key(c))?;
        let room_rng = StdRng::seed_from_u64(self.rng.random());
        let handle = spawn_room(
            code.clone(),
            CategoryPool::new(categories),
            self.config.clone(),
            self.channel_size,
            room_rng,
        );
        self.rooms.insert(code.clone(), handle.clone());
        tracing::info!(room = %code, rooms = self.rooms.len(), "room created");
        Ok(handle)
    }

    /// Resolves a code to its room.
    pub fn lookup(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    /// Forgets a room. Returns its handle if it was registered; removing an
    /// unknown code is a no-op.
    ///
    /// The room keeps running until it is closed or its last handle is
    /// dropped.
    pub fn remove_room(&mut self, code: &RoomCode) -> Option<RoomHandle> {
        let handle = self.rooms.remove(code);
        if handle.is_some() {
            tracing::info!(room = %code, rooms = self.rooms.len(), "room removed");
        }
        handle
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoundConfig::default())
    }
}
