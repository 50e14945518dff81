//! Error types for the room layer.

use hackbox_protocol::RoomCode;

/// Everything that can make a room request fail.
///
/// Each variant is checked before the room is mutated, so a failed request
/// never leaves partial state behind and only affects its own requester.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    /// No room is registered under this code.
    #[error("room {0} does not exist")]
    NotFound(RoomCode),

    /// Another player in the room already uses this display name.
    #[error("username {0:?} is taken")]
    UsernameTaken(String),

    /// A rejoin named a player that never joined this room.
    #[error("no player named {0:?} in this room")]
    PlayerNotFound(String),

    /// Joining is closed while a round is running.
    #[error("game is already in progress")]
    GameInProgress,

    /// A round needs at least `need` players.
    #[error("room has {have} players, needs {need}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// A round is already running in this room.
    #[error("a round is already in progress")]
    AlreadyInProgress,

    /// Every category has been played in this room.
    #[error("no categories left to play")]
    CategoryPoolExhausted,

    /// A required request field was absent.
    #[error("{0} missing from request")]
    MissingField(&'static str),

    /// The request only makes sense during a round.
    #[error("no round in progress")]
    RoundNotActive,

    /// Votes name contestant slot 0 or 1.
    #[error("invalid contestant index {0}")]
    InvalidContestant(usize),

    /// No unused room code was found.
    #[error("could not find a free room code")]
    CodeSpaceExhausted,

    /// The room's task has stopped (the room was closed under us).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

/// A refused join, with the room's player count at the moment it was
/// refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error} ({player_count} players)")]
pub struct JoinRejected {
    pub error: RoomError,
    pub player_count: usize,
}

impl JoinRejected {
    /// A join that never reached a room, which has no players to report.
    pub fn without_room(error: RoomError) -> Self {
        Self {
            error,
            player_count: 0,
        }
    }
}
