//! Wire protocol for Hackbox.
//!
//! Clients and the server exchange named events, each a JSON object of the
//! form `{"event": "<name>", "data": { ... }}`:
//!
//! - **Inbound** ([`ClientEvent`]): requests a client makes, such as creating
//!   a room, joining it, or voting.
//! - **Outbound** ([`ServerEvent`]): replies to one client and broadcasts
//!   to every member of a room.
//! - **Codec** ([`Codec`], [`JsonCodec`]): text encoding of both.
//!
//! ```text
//! Transport (text frames) → Protocol (events) → Room (state machine)
//! ```
//!
//! This crate knows nothing about rooms or connections; it only describes
//! what travels on the wire.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, GameError, GameStarted, JoinReply, MemberId, MembershipRequest,
    RejoinReply, RoomCode, RoomCreated, RoomRef, RoundResult, ServerEvent, Submission,
    SubmissionRequest, TimeChanged, VoteRequest, VoteTally,
};
