//! Event and payload types that travel on the wire.
//!
//! Every frame is an adjacently tagged object: `event` carries the event
//! name and `data` its payload. Events without a payload (`request room`,
//! `everybody in`, `close room`) are sent as `{"event": "<name>"}`.
//!
//! Payload field names follow what browser clients already speak:
//! lowercase `roomcode`/`username` inbound, camelCase (`failReason`,
//! `playerCount`, `player1Name`) outbound.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short code players type to find a room.
///
/// Codes the server issues are always [`RoomCode::LEN`] uppercase ASCII
/// letters. Inbound codes are taken as-is: a code that isn't well formed
/// just doesn't match any room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in an issued code.
    pub const LEN: usize = 4;

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the code has the shape of a server-issued code.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN && self.0.bytes().all(|b| b.is_ascii_uppercase())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Identifies one connection's membership in room broadcast groups.
///
/// A member is not a player: the screen that created a room is a member of
/// it without ever joining under a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A `join room` or `rejoin room` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub roomcode: RoomCode,
    pub username: String,
}

/// A request that only names the room it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub roomcode: RoomCode,
}

/// A contestant's answer for the current round.
///
/// `player` is relayed to the room exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub roomcode: RoomCode,
    #[serde(default)]
    pub player: serde_json::Value,
    pub submission: String,
}

/// A vote for one of the two contestants.
///
/// `player` is the contestant slot (0 or 1). It is optional at the wire
/// level so that its absence can be reported as a missing field rather
/// than a malformed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub roomcode: RoomCode,
    #[serde(default)]
    pub player: Option<usize>,
}

/// Everything a client can ask of the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Create a new room; the sender becomes a member of it.
    #[serde(rename = "request room")]
    RequestRoom,

    #[serde(rename = "join room")]
    JoinRoom(MembershipRequest),

    /// Reattach a connection to a name that already joined.
    #[serde(rename = "rejoin room")]
    RejoinRoom(MembershipRequest),

    /// Lobby signal: everyone who is going to play has joined.
    #[serde(rename = "everybody in")]
    EverybodyIn(RoomRef),

    #[serde(rename = "start game")]
    StartGame(RoomRef),

    #[serde(rename = "enter submission")]
    EnterSubmission(SubmissionRequest),

    #[serde(rename = "vote")]
    Vote(VoteRequest),

    #[serde(rename = "close room")]
    CloseRoom(RoomRef),
}

impl ClientEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestRoom => "request room",
            Self::JoinRoom(_) => "join room",
            Self::RejoinRoom(_) => "rejoin room",
            Self::EverybodyIn(_) => "everybody in",
            Self::StartGame(_) => "start game",
            Self::EnterSubmission(_) => "enter submission",
            Self::Vote(_) => "vote",
            Self::CloseRoom(_) => "close room",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreated {
    pub roomcode: RoomCode,
}

/// Result of a `join room` request.
///
/// On success it is broadcast to the whole room; on failure only the
/// requester sees it, with an empty `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReply {
    pub joined: bool,
    pub username: String,
    pub fail_reason: String,
    pub player_count: usize,
}

impl JoinReply {
    pub fn accepted(username: impl Into<String>, player_count: usize) -> Self {
        Self {
            joined: true,
            username: username.into(),
            fail_reason: String::new(),
            player_count,
        }
    }

    pub fn rejected(reason: impl Into<String>, player_count: usize) -> Self {
        Self {
            joined: false,
            username: String::new(),
            fail_reason: reason.into(),
            player_count,
        }
    }
}

/// Result of a `rejoin room` request. Only ever sent to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejoinReply {
    pub rejoined: bool,
    pub username: String,
    pub fail_reason: String,
}

impl RejoinReply {
    pub fn accepted(username: impl Into<String>) -> Self {
        Self {
            rejoined: true,
            username: username.into(),
            fail_reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            rejoined: false,
            username: String::new(),
            fail_reason: reason.into(),
        }
    }
}

/// Announces a new round: its category and the two contestants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStarted {
    pub category: String,
    pub player1_name: String,
    pub player2_name: String,
}

/// Remaining round time, in round time units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeChanged {
    pub time: f64,
}

/// Which contestant slot (0 or 1) won the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub winner: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub player: serde_json::Value,
    pub submission: String,
}

/// The lead percentage after a vote, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub percentage: f64,
}

/// A request-scoped failure, sent only to the client that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameError {
    pub game_error: String,
}

impl GameError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            game_error: message.into(),
        }
    }
}

/// Everything the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "request room")]
    RoomCreated(RoomCreated),

    #[serde(rename = "join room")]
    JoinRoom(JoinReply),

    #[serde(rename = "rejoin room")]
    RejoinRoom(RejoinReply),

    #[serde(rename = "everybody in")]
    EverybodyIn,

    #[serde(rename = "start game")]
    GameStarted(GameStarted),

    #[serde(rename = "time changed")]
    TimeChanged(TimeChanged),

    #[serde(rename = "timeout")]
    Timeout(RoundResult),

    #[serde(rename = "enter submission")]
    Submission(Submission),

    #[serde(rename = "vote")]
    Vote(VoteTally),

    #[serde(rename = "close room")]
    RoomClosed,

    #[serde(rename = "game_error")]
    GameError(GameError),
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated(_) => "request room",
            Self::JoinRoom(_) => "join room",
            Self::RejoinRoom(_) => "rejoin room",
            Self::EverybodyIn => "everybody in",
            Self::GameStarted(_) => "start game",
            Self::TimeChanged(_) => "time changed",
            Self::Timeout(_) => "timeout",
            Self::Submission(_) => "enter submission",
            Self::Vote(_) => "vote",
            Self::RoomClosed => "close room",
            Self::GameError(_) => "game_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_code_well_formed() {
        assert!(RoomCode::from("ABCD").is_well_formed());
        assert!(!RoomCode::from("abcd").is_well_formed());
        assert!(!RoomCode::from("ABC").is_well_formed());
        assert!(!RoomCode::from("ABCDE").is_well_formed());
        assert!(!RoomCode::from("AB1D").is_well_formed());
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let value = serde_json::to_value(RoomCode::from("QWER")).unwrap();
        assert_eq!(value, json!("QWER"));
    }

    #[test]
    fn test_member_id_display() {
        assert_eq!(MemberId(9).to_string(), "M-9");
    }

    #[test]
    fn test_payloadless_inbound_event() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "request room"})).unwrap();
        assert_eq!(event, ClientEvent::RequestRoom);
    }

    #[test]
    fn test_join_room_inbound_fields() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "join room",
            "data": {"roomcode": "ABCD", "username": "alice"}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom(MembershipRequest {
                roomcode: RoomCode::from("ABCD"),
                username: "alice".into(),
            })
        );
        assert_eq!(event.name(), "join room");
    }

    #[test]
    fn test_vote_without_player_decodes_with_none() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "vote",
            "data": {"roomcode": "ABCD"}
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Vote(VoteRequest {
                roomcode: RoomCode::from("ABCD"),
                player: None,
            })
        );
    }

    #[test]
    fn test_join_without_username_is_rejected() {
        let result: Result<ClientEvent, _> = serde_json::from_value(json!({
            "event": "join room",
            "data": {"roomcode": "ABCD"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_submission_player_is_kept_verbatim() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "enter submission",
            "data": {"roomcode": "ABCD", "player": {"slot": 1}, "submission": "a cat"}
        }))
        .unwrap();
        match event {
            ClientEvent::EnterSubmission(req) => assert_eq!(req.player, json!({"slot": 1})),
            other => panic!("expected EnterSubmission, got {other:?}"),
        }
    }

    #[test]
    fn test_join_reply_uses_camel_case() {
        let value = serde_json::to_value(ServerEvent::JoinRoom(JoinReply::accepted("bob", 2))).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "join room",
                "data": {"joined": true, "username": "bob", "failReason": "", "playerCount": 2}
            })
        );
    }

    #[test]
    fn test_game_started_field_names() {
        let value = serde_json::to_value(ServerEvent::GameStarted(GameStarted {
            category: "Animals".into(),
            player1_name: "alice".into(),
            player2_name: "bob".into(),
        }))
        .unwrap();
        assert_eq!(value["data"]["player1Name"], "alice");
        assert_eq!(value["data"]["player2Name"], "bob");
    }

    #[test]
    fn test_payloadless_outbound_events_have_no_data() {
        let value = serde_json::to_value(ServerEvent::RoomClosed).unwrap();
        assert_eq!(value, json!({"event": "close room"}));
        let value = serde_json::to_value(ServerEvent::EverybodyIn).unwrap();
        assert_eq!(value, json!({"event": "everybody in"}));
    }

    #[test]
    fn test_rejected_replies_blank_the_username() {
        let join = JoinReply::rejected("Username is taken", 3);
        assert!(!join.joined);
        assert!(join.username.is_empty());
        assert_eq!(join.player_count, 3);

        let rejoin = RejoinReply::rejected("Room does not exist");
        assert!(!rejoin.rejoined);
        assert!(rejoin.username.is_empty());
    }

    #[test]
    fn test_server_event_names_match_wire_tags() {
        let events = [
            ServerEvent::TimeChanged(TimeChanged { time: 1.5 }),
            ServerEvent::Timeout(RoundResult { winner: 1 }),
            ServerEvent::Vote(VoteTally { percentage: 0.5 }),
            ServerEvent::RoomClosed,
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}
