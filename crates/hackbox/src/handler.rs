//! Per-connection handler: event decoding, routing, and error replies.
//!
//! Each accepted connection gets two tasks:
//!   1. a reader that decodes incoming frames and dispatches them
//!   2. a writer that drains the connection's outbound channel and pings
//!      the peer between events
//!
//! The reader's idle timeout is reset by any inbound frame. A client that
//! only listens still answers the writer's pings, so it is never mistaken
//! for a dead one.
//!
//! Direct replies and room broadcasts travel through the same channel, so
//! a client sees them in the order they were produced.

use std::sync::Arc;

use hackbox_protocol::{
    ClientEvent, Codec, GameError, JoinReply, MembershipRequest, RejoinReply, RoomCode,
    RoomCreated, RoomRef, ServerEvent, SubmissionRequest, VoteRequest,
};
use hackbox_room::{Member, RoomError, RoomHandle};
use hackbox_transport::{Connection, Frame, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::HackboxError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), HackboxError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let (tx, rx) = mpsc::unbounded_channel();
    let member = Member::new(state.next_member_id(), tx);
    tracing::debug!(%conn_id, member = %member.id, "connection opened");

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));
    let result = read_loop(&conn, &state, &member).await;

    // Rooms notice the closed channel on their next broadcast.
    writer.abort();
    let _ = conn.close().await;
    tracing::debug!(%conn_id, member = %member.id, "connection closed");
    result
}

async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    member: &Member,
) -> Result<(), HackboxError> {
    loop {
        let frame = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                tracing::debug!(member = %member.id, "connection closed by client");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::debug!(member = %member.id, "connection idle, closing");
                return Ok(());
            }
        };
        match frame {
            Frame::Text(text) => dispatch(state, member, &text).await,
            Frame::Heartbeat => tracing::trace!(member = %member.id, "heartbeat"),
        }
    }
}

async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
) {
    let mut heartbeat = tokio::time::interval(state.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else { break };
                let text = match state.codec.encode(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(event = event.name(), error = %e, "failed to encode event");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&text).await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "ping failed, stopping writer");
                    break;
                }
            }
        }
    }
}

/// Decodes one frame and carries out the request.
///
/// Failures never end the connection: they are reported to `member` alone,
/// as a `game_error` or as a rejected join/rejoin reply.
pub(crate) async fn dispatch<C: Codec>(state: &ServerState<C>, member: &Member, text: &str) {
    let event: ClientEvent = match state.codec.decode(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(member = %member.id, error = %e, "malformed event");
            reply(member, ServerEvent::GameError(GameError::new("Invalid json format")));
            return;
        }
    };

    let name = event.name();
    if let Err(e) = handle_event(state, member, event).await {
        tracing::debug!(member = %member.id, event = name, error = %e, "request failed");
        reply(member, ServerEvent::GameError(GameError::new(game_error_message(&e))));
    }
}

async fn handle_event<C: Codec>(
    state: &ServerState<C>,
    member: &Member,
    event: ClientEvent,
) -> Result<(), RoomError> {
    match event {
        ClientEvent::RequestRoom => {
            let room = state.rooms.lock().await.create_room(&state.categories)?;
            room.subscribe(member.clone()).await?;
            reply(
                member,
                ServerEvent::RoomCreated(RoomCreated {
                    roomcode: room.code().clone(),
                }),
            );
        }
        ClientEvent::JoinRoom(req) => join_room(state, member, req).await,
        ClientEvent::RejoinRoom(req) => rejoin_room(state, member, req).await,
        ClientEvent::EverybodyIn(RoomRef { roomcode }) => {
            lookup(state, &roomcode).await?.everybody_in().await?;
        }
        ClientEvent::StartGame(RoomRef { roomcode }) => {
            lookup(state, &roomcode).await?.start_game().await?;
        }
        ClientEvent::EnterSubmission(SubmissionRequest {
            roomcode,
            player,
            submission,
        }) => {
            lookup(state, &roomcode).await?.submit(player, submission).await?;
        }
        ClientEvent::Vote(VoteRequest { roomcode, player }) => {
            let room = lookup(state, &roomcode).await?;
            let slot = player.ok_or(RoomError::MissingField("player"))?;
            room.vote(slot).await?;
        }
        ClientEvent::CloseRoom(RoomRef { roomcode }) => {
            let room = state
                .rooms
                .lock()
                .await
                .remove_room(&roomcode)
                .ok_or(RoomError::NotFound(roomcode))?;
            room.close().await?;
        }
    }
    Ok(())
}

async fn join_room<C: Codec>(state: &ServerState<C>, member: &Member, req: MembershipRequest) {
    let MembershipRequest { roomcode, username } = req;
    let room = match lookup(state, &roomcode).await {
        Ok(room) => room,
        Err(e) => {
            reply(member, ServerEvent::JoinRoom(JoinReply::rejected(join_fail_reason(&e), 0)));
            return;
        }
    };

    // Success is broadcast by the room, to this member included.
    if let Err(rejected) = room.join(username.as_str(), member.clone()).await {
        tracing::debug!(room = %roomcode, player = %username, error = %rejected, "join rejected");
        reply(
            member,
            ServerEvent::JoinRoom(JoinReply::rejected(
                join_fail_reason(&rejected.error),
                rejected.player_count,
            )),
        );
    }
}

async fn rejoin_room<C: Codec>(state: &ServerState<C>, member: &Member, req: MembershipRequest) {
    let MembershipRequest { roomcode, username } = req;
    let result = match lookup(state, &roomcode).await {
        Ok(room) => room.rejoin(username.as_str(), member.clone()).await,
        Err(e) => Err(e),
    };
    let event = match result {
        Ok(()) => RejoinReply::accepted(username),
        Err(e) => {
            tracing::debug!(room = %roomcode, player = %username, error = %e, "rejoin rejected");
            RejoinReply::rejected(join_fail_reason(&e))
        }
    };
    reply(member, ServerEvent::RejoinRoom(event));
}

async fn lookup<C: Codec>(state: &ServerState<C>, code: &RoomCode) -> Result<RoomHandle, RoomError> {
    state.rooms.lock().await.lookup(code)
}

/// Queues an event for this member's connection only.
fn reply(member: &Member, event: ServerEvent) {
    // Fails only once the writer is gone, and then nobody is listening.
    let _ = member.sender.send(event);
}

/// The `failReason` of a rejected join or rejoin.
///
/// A rejoin under an unknown name reports "Username is taken", as the
/// existing clients expect.
fn join_fail_reason(err: &RoomError) -> String {
    match err {
        RoomError::NotFound(_) | RoomError::Unavailable(_) => "Room does not exist".to_string(),
        RoomError::GameInProgress => "Game is already in progress".to_string(),
        RoomError::UsernameTaken(_) | RoomError::PlayerNotFound(_) => "Username is taken".to_string(),
        other => game_error_message(other),
    }
}

/// The `game_error` text sent to clients for a failed request.
fn game_error_message(err: &RoomError) -> String {
    match err {
        RoomError::NotFound(_) | RoomError::Unavailable(_) => "Roomcode does not exist".to_string(),
        RoomError::NotEnoughPlayers { .. } => "Room does not have enough players".to_string(),
        RoomError::AlreadyInProgress | RoomError::GameInProgress => {
            "Game is already in progress".to_string()
        }
        RoomError::MissingField(field) => format!("{field} missing from json object"),
        RoomError::CategoryPoolExhausted => "No categories left to play".to_string(),
        RoomError::RoundNotActive => "No round in progress".to_string(),
        RoomError::InvalidContestant(_) => "Invalid contestant index".to_string(),
        RoomError::UsernameTaken(_) | RoomError::PlayerNotFound(_) => "Username is taken".to_string(),
        RoomError::CodeSpaceExhausted => "No room codes left".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hackbox_protocol::{GameStarted, JsonCodec, RoundResult, TimeChanged, VoteTally};
    use hackbox_room::{Categories, RoomRegistry, RoundConfig};
    use serde_json::{Value, json};

    use super::*;

    type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

    fn state_with(categories: &[&str]) -> ServerState<JsonCodec> {
        ServerState::new(
            RoomRegistry::with_seed(RoundConfig::default(), 7),
            Categories::new(categories.iter().copied()),
            JsonCodec,
            Duration::from_secs(300),
            Duration::from_secs(30),
        )
    }

    fn state() -> ServerState<JsonCodec> {
        state_with(&["Animals", "Foods", "Movies"])
    }

    fn client(state: &ServerState<JsonCodec>) -> (Member, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Member::new(state.next_member_id(), tx), rx)
    }

    async fn send(state: &ServerState<JsonCodec>, member: &Member, frame: Value) {
        dispatch(state, member, &frame.to_string()).await;
    }

    fn drain(rx: &mut Inbox) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn game_error(message: &str) -> ServerEvent {
        ServerEvent::GameError(GameError::new(message))
    }

    /// Creates a room from `host` and returns its code.
    async fn open_room(state: &ServerState<JsonCodec>, host: &Member, rx: &mut Inbox) -> RoomCode {
        send(state, host, json!({"event": "request room"})).await;
        match drain(rx).pop() {
            Some(ServerEvent::RoomCreated(RoomCreated { roomcode })) => roomcode,
            other => panic!("expected request room reply, got {other:?}"),
        }
    }

    async fn join(state: &ServerState<JsonCodec>, member: &Member, code: &RoomCode, name: &str) {
        send(
            state,
            member,
            json!({"event": "join room", "data": {"roomcode": code, "username": name}}),
        )
        .await;
    }

    #[tokio::test]
    async fn test_malformed_frames_get_invalid_json_format() {
        let state = state();
        let (member, mut rx) = client(&state);

        dispatch(&state, &member, "{not json").await;
        dispatch(&state, &member, r#"{"event":"dance"}"#).await;
        dispatch(&state, &member, r#"{"event":"join room","data":{"roomcode":"ABCD"}}"#).await;

        assert_eq!(drain(&mut rx), vec![game_error("Invalid json format"); 3]);
        assert_eq!(state.rooms.lock().await.room_count(), 0);
    }

    #[tokio::test]
    async fn test_request_room_replies_with_code() {
        let state = state();
        let (host, mut rx) = client(&state);

        let code = open_room(&state, &host, &mut rx).await;
        assert!(code.is_well_formed());
        assert!(state.rooms.lock().await.contains(&code));
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_host_and_players() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let (alice, mut alice_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;

        join(&state, &alice, &code, "alice").await;

        let expected = ServerEvent::JoinRoom(JoinReply::accepted("alice", 1));
        assert_eq!(drain(&mut host_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut alice_rx), vec![expected]);
    }

    #[tokio::test]
    async fn test_join_failures_go_to_requester_only() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let (alice, _alice_rx) = client(&state);
        let (imposter, mut imposter_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;
        join(&state, &alice, &code, "alice").await;
        drain(&mut host_rx);

        join(&state, &imposter, &code, "alice").await;
        assert_eq!(
            drain(&mut imposter_rx),
            vec![ServerEvent::JoinRoom(JoinReply::rejected("Username is taken", 1))]
        );

        join(&state, &imposter, &RoomCode::from("NOPE"), "bob").await;
        assert_eq!(
            drain(&mut imposter_rx),
            vec![ServerEvent::JoinRoom(JoinReply::rejected("Room does not exist", 0))]
        );
        assert!(drain(&mut host_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_refused_mid_round() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;
        for name in ["alice", "bob"] {
            let (m, _rx) = client(&state);
            join(&state, &m, &code, name).await;
        }
        send(&state, &host, json!({"event": "start game", "data": {"roomcode": code}})).await;

        let (late, mut late_rx) = client(&state);
        join(&state, &late, &code, "carol").await;
        assert_eq!(
            drain(&mut late_rx),
            vec![ServerEvent::JoinRoom(JoinReply::rejected("Game is already in progress", 2))]
        );
    }

    #[tokio::test]
    async fn test_rejoin_replies_only_to_requester() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let (alice, _alice_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;
        join(&state, &alice, &code, "alice").await;
        drain(&mut host_rx);

        let (phone, mut phone_rx) = client(&state);
        let rejoin = |name: &str| json!({"event": "rejoin room", "data": {"roomcode": code, "username": name}});

        send(&state, &phone, rejoin("alice")).await;
        assert_eq!(
            drain(&mut phone_rx),
            vec![ServerEvent::RejoinRoom(RejoinReply::accepted("alice"))]
        );

        send(&state, &phone, rejoin("mallory")).await;
        assert_eq!(
            drain(&mut phone_rx),
            vec![ServerEvent::RejoinRoom(RejoinReply::rejected("Username is taken"))]
        );
        assert!(drain(&mut host_rx).is_empty());

        send(
            &state,
            &phone,
            json!({"event": "rejoin room", "data": {"roomcode": "NOPE", "username": "alice"}}),
        )
        .await;
        assert_eq!(
            drain(&mut phone_rx),
            vec![ServerEvent::RejoinRoom(RejoinReply::rejected("Room does not exist"))]
        );
    }

    #[tokio::test]
    async fn test_request_errors_become_game_errors() {
        let state = state();
        let (host, mut rx) = client(&state);
        let code = open_room(&state, &host, &mut rx).await;
        join(&state, &host, &code, "alice").await;
        drain(&mut rx);

        let cases = [
            (
                json!({"event": "start game", "data": {"roomcode": "NOPE"}}),
                "Roomcode does not exist",
            ),
            (
                json!({"event": "start game", "data": {"roomcode": code}}),
                "Room does not have enough players",
            ),
            (
                json!({"event": "everybody in", "data": {"roomcode": code}}),
                "Room does not have enough players",
            ),
            (
                json!({"event": "vote", "data": {"roomcode": code}}),
                "player missing from json object",
            ),
            (
                json!({"event": "vote", "data": {"roomcode": "NOPE", "player": 0}}),
                "Roomcode does not exist",
            ),
            (
                json!({"event": "vote", "data": {"roomcode": code, "player": 0}}),
                "No round in progress",
            ),
            (
                json!({"event": "enter submission", "data": {"roomcode": code, "player": 0, "submission": "x"}}),
                "No round in progress",
            ),
            (
                json!({"event": "close room", "data": {"roomcode": "NOPE"}}),
                "Roomcode does not exist",
            ),
        ];
        for (frame, message) in cases {
            send(&state, &host, frame.clone()).await;
            assert_eq!(drain(&mut rx), vec![game_error(message)], "for {frame}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_flow_over_dispatch() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;
        let (alice, _alice_rx) = client(&state);
        let (bob, _bob_rx) = client(&state);
        join(&state, &alice, &code, "alice").await;
        join(&state, &bob, &code, "bob").await;
        drain(&mut host_rx);

        send(&state, &host, json!({"event": "everybody in", "data": {"roomcode": code}})).await;
        send(&state, &host, json!({"event": "start game", "data": {"roomcode": code}})).await;

        let events = drain(&mut host_rx);
        assert_eq!(events[0], ServerEvent::EverybodyIn);
        assert!(matches!(events[1], ServerEvent::GameStarted(GameStarted { .. })));
        assert_eq!(events[2], ServerEvent::TimeChanged(TimeChanged { time: 60.0 }));

        send(&state, &host, json!({"event": "start game", "data": {"roomcode": code}})).await;
        assert_eq!(drain(&mut host_rx), vec![game_error("Game is already in progress")]);

        send(
            &state,
            &alice,
            json!({"event": "vote", "data": {"roomcode": code, "player": 0}}),
        )
        .await;
        assert_eq!(
            drain(&mut host_rx),
            vec![ServerEvent::Vote(VoteTally { percentage: 0.0 })]
        );

        send(
            &state,
            &bob,
            json!({"event": "enter submission", "data": {"roomcode": code, "player": {"name": "bob"}, "submission": "a cat"}}),
        )
        .await;
        let relayed = drain(&mut host_rx);
        assert!(matches!(
            &relayed[..],
            [ServerEvent::Submission(s)] if s.player == json!({"name": "bob"}) && s.submission == "a cat"
        ));

        send(&state, &alice, json!({"event": "vote", "data": {"roomcode": code, "player": 7}})).await;
        assert!(drain(&mut host_rx).is_empty(), "rejected vote is not broadcast");

        let mut last = None;
        while let Some(event) = host_rx.recv().await {
            if let ServerEvent::Timeout(result) = event {
                last = Some(result);
                break;
            }
        }
        assert_eq!(last, Some(RoundResult { winner: 0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_room_evicts_and_forgets() {
        let state = state();
        let (host, mut host_rx) = client(&state);
        let (alice, mut alice_rx) = client(&state);
        let (bob, _bob_rx) = client(&state);
        let code = open_room(&state, &host, &mut host_rx).await;
        join(&state, &alice, &code, "alice").await;
        join(&state, &bob, &code, "bob").await;
        send(&state, &host, json!({"event": "start game", "data": {"roomcode": code}})).await;
        drain(&mut alice_rx);

        send(&state, &host, json!({"event": "close room", "data": {"roomcode": code}})).await;
        assert_eq!(drain(&mut alice_rx), vec![ServerEvent::RoomClosed]);
        assert!(!state.rooms.lock().await.contains(&code));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut alice_rx).is_empty(), "no ticks after close");

        join(&state, &alice, &code, "alice").await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerEvent::JoinRoom(JoinReply::rejected("Room does not exist", 0))]
        );
    }

    #[tokio::test]
    async fn test_empty_category_list_reports_exhaustion() {
        let state = state_with(&[]);
        let (host, mut rx) = client(&state);
        let code = open_room(&state, &host, &mut rx).await;
        for name in ["alice", "bob"] {
            let (m, _rx) = client(&state);
            join(&state, &m, &code, name).await;
        }
        drain(&mut rx);

        send(&state, &host, json!({"event": "start game", "data": {"roomcode": code}})).await;
        assert_eq!(drain(&mut rx), vec![game_error("No categories left to play")]);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            game_error_message(&RoomError::InvalidContestant(3)),
            "Invalid contestant index"
        );
        assert_eq!(
            join_fail_reason(&RoomError::PlayerNotFound("x".into())),
            "Username is taken"
        );
        assert_eq!(
            join_fail_reason(&RoomError::Unavailable(RoomCode::from("ABCD"))),
            "Room does not exist"
        );
    }
}
