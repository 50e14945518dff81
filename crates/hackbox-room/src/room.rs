//! Room actor: one Tokio task per room.
//!
//! The actor owns the [`Room`] state, the room's broadcast group, and its
//! round timer. Commands arrive over a bounded channel and are handled one
//! at a time, interleaved with timer ticks by a single `select!`, so
//! nothing else ever touches a room's state.

use std::collections::HashMap;
use std::ops::ControlFlow;

use hackbox_protocol::{
    GameStarted, JoinReply, MemberId, RoomCode, RoundResult, ServerEvent, Submission,
    TimeChanged, VoteTally,
};
use hackbox_tick::{TickConfig, TickInfo, TickScheduler};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::{CategoryPool, JoinRejected, Room, RoomError, RoomPhase, RoundConfig};

/// Channel a room uses to push events to one connection.
pub type MemberSender = mpsc::UnboundedSender<ServerEvent>;

/// A connection subscribing to a room's broadcasts.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: MemberId,
    pub sender: MemberSender,
}

impl Member {
    pub fn new(id: MemberId, sender: MemberSender) -> Self {
        Self { id, sender }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

pub(crate) enum RoomCommand {
    Subscribe {
        member: Member,
        reply: Reply<()>,
    },
    Join {
        name: String,
        member: Member,
        reply: oneshot::Sender<Result<usize, JoinRejected>>,
    },
    Rejoin {
        name: String,
        member: Member,
        reply: Reply<()>,
    },
    EverybodyIn {
        reply: Reply<()>,
    },
    StartGame {
        reply: Reply<()>,
    },
    Submit {
        player: serde_json::Value,
        submission: String,
        reply: Reply<()>,
    },
    Vote {
        slot: usize,
        reply: Reply<f64>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Close {
        reply: Reply<()>,
    },
}

/// A snapshot of a room, taken by its actor.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: RoomPhase,
    pub players: Vec<String>,
    /// Connections currently subscribed to broadcasts.
    pub members: usize,
    /// Contestant names while a round is running.
    pub contestants: Option<[String; 2]>,
    pub lifetime: Option<f64>,
    pub percentage: f64,
    pub categories_left: usize,
    /// Whether the round timer is armed.
    pub ticking: bool,
}

impl RoomInfo {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase.is_in_progress()
    }
}

/// Handle to a running room. Cheap to clone.
///
/// Every method waits for the actor's reply. Once the room has been closed
/// they all fail with [`RoomError::Unavailable`].
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the room's task has ended.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Adds a connection to the broadcast group without making it a player.
    pub async fn subscribe(&self, member: Member) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Subscribe { member, reply }).await
    }

    /// Adds a player. On success the room broadcasts the `join room` reply
    /// to every member, the joining connection included, and returns the
    /// new player count.
    ///
    /// A refusal carries the player count read in the same step as the
    /// refusal.
    pub async fn join(&self, name: impl Into<String>, member: Member) -> Result<usize, JoinRejected> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = RoomCommand::Join {
            name: name.into(),
            member,
            reply: reply_tx,
        };
        let unavailable = || JoinRejected::without_room(self.unavailable());
        self.sender.send(command).await.map_err(|_| unavailable())?;
        reply_rx.await.map_err(|_| unavailable())?
    }

    /// Reattaches a connection to an existing player. Nothing is broadcast.
    pub async fn rejoin(&self, name: impl Into<String>, member: Member) -> Result<(), RoomError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Rejoin {
            name,
            member,
            reply,
        })
        .await
    }

    pub async fn everybody_in(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::EverybodyIn { reply }).await
    }

    /// Starts a round: broadcasts `start game`, then the initial
    /// `time changed`, then arms the timer.
    pub async fn start_game(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::StartGame { reply }).await
    }

    /// Relays a submission to the whole room.
    pub async fn submit(
        &self,
        player: serde_json::Value,
        submission: impl Into<String>,
    ) -> Result<(), RoomError> {
        let submission = submission.into();
        self.request(|reply| RoomCommand::Submit {
            player,
            submission,
            reply,
        })
        .await
    }

    /// Votes for contestant slot 0 or 1 and returns the broadcast
    /// percentage.
    pub async fn vote(&self, slot: usize) -> Result<f64, RoomError> {
        self.request(|reply| RoomCommand::Vote { slot, reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Broadcasts `close room`, drops every member, and stops the room's
    /// task. No event is emitted after this returns.
    pub async fn close(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Close { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }
}

/// What woke the actor.
enum Wake {
    Command(Option<RoomCommand>),
    Tick(TickInfo),
}

struct RoomActor {
    room: Room,
    members: HashMap<MemberId, MemberSender>,
    timer: TickScheduler,
    rng: StdRng,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room = %self.room.code(), "room actor started");

        loop {
            let wake = tokio::select! {
                cmd = self.receiver.recv() => Wake::Command(cmd),
                tick = self.timer.wait_for_tick() => Wake::Tick(tick),
            };

            match wake {
                Wake::Tick(info) => {
                    self.handle_tick(&info);
                    self.timer.record_tick_end();
                }
                Wake::Command(Some(cmd)) => {
                    if self.handle_command(cmd).is_break() {
                        break;
                    }
                }
                Wake::Command(None) => {
                    // Every handle was dropped.
                    self.timer.stop();
                    break;
                }
            }
        }

        tracing::info!(room = %self.room.code(), "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Subscribe { member, reply } => {
                self.subscribe(member);
                let _ = reply.send(Ok(()));
            }
            RoomCommand::Join {
                name,
                member,
                reply,
            } => {
                let result = self.room.join(&name).map_err(|error| JoinRejected {
                    error,
                    player_count: self.room.player_count(),
                });
                if let Ok(count) = result {
                    self.subscribe(member);
                    self.broadcast(ServerEvent::JoinRoom(JoinReply::accepted(name, count)));
                }
                let _ = reply.send(result);
            }
            RoomCommand::Rejoin {
                name,
                member,
                reply,
            } => {
                let result = self.room.rejoin(&name);
                if result.is_ok() {
                    tracing::debug!(room = %self.room.code(), player = %name, "player rejoined");
                    self.subscribe(member);
                }
                let _ = reply.send(result);
            }
            RoomCommand::EverybodyIn { reply } => {
                let result = self.room.everybody_in();
                if result.is_ok() {
                    self.broadcast(ServerEvent::EverybodyIn);
                }
                let _ = reply.send(result);
            }
            RoomCommand::StartGame { reply } => {
                let _ = reply.send(self.start_game());
            }
            RoomCommand::Submit {
                player,
                submission,
                reply,
            } => {
                let result = self.room.check_submission();
                if result.is_ok() {
                    self.broadcast(ServerEvent::Submission(Submission { player, submission }));
                }
                let _ = reply.send(result);
            }
            RoomCommand::Vote { slot, reply } => {
                let result = self.room.vote(slot);
                if let Ok(percentage) = result {
                    self.broadcast(ServerEvent::Vote(VoteTally { percentage }));
                }
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Close { reply } => {
                self.shutdown();
                let _ = reply.send(Ok(()));
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn start_game(&mut self) -> Result<(), RoomError> {
        // A round's timer is stopped in the same step that ends it, so it
        // is never still armed here.
        debug_assert!(!self.timer.is_running());

        let start = self.room.start_game(&mut self.rng)?;
        let [player1_name, player2_name] = start.contestants;
        self.broadcast(ServerEvent::GameStarted(GameStarted {
            category: start.category,
            player1_name,
            player2_name,
        }));
        self.broadcast(ServerEvent::TimeChanged(TimeChanged {
            time: start.lifetime,
        }));
        self.timer.start();
        Ok(())
    }

    /// Advances the round once per elapsed interval, skipped ones included,
    /// and broadcasts the resulting time.
    fn handle_tick(&mut self, info: &TickInfo) {
        let mut last = None;
        for _ in 0..=info.ticks_skipped {
            let Some(tick) = self.room.tick() else {
                break;
            };
            let finished = tick.winner.is_some();
            last = Some(tick);
            if finished {
                break;
            }
        }
        let Some(tick) = last else {
            // No round to drive.
            self.timer.stop();
            return;
        };
        tracing::trace!(
            room = %self.room.code(),
            tick = info.tick,
            skipped = info.ticks_skipped,
            time = tick.time,
            "round tick"
        );

        self.broadcast(ServerEvent::TimeChanged(TimeChanged { time: tick.time }));
        if let Some(winner) = tick.winner {
            self.timer.stop();
            self.broadcast(ServerEvent::Timeout(RoundResult { winner }));
        }
    }

    fn shutdown(&mut self) {
        self.timer.stop();
        self.room.abort_round();
        self.broadcast(ServerEvent::RoomClosed);
        let evicted = self.members.len();
        self.members.clear();
        tracing::info!(room = %self.room.code(), evicted, "room closed");
    }

    fn subscribe(&mut self, member: Member) {
        if self.members.insert(member.id, member.sender).is_none() {
            tracing::debug!(room = %self.room.code(), member = %member.id, "member subscribed");
        }
    }

    /// Sends `event` to every member, dropping members whose connection
    /// has gone away.
    fn broadcast(&mut self, event: ServerEvent) {
        let code = self.room.code();
        self.members.retain(|id, sender| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                tracing::debug!(room = %code, member = %id, "pruned departed member");
            }
            alive
        });
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.room.code().clone(),
            phase: self.room.phase(),
            players: self
                .room
                .players()
                .iter()
                .map(|p| p.name().to_owned())
                .collect(),
            members: self.members.len(),
            contestants: self
                .room
                .contestants()
                .map(|[a, b]| [a.name().to_owned(), b.name().to_owned()]),
            lifetime: self.room.lifetime(),
            percentage: self.room.display_percentage(),
            categories_left: self.room.category_pool().len(),
            ticking: self.timer.is_running(),
        }
    }
}

/// Spawns a room actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(
    code: RoomCode,
    categories: CategoryPool,
    config: RoundConfig,
    channel_size: usize,
    rng: StdRng,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let timer = TickScheduler::new(TickConfig::with_interval(config.tick_interval()));

    let actor = RoomActor {
        room: Room::new(code.clone(), categories, config),
        members: HashMap::new(),
        timer,
        rng,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
