//! `HackboxServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hackbox_protocol::{Codec, JsonCodec, MemberId};
use hackbox_room::{Categories, RoomRegistry, RoundConfig};
use hackbox_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{HackboxError, ServerConfig};

/// Shared server state passed to each connection task.
///
/// The registry has its own lock. Handlers clone a room handle out of it
/// and release the lock before awaiting the room.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) categories: Categories,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
    pub(crate) heartbeat_interval: Duration,
    next_member: AtomicU64,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(
        rooms: RoomRegistry,
        categories: Categories,
        codec: C,
        idle_timeout: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            rooms: Mutex::new(rooms),
            categories,
            codec,
            idle_timeout,
            heartbeat_interval,
            next_member: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_member_id(&self) -> MemberId {
        MemberId(self.next_member.fetch_add(1, Ordering::Relaxed))
    }
}

/// Builder for configuring and starting a Hackbox server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), hackbox::HackboxError> {
/// use hackbox::prelude::*;
///
/// let server = HackboxServer::<JsonCodec>::builder()
///     .bind("127.0.0.1:3000")
///     .categories(Categories::new(["Animals", "Foods"]))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct HackboxServerBuilder {
    bind_addr: String,
    categories: Categories,
    round: RoundConfig,
    room_channel_size: usize,
    idle_timeout: Duration,
    heartbeat_interval: Duration,
    seed: Option<u64>,
}

impl HackboxServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            categories: Categories::default(),
            round: RoundConfig::default(),
            room_channel_size: hackbox_room::DEFAULT_CHANNEL_SIZE,
            idle_timeout: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(30),
            seed: None,
        }
    }

    /// Takes every setting from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig, categories: Categories) -> Self {
        Self::new()
            .bind(&config.listen_addr)
            .categories(categories)
            .round_config(config.round.clone())
            .room_channel_size(config.room_channel_size)
            .idle_timeout(config.idle_timeout())
            .heartbeat_interval(config.heartbeat_interval())
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// The master category list every new room copies.
    pub fn categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }

    pub fn round_config(mut self, round: RoundConfig) -> Self {
        self.round = round;
        self
    }

    pub fn room_channel_size(mut self, size: usize) -> Self {
        self.room_channel_size = size;
        self
    }

    /// A connection from which nothing at all arrives for this long is
    /// closed. Pongs count, so a peer that answers pings stays connected.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// How often each connection is pinged. Keep it well below the idle
    /// timeout.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Makes room codes, category draws and contestant picks reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Binds the listener. Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build(self) -> Result<HackboxServer<JsonCodec>, HackboxError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let rooms = match self.seed {
            Some(seed) => RoomRegistry::with_seed(self.round, seed),
            None => RoomRegistry::new(self.round),
        }
        .with_channel_size(self.room_channel_size);

        let state = Arc::new(ServerState::new(
            rooms,
            self.categories,
            JsonCodec,
            self.idle_timeout,
            self.heartbeat_interval,
        ));

        Ok(HackboxServer { transport, state })
    }
}

impl Default for HackboxServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Hackbox server. Call [`run`](Self::run) to accept connections.
pub struct HackboxServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> HackboxServer<C> {
    pub fn builder() -> HackboxServerBuilder {
        HackboxServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections and spawns a handler task for each. Runs until
    /// the task is dropped.
    pub async fn run(mut self) -> Result<(), HackboxError> {
        tracing::info!(
            categories = self.state.categories.len(),
            "Hackbox server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
