//! The room state machine: roster, category pool, and round lifecycle.
//!
//! [`Room`] is plain synchronous state. It never touches channels or
//! timers; the room actor owns one, feeds it commands and ticks one at a
//! time, and turns its return values into broadcasts.

use hackbox_protocol::RoomCode;
use rand::Rng;

use crate::player::{lead_percentage, shift_scores};
use crate::{CategoryPool, Player, RoomError, RoomPhase, RoundConfig};

/// The round currently being played.
#[derive(Debug, Clone, PartialEq)]
struct Round {
    category: String,
    /// Indices into `Room::players`; always two distinct entries.
    contestants: [usize; 2],
    lifetime: f64,
}

/// What a successful [`Room::start_game`] announces.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStart {
    pub category: String,
    pub contestants: [String; 2],
    /// Time on the clock at the start of the round.
    pub lifetime: f64,
}

/// Result of advancing the round clock by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Time left after this tick, never negative.
    pub time: f64,
    /// Set on the tick that ran the clock out.
    pub winner: Option<usize>,
}

/// One game session: its players, its categories, and the current round.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    config: RoundConfig,
    players: Vec<Player>,
    categories: CategoryPool,
    phase: RoomPhase,
    round: Option<Round>,
}

impl Room {
    pub fn new(code: RoomCode, categories: CategoryPool, config: RoundConfig) -> Self {
        Self {
            code,
            config,
            players: Vec::new(),
            categories,
            phase: RoomPhase::Idle,
            round: None,
        }
    }

    // -- Membership ---------------------------------------------------------

    /// Adds a player and returns the new player count.
    ///
    /// # Errors
    /// - [`RoomError::GameInProgress`] while a round is running
    /// - [`RoomError::UsernameTaken`] if the name is already in the room
    pub fn join(&mut self, name: &str) -> Result<usize, RoomError> {
        if !self.phase.is_joinable() {
            return Err(RoomError::GameInProgress);
        }
        if self.has_player(name) {
            return Err(RoomError::UsernameTaken(name.to_owned()));
        }
        self.players.push(Player::new(name));
        tracing::info!(
            room = %self.code,
            player = name,
            players = self.players.len(),
            "player joined"
        );
        Ok(self.players.len())
    }

    /// Confirms that `name` already belongs to this room. Allowed mid-round.
    pub fn rejoin(&self, name: &str) -> Result<(), RoomError> {
        if self.has_player(name) {
            Ok(())
        } else {
            Err(RoomError::PlayerNotFound(name.to_owned()))
        }
    }

    /// Case-sensitive membership test.
    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name() == name)
    }

    // -- Round lifecycle ----------------------------------------------------

    /// Checks the preconditions of the lobby "everybody in" signal, which
    /// are the same as for starting a round. Changes nothing.
    pub fn everybody_in(&self) -> Result<(), RoomError> {
        self.ensure_can_start()
    }

    /// Draws a category, picks two distinct contestants, and starts the
    /// clock.
    ///
    /// # Errors
    /// In priority order: [`RoomError::NotEnoughPlayers`],
    /// [`RoomError::AlreadyInProgress`], [`RoomError::CategoryPoolExhausted`].
    /// The room is unchanged on error.
    pub fn start_game<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<RoundStart, RoomError> {
        self.ensure_can_start()?;
        let Some(category) = self.categories.draw(rng) else {
            return Err(RoomError::CategoryPoolExhausted);
        };
        self.advance(RoomPhase::Starting);

        let first = rng.random_range(0..self.players.len());
        let mut second = rng.random_range(0..self.players.len() - 1);
        if second >= first {
            second += 1;
        }

        let start = RoundStart {
            category: category.clone(),
            contestants: [
                self.players[first].name().to_owned(),
                self.players[second].name().to_owned(),
            ],
            lifetime: self.config.round_length,
        };
        self.round = Some(Round {
            category,
            contestants: [first, second],
            lifetime: self.config.round_length,
        });
        self.advance(RoomPhase::InProgress);

        tracing::info!(
            room = %self.code,
            category = %start.category,
            first = %start.contestants[0],
            second = %start.contestants[1],
            "round started"
        );
        Ok(start)
    }

    /// Advances the clock by one step and decays the lead toward 50/50.
    ///
    /// Returns `None` when no round is running. On the tick that runs the
    /// clock out, the winner is decided (contestant 0 if the lead
    /// percentage is below 0.5, otherwise 1), both contestants' scores are
    /// cleared, and the room returns to `Idle`.
    pub fn tick(&mut self) -> Option<Tick> {
        let step = self.config.tick_step;
        let rate = self.config.decay_rate;
        let round = self.round.as_mut()?;

        round.lifetime = (round.lifetime - step).max(0.0);
        let time = round.lifetime;
        let contestants = round.contestants;

        let (first, second) = contestant_pair_mut(&mut self.players, contestants);
        shift_scores(&mut first.score, &mut second.score, rate);

        if time > 0.0 {
            return Some(Tick { time, winner: None });
        }

        let winner = if lead_percentage(first.score, second.score) < 0.5 { 0 } else { 1 };
        first.score.clear();
        second.score.clear();
        self.round = None;
        self.advance(RoomPhase::Idle);

        tracing::info!(room = %self.code, winner, "round finished");
        Some(Tick {
            time,
            winner: Some(winner),
        })
    }

    /// Ends the current round without a winner. Returns `false` if no round
    /// was running.
    pub fn abort_round(&mut self) -> bool {
        let Some(round) = self.round.take() else {
            return false;
        };
        for index in round.contestants {
            self.players[index].score.clear();
        }
        self.advance(RoomPhase::Idle);
        tracing::info!(room = %self.code, "round aborted");
        true
    }

    // -- Round content ------------------------------------------------------

    /// Adds a vote for contestant slot 0 or 1 and returns the new lead
    /// percentage.
    pub fn vote(&mut self, slot: usize) -> Result<f64, RoomError> {
        let round = self.round.as_ref().ok_or(RoomError::RoundNotActive)?;
        let index = *round
            .contestants
            .get(slot)
            .ok_or(RoomError::InvalidContestant(slot))?;
        self.players[index].score.add_point();
        Ok(self.display_percentage())
    }

    /// Submissions are relayed only while a round is running. The
    /// submitter's identity is not checked.
    pub fn check_submission(&self) -> Result<(), RoomError> {
        if self.round.is_some() {
            Ok(())
        } else {
            Err(RoomError::RoundNotActive)
        }
    }

    /// Share of the vote held by contestant 1, in `[0, 1]`; 0.5 when nobody
    /// has voted or no round is running.
    pub fn display_percentage(&self) -> f64 {
        match self.contestants() {
            Some([first, second]) => lead_percentage(first.score(), second.score()),
            None => 0.5,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_in_progress(&self) -> bool {
        self.round.is_some()
    }

    /// The two contestants of the running round.
    pub fn contestants(&self) -> Option<[&Player; 2]> {
        let round = self.round.as_ref()?;
        let [a, b] = round.contestants;
        Some([&self.players[a], &self.players[b]])
    }

    /// Time left on the clock of the running round.
    pub fn lifetime(&self) -> Option<f64> {
        self.round.as_ref().map(|r| r.lifetime)
    }

    pub fn current_category(&self) -> Option<&str> {
        self.round.as_ref().map(|r| r.category.as_str())
    }

    pub fn category_pool(&self) -> &CategoryPool {
        &self.categories
    }

    fn ensure_can_start(&self) -> Result<(), RoomError> {
        let need = self.config.min_players();
        if self.players.len() < need {
            return Err(RoomError::NotEnoughPlayers {
                have: self.players.len(),
                need,
            });
        }
        if self.round.is_some() {
            return Err(RoomError::AlreadyInProgress);
        }
        Ok(())
    }

    fn advance(&mut self, target: RoomPhase) {
        debug_assert!(
            self.phase.can_transition_to(target),
            "invalid phase transition {} -> {}",
            self.phase,
            target
        );
        self.phase = target;
    }
}

/// Mutable access to two distinct players at once.
fn contestant_pair_mut(players: &mut [Player], [a, b]: [usize; 2]) -> (&mut Player, &mut Player) {
    if a < b {
        let (left, right) = players.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = players.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
