//! Players and their round scores.

/// One contestant's share of the current round's vote.
///
/// Votes arrive as whole points, but decay between ticks makes the count
/// fractional, so it is kept as an `f64`. It never goes negative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Score {
    votes: f64,
}

impl Score {
    pub fn votes(&self) -> f64 {
        self.votes
    }

    pub fn add_point(&mut self) {
        self.votes += 1.0;
    }

    pub fn clear(&mut self) {
        self.votes = 0.0;
    }

    /// Moves the vote count `rate` of the way toward `target`.
    pub fn decay_toward(&mut self, target: f64, rate: f64) {
        self.votes = (self.votes - (self.votes - target) * rate).max(0.0);
    }
}

/// A participant in a room, known by a display name unique to that room.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    name: String,
    pub(crate) score: Score,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: Score::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> Score {
        self.score
    }
}

/// Share of the vote held by the second contestant, in `[0, 1]`.
///
/// `0.5` when neither side has any votes.
pub fn lead_percentage(first: Score, second: Score) -> f64 {
    let total = first.votes + second.votes;
    if total <= f64::EPSILON {
        return 0.5;
    }
    (second.votes / total).clamp(0.0, 1.0)
}

/// Pulls both scores toward their mean by `rate`.
///
/// The total is unchanged, so the lead percentage's distance from 0.5
/// shrinks by a factor of `1 - rate`.
pub fn shift_scores(first: &mut Score, second: &mut Score, rate: f64) {
    let mean = (first.votes + second.votes) / 2.0;
    first.decay_toward(mean, rate);
    second.decay_toward(mean, rate);
}
