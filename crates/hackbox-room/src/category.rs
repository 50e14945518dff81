//! Category master list and per-room pools.

use std::sync::Arc;

use rand::Rng;

/// The master list of round categories, loaded once at startup.
///
/// Cloning shares the list. It is never modified after construction; each
/// room draws from its own [`CategoryPool`] copy.
#[derive(Debug, Clone, Default)]
pub struct Categories(Arc<[String]>);

impl Categories {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(items.into_iter().map(Into::into).collect())
    }

    /// Parses a comma- or newline-separated list, trimming each entry and
    /// skipping blanks.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.split([',', '\n'])
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Categories a room has not played yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPool {
    available: Vec<String>,
}

impl CategoryPool {
    /// Takes a private copy of the master list.
    pub fn new(master: &Categories) -> Self {
        Self {
            available: master.as_slice().to_vec(),
        }
    }

    /// Removes and returns a uniformly random category, or `None` if the
    /// pool is empty.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<String> {
        if self.available.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.available.len());
        Some(self.available.swap_remove(index))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.available.iter().any(|c| c == category)
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}
