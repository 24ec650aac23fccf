use rand::{rngs::StdRng, SeedableRng};
use std::mem;
use tracing::{debug, info, warn};

use crate::types::*;

/// Source of pairings. Returns two distinct indices into a pool of `pool_len`
/// entrants; callers guarantee `pool_len >= 2`.
pub trait PairPicker: Send {
    fn pick(&mut self, pool_len: usize) -> (usize, usize);
}

/// Uniform unordered draw without replacement, equivalent to shuffling the
/// pool and taking the first two.
pub struct RandomPairPicker {
    rng: StdRng,
}

impl RandomPairPicker {
    pub fn from_entropy() -> Self {
        RandomPairPicker { rng: StdRng::from_entropy() }
    }
}

impl Default for RandomPairPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl PairPicker for RandomPairPicker {
    fn pick(&mut self, pool_len: usize) -> (usize, usize) {
        let drawn = rand::seq::index::sample(&mut self.rng, pool_len, 2);
        (drawn.index(0), drawn.index(1))
    }
}

/// Single-elimination "pick one of two" bracket.
///
/// Entrants move from `remaining` into either `survivors` (won their pairing
/// this stage) or the elimination order. Once `remaining` runs dry the
/// survivors are promoted to the next stage. The last entrant standing is
/// recorded as the final elimination, so the champion holds the highest rank.
pub struct BracketEngine<P: PairPicker = RandomPairPicker> {
    entrants: Vec<String>,
    stage_sizes: Vec<u32>,
    remaining: Vec<String>,
    survivors: Vec<String>,
    // Chronological; rank is position + 1.
    eliminated: Vec<String>,
    current: Option<Pairing>,
    stage: usize,
    finished: bool,
    picker: P,
}

impl BracketEngine<RandomPairPicker> {
    pub fn new(entrants: Vec<String>) -> Self {
        BracketEngine::with_picker(entrants, STAGE_SIZES.to_vec(), RandomPairPicker::from_entropy())
    }
}

impl<P: PairPicker> BracketEngine<P> {
    pub fn with_picker(entrants: Vec<String>, stage_sizes: Vec<u32>, picker: P) -> Self {
        let mut engine = BracketEngine {
            remaining: entrants.clone(),
            entrants,
            stage_sizes,
            survivors: Vec::new(),
            eliminated: Vec::new(),
            current: None,
            stage: 0,
            finished: false,
            picker,
        };
        engine.advance();
        engine
    }

    // ── Operations ─────────────────────────────────────────────────────

    /// Move the bracket forward until there is a pairing to decide or the
    /// bracket is finished.
    pub fn advance(&mut self) {
        loop {
            if self.finished {
                self.current = None;
                return;
            }

            if self.remaining.len() >= 2 {
                let (a, b) = self.picker.pick(self.remaining.len());
                debug_assert!(a != b, "picker returned the same index twice");
                self.current = Some(Pairing {
                    left: self.remaining[a].clone(),
                    right: self.remaining[b].clone(),
                });
                return;
            }

            if self.survivors.is_empty() {
                if let Some(champion) = self.remaining.pop() {
                    let rank = self.record_elimination(champion.clone());
                    info!("Bracket finished: {champion} is champion (rank {rank})");
                } else {
                    info!("Bracket finished with no entrants left");
                }
                self.current = None;
                self.finished = true;
                return;
            }

            // A lone leftover has no opponent this stage and drops out unplayed.
            if let Some(leftover) = self.remaining.pop() {
                let rank = self.record_elimination(leftover.clone());
                warn!("{leftover} had no opponent in stage {} and was eliminated (rank {rank})", self.stage + 1);
            }
            self.remaining = mem::take(&mut self.survivors);
            self.stage += 1;
            self.current = None;
            info!("Advanced to stage {} with {} entrants", self.stage + 1, self.remaining.len());
        }
    }

    /// Pick `selected` as the winner of the current pairing.
    ///
    /// An unknown selection, or one made when no pairing is open, is rejected
    /// and leaves the bracket untouched.
    pub fn choose(&mut self, selected: &str) -> Result<ChoiceOutcome, String> {
        let pairing = self
            .current
            .as_ref()
            .ok_or_else(|| "No pairing is open.".to_string())?;
        let loser = match pairing.opponent_of(selected) {
            Some(loser) => loser.to_string(),
            None => {
                debug!("Rejected choice {selected:?}: not in the current pairing");
                return Err(format!("{selected} is not part of the current pairing."));
            }
        };
        let winner = selected.to_string();

        let loser_rank = self.record_elimination(loser.clone());
        self.survivors.push(winner.clone());
        self.remaining.retain(|name| *name != winner && *name != loser);
        self.current = None;
        debug!("{winner} beat {loser}; {loser} eliminated at position {loser_rank}");

        self.advance();
        Ok(ChoiceOutcome { winner, loser, loser_rank })
    }

    /// Start over with the full entrant list in its original order.
    pub fn reset(&mut self) {
        self.remaining = self.entrants.clone();
        self.survivors.clear();
        self.eliminated.clear();
        self.current = None;
        self.stage = 0;
        self.finished = false;
        info!("Bracket reset with {} entrants", self.entrants.len());
        self.advance();
    }

    fn record_elimination(&mut self, name: String) -> u32 {
        self.eliminated.push(name);
        self.eliminated.len() as u32
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn entrants(&self) -> &[String] {
        &self.entrants
    }

    pub fn current_pair(&self) -> Option<&Pairing> {
        self.current.as_ref()
    }

    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn survivors(&self) -> &[String] {
        &self.survivors
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn eliminated_count(&self) -> usize {
        self.eliminated.len()
    }

    pub fn champion(&self) -> Option<&str> {
        if self.finished {
            self.eliminated.last().map(|name| name.as_str())
        } else {
            None
        }
    }

    pub fn elimination_rank(&self, name: &str) -> Option<u32> {
        self.eliminated
            .iter()
            .position(|eliminated| eliminated == name)
            .map(|idx| idx as u32 + 1)
    }

    /// `(name, rank)` in the order the eliminations happened.
    pub fn elimination_order(&self) -> Vec<(String, u32)> {
        self.eliminated
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx as u32 + 1))
            .collect()
    }

    /// Latest eliminations first, at most `limit` entries.
    pub fn ranking(&self, limit: usize) -> Vec<RankingEntry> {
        self.eliminated
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .enumerate()
            .map(|(place_idx, (idx, name))| RankingEntry {
                place: place_idx + 1,
                name: name.clone(),
                rank: idx as u32 + 1,
                podium: place_idx < PODIUM_PLACES,
            })
            .collect()
    }

    pub fn stage_size(&self) -> Option<u32> {
        self.stage_sizes.get(self.stage).copied()
    }

    pub fn stage_progress(&self) -> StageProgress {
        let number = self.stage + 1;
        let survivors = self.survivors.len();
        let stage_size = self.stage_size();
        let label = match stage_size {
            Some(size) => format!("Stage {number}: {survivors} / {size}"),
            None => format!("Stage {number}: {survivors}"),
        };
        StageProgress {
            number,
            survivors,
            stage_size,
            label,
        }
    }

    pub fn snapshot(&self, ranking_limit: usize) -> BracketSnapshot {
        BracketSnapshot {
            title: APP_TITLE.to_string(),
            stage: self.stage_progress(),
            current_pair: self
                .current
                .as_ref()
                .map(|pair| vec![pair.left.clone(), pair.right.clone()])
                .unwrap_or_default(),
            remaining_count: self.remaining.len(),
            survivor_count: self.survivors.len(),
            eliminated_count: self.eliminated.len(),
            finished: self.finished,
            champion: self.champion().map(|name| name.to_string()),
            ranking: if self.finished { self.ranking(ranking_limit) } else { Vec::new() },
        }
    }
}
