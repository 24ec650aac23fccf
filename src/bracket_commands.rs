use crate::bracket::BracketEngine;
use crate::images::{cached_image, pair_images, request_image};
use crate::types::*;
use tracing::info;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Lock the shared bracket and call `f` with it.
fn with_bracket<F, R>(bracket: &SharedBracket, f: F) -> Result<R, String>
where
    F: FnOnce(&mut BracketEngine) -> Result<R, String>,
{
    let mut guard = bracket.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

// ── Commands ────────────────────────────────────────────────────────────

pub fn bracket_state(bracket: &SharedBracket, ranking_limit: usize) -> Result<BracketSnapshot, String> {
    with_bracket(bracket, |engine| Ok(engine.snapshot(ranking_limit)))
}

/// Snapshot plus image status for the pair on screen, kicking off lookups
/// for names not seen before.
pub fn bracket_view(state: &ServerState) -> Result<BracketView, String> {
    let snapshot = bracket_state(&state.bracket, state.ranking_limit)?;
    let images = pair_images(&state.images, state.lookup.as_ref(), &snapshot.current_pair);
    Ok(BracketView { snapshot, images })
}

pub fn bracket_choose(
    bracket: &SharedBracket,
    selected: &str,
    ranking_limit: usize,
) -> Result<BracketSnapshot, String> {
    with_bracket(bracket, |engine| {
        let outcome = engine.choose(selected)?;
        info!(
            "{} advances over {} (eliminated at position {})",
            outcome.winner, outcome.loser, outcome.loser_rank
        );
        Ok(engine.snapshot(ranking_limit))
    })
}

/// Reset only goes through when the caller confirmed it.
pub fn bracket_reset(
    bracket: &SharedBracket,
    confirm: bool,
    ranking_limit: usize,
) -> Result<BracketSnapshot, String> {
    if !confirm {
        return Err("Reset requires confirmation.".to_string());
    }
    with_bracket(bracket, |engine| {
        engine.reset();
        Ok(engine.snapshot(ranking_limit))
    })
}

/// Image status for one entrant. Names outside the entrant list are rejected
/// before anything is cached or fetched.
pub fn bracket_image(state: &ServerState, name: &str) -> Result<PairImage, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Image lookup needs a name.".to_string());
    }
    let is_entrant = with_bracket(&state.bracket, |engine| {
        Ok(engine.entrants().iter().any(|entrant| entrant == name))
    })?;
    if !is_entrant {
        return Err(format!("{name} is not an entrant."));
    }
    let image = match state.lookup.as_ref() {
        Some(lookup) => request_image(&state.images, lookup, name),
        None => cached_image(&state.images, name).unwrap_or(ImageStatus::Missing),
    };
    Ok(PairImage { name: name.to_string(), image })
}

pub fn bracket_ranking(bracket: &SharedBracket, limit: usize) -> Result<Vec<RankingEntry>, String> {
    with_bracket(bracket, |engine| Ok(engine.ranking(limit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageLookup;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl ImageLookup for CountingLookup {
        fn lookup(&self, _name: &str) -> Result<Option<String>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn shared(names: &[&str]) -> SharedBracket {
        Arc::new(Mutex::new(BracketEngine::new(names.iter().map(|s| s.to_string()).collect())))
    }

    fn play_out(bracket: &SharedBracket) -> BracketSnapshot {
        let mut snapshot = bracket_state(bracket, RANKING_LIMIT).unwrap();
        while !snapshot.finished {
            let pick = snapshot.current_pair[0].clone();
            snapshot = bracket_choose(bracket, &pick, RANKING_LIMIT).unwrap();
        }
        snapshot
    }

    #[test]
    fn test_choose_outside_pair_is_rejected() {
        let bracket = shared(&["A", "B", "C", "D"]);
        let before = bracket_state(&bracket, RANKING_LIMIT).unwrap();
        assert!(bracket_choose(&bracket, "Z", RANKING_LIMIT).is_err());
        let after = bracket_state(&bracket, RANKING_LIMIT).unwrap();
        assert_eq!(before.current_pair, after.current_pair);
        assert_eq!(after.eliminated_count, 0);
        assert_eq!(after.remaining_count, 4);
    }

    #[test]
    fn test_play_to_finish_exposes_ranking() {
        let bracket = shared(&["A", "B", "C", "D", "E", "F", "G", "H"]);
        let finished = play_out(&bracket);
        assert!(finished.current_pair.is_empty());
        assert_eq!(finished.eliminated_count, 8);
        assert_eq!(finished.ranking.len(), 8);
        assert_eq!(finished.ranking[0].name, finished.champion.clone().unwrap());

        let top = bracket_ranking(&bracket, 3).unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].rank, 8);
    }

    #[test]
    fn test_reset_needs_confirmation() {
        let bracket = shared(&["A", "B"]);
        play_out(&bracket);

        assert!(bracket_reset(&bracket, false, RANKING_LIMIT).is_err());
        assert!(bracket_state(&bracket, RANKING_LIMIT).unwrap().finished);

        let fresh = bracket_reset(&bracket, true, RANKING_LIMIT).unwrap();
        assert!(!fresh.finished);
        assert_eq!(fresh.eliminated_count, 0);
        assert_eq!(fresh.remaining_count, 2);
        assert_eq!(fresh.stage.number, 1);
        assert_eq!(fresh.current_pair.len(), 2);
    }

    #[test]
    fn test_view_without_lookup_reports_missing_images() {
        let state = ServerState {
            bracket: shared(&["A", "B"]),
            images: Arc::new(Mutex::new(ImageCache::default())),
            lookup: None,
            ranking_limit: RANKING_LIMIT,
        };
        let view = bracket_view(&state).unwrap();
        assert_eq!(view.images.len(), 2);
        assert!(view.images.iter().all(|image| image.image == ImageStatus::Missing));

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["currentPair"].as_array().unwrap().len(), 2);
        assert_eq!(value["stage"]["label"], "Stage 1: 0 / 128");
    }

    #[test]
    fn test_image_for_unknown_name_starts_no_lookup() {
        let counter = Arc::new(CountingLookup { calls: AtomicUsize::new(0) });
        let lookup: Arc<dyn ImageLookup> = counter.clone();
        let state = ServerState {
            bracket: shared(&["Akira", "Pluto"]),
            images: Arc::new(Mutex::new(ImageCache::default())),
            lookup: Some(lookup),
            ranking_limit: RANKING_LIMIT,
        };

        for i in 0..50 {
            assert!(bracket_image(&state, &format!("not-an-entrant-{i}")).is_err());
        }
        assert!(bracket_image(&state, "  ").is_err());
        {
            let cache = state.images.lock().unwrap();
            assert_eq!(cache.lookups_started, 0);
            assert!(cache.entries.is_empty());
        }
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        let image = bracket_image(&state, " Akira ").unwrap();
        assert_eq!(image.name, "Akira");
        assert_eq!(state.images.lock().unwrap().lookups_started, 1);
    }
}
