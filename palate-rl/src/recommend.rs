// ---------------------------------------------------------------------------
// Recommender — blended scoring + ε-greedy selection
// ---------------------------------------------------------------------------
//
// Scores each candidate from the three learned signals and ranks them:
//
// 1. Blend — 0.4·q + 0.4·preference + 0.2·damped popularity. Personalized
//    signals carry 80% of the weight; the cross-user popularity signal is
//    additionally damped by a factor of 10.
// 2. Exploitation — stable descending sort, so exact score ties keep the
//    candidate input order.
// 3. Exploration — with probability ε, and only when more than 3 candidates
//    exist, the top-3 head is followed by 2 uniform samples from the full
//    pool. The hybrid may repeat an item; it is not deduplicated.
//
// The RNG is injected so exploration is reproducible under a fixed seed.
// ---------------------------------------------------------------------------

use rand::seq::SliceRandom;
use rand::Rng;

use crate::score_store::ScoreStore;
use crate::types::{CandidateItem, ScoredItem};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const Q_WEIGHT: f64 = 0.4;
pub const PREFERENCE_WEIGHT: f64 = 0.4;
pub const POPULARITY_WEIGHT: f64 = 0.2;
/// Popularity is divided by 10 before entering the blend.
pub const POPULARITY_DAMPING: f64 = 0.1;

/// Maximum number of items returned.
pub const RESULT_CAP: usize = 5;
/// Size of the best-scoring head kept under exploration.
pub const EXPLOIT_HEAD: usize = 3;
/// Number of uniform samples appended under exploration.
pub const EXPLORE_SAMPLES: usize = 2;

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Combine the three signals into a single ranking score.
pub fn blend_score(q: f64, preference: f64, popularity: f64) -> f64 {
	q * Q_WEIGHT + preference * PREFERENCE_WEIGHT + popularity * POPULARITY_DAMPING * POPULARITY_WEIGHT
}

/// Annotate every candidate with its score breakdown for the given user.
/// Input order is preserved.
pub fn score_candidates(
	store: &ScoreStore,
	user_id: u64,
	candidates: Vec<CandidateItem>,
) -> Vec<ScoredItem> {
	candidates
		.into_iter()
		.map(|candidate| {
			let q = store.q(user_id, candidate.item_id);
			let preference = store.preference(user_id, candidate.item_id);
			let popularity = store.popularity(candidate.item_id);

			ScoredItem {
				item_id: candidate.item_id,
				name: candidate.name,
				extra: candidate.extra,
				rl_score: blend_score(q, preference, popularity),
				q_value: q,
				preference,
			}
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

fn sort_descending(items: &mut [ScoredItem]) {
	// Stable sort: exact ties keep input order.
	items.sort_by(|a, b| {
		b.rl_score
			.partial_cmp(&a.rl_score)
			.unwrap_or(std::cmp::Ordering::Equal)
	});
}

/// Rank scored candidates and cap the result, taking the ε-greedy
/// exploration branch when the dice roll and pool size allow it.
pub fn select_ranked<R: Rng>(
	scored: Vec<ScoredItem>,
	epsilon: f64,
	rng: &mut R,
) -> Vec<ScoredItem> {
	let explore = rng.gen::<f64>() < epsilon && scored.len() > EXPLOIT_HEAD;

	let mut result = if explore {
		let mut ranked = scored.clone();
		sort_descending(&mut ranked);
		ranked.truncate(EXPLOIT_HEAD);

		let samples = scored
			.choose_multiple(rng, EXPLORE_SAMPLES.min(scored.len()))
			.cloned();
		ranked.extend(samples);
		ranked
	} else {
		let mut ranked = scored;
		sort_descending(&mut ranked);
		ranked
	};

	result.truncate(RESULT_CAP);
	result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
