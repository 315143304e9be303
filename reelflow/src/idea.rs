//! Idea candidate scoring and deterministic selection.
//!
//! Selection shuffles candidates with the run's seed before scoring, so the
//! outcome never depends on generation order; ties break by the post-shuffle
//! order, which the seed makes reproducible.

use crate::config::ChannelConfig;
use crate::errors::{ReelflowError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A raw generated concept. Ephemeral: candidates exist only during the
/// idea stage; the winner is promoted to a persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaCandidate {
    /// The concept text.
    pub text: String,
    /// Provenance: which generation call produced it.
    pub generation_index: u32,
}

/// A candidate with its computed score, for audit payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    /// The candidate.
    pub candidate: IdeaCandidate,
    /// Its score, or None if it was discarded by a hard constraint.
    pub score: Option<f64>,
}

/// Deterministically picks the strongest eligible candidate.
///
/// 1. Shuffle with `seed` to remove generation-order bias.
/// 2. Score each candidate against the channel config.
/// 3. Discard candidates that violate a hard safety or theme constraint;
///    if none survive, fail with `NoEligibleIdea`.
/// 4. Pick the highest score, first-in-shuffled-order on exact ties.
pub fn select(
    candidates: &[IdeaCandidate],
    config: &ChannelConfig,
    seed: u64,
) -> Result<(IdeaCandidate, Vec<ScoredCandidate>)> {
    if candidates.is_empty() {
        return Err(ReelflowError::NoEligibleIdea { considered: 0 });
    }

    let mut shuffled: Vec<IdeaCandidate> = candidates.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let mut scored = Vec::with_capacity(shuffled.len());
    let mut winner: Option<(usize, f64)> = None;

    for (position, candidate) in shuffled.iter().enumerate() {
        let score = score_candidate(candidate, config);
        if let Some(score) = score {
            // Strictly-greater keeps the first of an exact tie.
            let better = winner.map_or(true, |(_, best)| score > best);
            if better {
                winner = Some((position, score));
            }
        }
        scored.push(ScoredCandidate {
            candidate: candidate.clone(),
            score,
        });
    }

    match winner {
        Some((position, score)) => {
            let chosen = shuffled[position].clone();
            debug!(
                generation_index = chosen.generation_index,
                score, "selected idea candidate"
            );
            Ok((chosen, scored))
        }
        None => Err(ReelflowError::NoEligibleIdea {
            considered: candidates.len(),
        }),
    }
}

/// Scores one candidate, or returns None if a hard constraint disqualifies
/// it.
///
/// The formula is deliberately simple and fully deterministic:
/// `2.0 * allowed_theme_mentions + pacing_fit`, where pacing_fit is 1.0
/// inside the configured narration window and decays as
/// `1 / (1 + seconds_outside)` beyond it.
fn score_candidate(candidate: &IdeaCandidate, config: &ChannelConfig) -> Option<f64> {
    let text = normalize(&candidate.text);

    for theme in &config.disallowed_themes {
        if mentions(&text, theme) {
            return None;
        }
    }
    for term in &config.safety_rules.banned_terms {
        if mentions(&text, term) {
            return None;
        }
    }

    let theme_mentions = config
        .allowed_themes
        .iter()
        .filter(|theme| mentions(&text, theme))
        .count();

    let words = text.split_whitespace().count();
    #[allow(clippy::cast_precision_loss)]
    let estimated_secs = words as f64 / config.pacing.words_per_second;
    let pacing = &config.pacing;
    let pacing_fit = if estimated_secs < pacing.min_narration_secs {
        1.0 / (1.0 + (pacing.min_narration_secs - estimated_secs))
    } else if estimated_secs > pacing.max_narration_secs {
        1.0 / (1.0 + (estimated_secs - pacing.max_narration_secs))
    } else {
        1.0
    };

    #[allow(clippy::cast_precision_loss)]
    Some(2.0 * theme_mentions as f64 + pacing_fit)
}

/// Normalizes text before term matching: lowercase, straight quotes.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
}

/// True if the normalized text mentions the term, matching both the raw
/// form and underscores-as-spaces (config themes are snake_case, candidate
/// text is prose).
fn mentions(text_norm: &str, term: &str) -> bool {
    let term_norm = normalize(term);
    if text_norm.contains(&term_norm) {
        return true;
    }
    let spaced = term_norm.replace('_', " ");
    spaced != term_norm && text_norm.contains(&spaced)
}
