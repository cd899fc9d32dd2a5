//! Quality selection and the encode decision policy.
//!
//! Everything here works on byte counts and quality values only, so the
//! whole policy is testable without images or an encoder:
//!
//! - [`select_initial_quality`] applies the face boost.
//! - [`decide`] judges one candidate against the original size.
//! - [`QualitySearch`] is a bounded linear walk down the quality scale.
//! - [`encode_with_safety_valve`] and [`search_legacy`] drive an encoder
//!   closure through those policies.

use crate::config::{LegacyConfig, QualityConfig, ThresholdsConfig};
use crate::imaging::Quality;
use crate::types::EncodedCandidate;
use tracing::debug;

/// Initial encode quality for a profile's `base` quality.
///
/// With at least one face, the quality is raised by `face_boost`, capped at
/// `face_ceiling`. A base already above the ceiling is kept as is.
pub fn select_initial_quality(base: f32, faces: usize, config: &QualityConfig) -> Quality {
    if faces == 0 || base >= config.face_ceiling {
        return Quality::new(base);
    }
    Quality::new((base + config.face_boost).min(config.face_ceiling))
}

/// Position in the encode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    /// First candidate at the selected quality.
    Initial,
    /// The one high-quality retry after an over-reduction.
    Escalated,
    Done,
}

/// Verdict on one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the candidate.
    Accept,
    /// The candidate shrank suspiciously far; re-encode at escalation quality.
    Escalate,
    /// Not worth it; return the original bytes.
    Fallback,
}

impl EncodeState {
    /// State reached after `decision` is taken in `self`.
    pub fn after(self, decision: Decision) -> EncodeState {
        match (self, decision) {
            (EncodeState::Initial, Decision::Escalate) => EncodeState::Escalated,
            _ => EncodeState::Done,
        }
    }
}

/// Judge a candidate of `candidate_size` bytes against `original_size`.
///
/// - `candidate >= original × already_optimized_ratio` → [`Decision::Fallback`]
/// - reduction above `over_reduction_ratio`, only from `Initial` → [`Decision::Escalate`]
/// - otherwise → [`Decision::Accept`]
pub fn decide(
    candidate_size: usize,
    original_size: usize,
    state: EncodeState,
    thresholds: &ThresholdsConfig,
) -> Decision {
    let original = original_size as f64;
    let candidate = candidate_size as f64;

    if original_size == 0 || candidate >= original * thresholds.already_optimized_ratio {
        return Decision::Fallback;
    }

    let reduction = (original - candidate) / original;
    if state == EncodeState::Initial && reduction > thresholds.over_reduction_ratio {
        Decision::Escalate
    } else {
        Decision::Accept
    }
}

/// Bounded linear search down the quality scale.
///
/// Attempts `start`, `start - step`, `start - 2·step`, ... while the quality
/// stays at or above `floor`, for at most `max_attempts` encodes. The first
/// attempt always runs, even when `start` is below the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySearch {
    pub start: f32,
    pub step: f32,
    pub floor: f32,
    pub max_attempts: u32,
}

/// What a [`QualitySearch`] run settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The accepted candidate, or the smallest one seen when none was.
    pub candidate: EncodedCandidate,
    pub accepted: bool,
    pub attempts: u32,
}

impl QualitySearch {
    /// A one-shot search at a fixed quality.
    pub fn single(quality: f32) -> Self {
        Self {
            start: quality,
            step: 0.0,
            floor: quality,
            max_attempts: 1,
        }
    }

    /// The quality values this search will try, in order.
    pub fn qualities(&self) -> Vec<Quality> {
        let mut qualities = vec![Quality::new(self.start)];
        for i in 1..self.max_attempts {
            // Rounded to 1/1000 so repeated subtraction does not drift below the floor
            let q = ((self.start - self.step * i as f32) * 1000.0).round() / 1000.0;
            if self.step <= 0.0 || q < self.floor {
                break;
            }
            qualities.push(Quality::new(q));
        }
        qualities
    }

    /// Encode at each quality until `accept` passes or the search is spent.
    ///
    /// Encoder errors abort the search immediately.
    pub fn run<E, Enc, Acc>(&self, mut encode: Enc, accept: Acc) -> Result<SearchResult, E>
    where
        Enc: FnMut(Quality) -> Result<EncodedCandidate, E>,
        Acc: Fn(&EncodedCandidate) -> bool,
    {
        let mut qualities = self.qualities().into_iter();
        let first = qualities.next().unwrap_or_else(|| Quality::new(self.start));

        let mut best = encode(first)?;
        let mut attempts = 1;
        debug!(quality = first.value(), size = best.size(), "search attempt");
        if accept(&best) {
            return Ok(SearchResult {
                candidate: best,
                accepted: true,
                attempts,
            });
        }

        for quality in qualities {
            let candidate = encode(quality)?;
            attempts += 1;
            debug!(quality = quality.value(), size = candidate.size(), "search attempt");
            if accept(&candidate) {
                return Ok(SearchResult {
                    candidate,
                    accepted: true,
                    attempts,
                });
            }
            if candidate.size() < best.size() {
                best = candidate;
            }
        }

        Ok(SearchResult {
            candidate: best,
            accepted: false,
            attempts,
        })
    }
}

impl From<&LegacyConfig> for QualitySearch {
    fn from(config: &LegacyConfig) -> Self {
        Self {
            start: config.start_quality,
            step: config.step,
            floor: config.floor,
            max_attempts: config.max_attempts,
        }
    }
}

/// Result of the standard encode path.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Reencoded(EncodedCandidate),
    /// Re-encoding did not pay off; the original bytes should be returned.
    KeepOriginal,
}

/// Standard path: encode at `initial`, then apply the already-optimized
/// check and the single over-reduction escalation.
pub fn encode_with_safety_valve<E, Enc>(
    initial: Quality,
    original_size: usize,
    thresholds: &ThresholdsConfig,
    mut encode: Enc,
) -> Result<Verdict, E>
where
    Enc: FnMut(Quality) -> Result<EncodedCandidate, E>,
{
    let first = encode(initial)?;
    let decision = decide(first.size(), original_size, EncodeState::Initial, thresholds);
    let state = EncodeState::Initial.after(decision);
    debug!(
        quality = initial.value(),
        size = first.size(),
        original_size,
        ?decision,
        "initial candidate"
    );

    match decision {
        Decision::Accept => Ok(Verdict::Reencoded(first)),
        Decision::Fallback => Ok(Verdict::KeepOriginal),
        Decision::Escalate => {
            let escalation = QualitySearch::single(thresholds.escalation_quality);
            let result = escalation.run(encode, |candidate| {
                decide(candidate.size(), original_size, state, thresholds) == Decision::Accept
            })?;
            debug!(
                size = result.candidate.size(),
                accepted = result.accepted,
                "escalated candidate"
            );
            Ok(if result.accepted {
                Verdict::Reencoded(result.candidate)
            } else {
                Verdict::KeepOriginal
            })
        }
    }
}

/// Legacy path: walk qualities down until a candidate beats the size of the
/// original legacy file. The smallest candidate wins when none does.
pub fn search_legacy<E, Enc>(
    config: &LegacyConfig,
    original_size: usize,
    encode: Enc,
) -> Result<SearchResult, E>
where
    Enc: FnMut(Quality) -> Result<EncodedCandidate, E>,
{
    QualitySearch::from(config).run(encode, |candidate| candidate.size() < original_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const MB: usize = 1024 * 1024;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    /// Encoder closure producing candidates whose sizes are scripted by quality.
    fn scripted(sizes: Vec<usize>) -> impl FnMut(Quality) -> Result<EncodedCandidate, Infallible> {
        let mut sizes = sizes.into_iter();
        move |quality| {
            Ok(EncodedCandidate {
                bytes: vec![0; sizes.next().expect("script exhausted")],
                quality: quality.value(),
            })
        }
    }

    // =========================================================================
    // select_initial_quality
    // =========================================================================

    #[test]
    fn no_faces_uses_base() {
        let q = select_initial_quality(0.85, 0, &QualityConfig::default());
        assert!(close(q.value(), 0.85));
    }

    #[test]
    fn faces_boost_quality() {
        let q = select_initial_quality(0.85, 1, &QualityConfig::default());
        assert!(close(q.value(), 0.90));
    }

    #[test]
    fn boost_is_capped_at_ceiling() {
        let q = select_initial_quality(0.92, 3, &QualityConfig::default());
        assert!(close(q.value(), 0.95));
    }

    #[test]
    fn base_above_ceiling_is_not_lowered() {
        let q = select_initial_quality(0.97, 1, &QualityConfig::default());
        assert!(close(q.value(), 0.97));
    }

    #[test]
    fn face_quality_bounds_hold_for_all_bases() {
        let config = QualityConfig::default();
        for base in [0.1, 0.5, 0.8, 0.88, 0.9, 0.92, 0.95] {
            let without = select_initial_quality(base, 0, &config).value();
            let with = select_initial_quality(base, 2, &config).value();
            assert!(with >= without, "base {base}");
            assert!(with <= config.face_ceiling.max(base), "base {base}");
        }
    }

    // =========================================================================
    // decide
    // =========================================================================

    #[test]
    fn modest_reduction_is_accepted() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(600, 1000, EncodeState::Initial, &t), Decision::Accept);
    }

    #[test]
    fn near_original_size_falls_back() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(950, 1000, EncodeState::Initial, &t), Decision::Fallback);
        assert_eq!(decide(1200, 1000, EncodeState::Initial, &t), Decision::Fallback);
        assert_eq!(decide(949, 1000, EncodeState::Initial, &t), Decision::Accept);
    }

    #[test]
    fn over_reduction_escalates_only_once() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(200, 1000, EncodeState::Initial, &t), Decision::Escalate);
        assert_eq!(decide(200, 1000, EncodeState::Escalated, &t), Decision::Accept);
        assert_eq!(decide(200, 1000, EncodeState::Done, &t), Decision::Accept);
    }

    #[test]
    fn exactly_seventy_percent_reduction_is_accepted() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(300, 1000, EncodeState::Initial, &t), Decision::Accept);
        assert_eq!(decide(299, 1000, EncodeState::Initial, &t), Decision::Escalate);
    }

    #[test]
    fn escalated_candidate_still_checked_for_savings() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(980, 1000, EncodeState::Escalated, &t), Decision::Fallback);
    }

    #[test]
    fn empty_original_falls_back() {
        let t = ThresholdsConfig::default();
        assert_eq!(decide(0, 0, EncodeState::Initial, &t), Decision::Fallback);
    }

    #[test]
    fn state_transitions() {
        assert_eq!(
            EncodeState::Initial.after(Decision::Escalate),
            EncodeState::Escalated
        );
        assert_eq!(EncodeState::Initial.after(Decision::Accept), EncodeState::Done);
        assert_eq!(
            EncodeState::Escalated.after(Decision::Fallback),
            EncodeState::Done
        );
    }

    // =========================================================================
    // QualitySearch
    // =========================================================================

    #[test]
    fn legacy_search_qualities() {
        let search = QualitySearch::from(&LegacyConfig::default());
        let values: Vec<f32> = search.qualities().iter().map(|q| q.value()).collect();
        let expected = [0.88, 0.84, 0.80, 0.76, 0.72];
        assert_eq!(values.len(), expected.len());
        for (got, want) in values.iter().zip(expected) {
            assert!(close(*got, want), "{got} vs {want}");
        }
    }

    #[test]
    fn floor_cuts_search_short() {
        let search = QualitySearch {
            start: 0.80,
            step: 0.05,
            floor: 0.70,
            max_attempts: 10,
        };
        let values: Vec<f32> = search.qualities().iter().map(|q| q.value()).collect();
        assert_eq!(values.len(), 3);
        assert!(close(values[2], 0.70));
    }

    #[test]
    fn single_search_has_one_quality() {
        let qualities = QualitySearch::single(0.98).qualities();
        assert_eq!(qualities.len(), 1);
        assert!(close(qualities[0].value(), 0.98));
    }

    #[test]
    fn search_stops_at_first_accept() {
        let search = QualitySearch::from(&LegacyConfig::default());
        let result = search
            .run(scripted(vec![900, 700, 500]), |c| c.size() < 800)
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.candidate.size(), 700);
        assert!(close(result.candidate.quality, 0.84));
    }

    #[test]
    fn exhausted_search_returns_smallest() {
        let search = QualitySearch::from(&LegacyConfig::default());
        let result = search
            .run(scripted(vec![900, 850, 870, 860, 880]), |c| c.size() < 100)
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.attempts, 5);
        assert_eq!(result.candidate.size(), 850);
    }

    #[test]
    fn encoder_error_aborts_search() {
        let search = QualitySearch::from(&LegacyConfig::default());
        let mut calls = 0;
        let result: Result<SearchResult, &str> = search.run(
            |_| {
                calls += 1;
                Err("encoder broke")
            },
            |_| true,
        );
        assert_eq!(result.unwrap_err(), "encoder broke");
        assert_eq!(calls, 1);
    }

    // =========================================================================
    // Encode paths
    // =========================================================================

    #[test]
    fn standard_path_accepts_first_good_candidate() {
        let t = ThresholdsConfig::default();
        let verdict =
            encode_with_safety_valve(Quality::new(0.85), 10 * MB, &t, scripted(vec![4 * MB]))
                .unwrap();
        match verdict {
            Verdict::Reencoded(c) => {
                assert_eq!(c.size(), 4 * MB);
                assert!(close(c.quality, 0.85));
            }
            other => panic!("expected re-encode, got {other:?}"),
        }
    }

    #[test]
    fn standard_path_keeps_original_when_no_gain() {
        let t = ThresholdsConfig::default();
        let verdict =
            encode_with_safety_valve(Quality::new(0.85), 50_000, &t, scripted(vec![49_000]))
                .unwrap();
        assert_eq!(verdict, Verdict::KeepOriginal);
    }

    #[test]
    fn over_reduction_reencodes_at_escalation_quality() {
        let t = ThresholdsConfig::default();
        let verdict = encode_with_safety_valve(
            Quality::new(0.85),
            10 * MB,
            &t,
            scripted(vec![2 * MB, 5 * MB]),
        )
        .unwrap();
        match verdict {
            Verdict::Reencoded(c) => {
                assert_eq!(c.size(), 5 * MB);
                assert!(close(c.quality, 0.98));
            }
            other => panic!("expected escalated re-encode, got {other:?}"),
        }
    }

    #[test]
    fn escalated_candidate_too_large_keeps_original() {
        let t = ThresholdsConfig::default();
        let verdict = encode_with_safety_valve(
            Quality::new(0.85),
            1000,
            &t,
            scripted(vec![100, 990]),
        )
        .unwrap();
        assert_eq!(verdict, Verdict::KeepOriginal);
    }

    #[test]
    fn escalation_happens_at_most_once() {
        let t = ThresholdsConfig::default();
        let verdict = encode_with_safety_valve(
            Quality::new(0.85),
            1000,
            &t,
            scripted(vec![100, 150]),
        )
        .unwrap();
        assert!(matches!(verdict, Verdict::Reencoded(ref c) if c.size() == 150));
    }

    #[test]
    fn legacy_walks_down_until_smaller_than_original() {
        let sizes = vec![9 * MB, 8 * MB + 1, 7 * MB];
        let result = search_legacy(&LegacyConfig::default(), 8 * MB, scripted(sizes)).unwrap();
        assert!(result.accepted);
        assert_eq!(result.attempts, 3);
        assert!(close(result.candidate.quality, 0.80));
    }
}
