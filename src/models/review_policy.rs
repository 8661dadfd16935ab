//! Leveled review policy.
//!
//! Converts (progress, rating, learner settings, max level, now) into updated
//! progress and the time the card is due again:
//! - Again resets the streak, any other rating extends it by one
//! - A successful rating at the frontier (`active_level == current_level`)
//!   unlocks the next level, up to the card's `max_level`
//! - The interval is `base * rating * (1 + level * level_factor) * (1 + streak * streak_factor)`,
//!   shortened further by `again_penalty` on again
//!
//! Streak and level multipliers use the values after this review has been applied.

use super::error::{ReviewError, ReviewResult};
use super::{LearnerSettings, ProgressState, Rating};
use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Result of applying one rating to a card's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub state: ProgressState,
    pub next_review: DateTime<Utc>,
    pub interval: Duration,
    pub rating: Rating,
    /// `true` when this review unlocked a new level.
    pub promoted: bool,
}

impl ReviewOutcome {
    pub fn interval_minutes(&self) -> f64 {
        self.interval.num_milliseconds() as f64 / MILLIS_PER_MINUTE
    }
}

/// Applies one review. Pure: the input state is left untouched.
pub fn apply_review(
    state: &ProgressState,
    rating: Rating,
    settings: &LearnerSettings,
    max_level: i32,
    now: DateTime<Utc>,
) -> ReviewResult<ReviewOutcome> {
    settings.validate()?;
    state.validate(max_level)?;

    let mut next = state.clone();

    if rating.is_success() {
        next.streak = next
            .streak
            .checked_add(1)
            .ok_or(ReviewError::InvariantViolation("streak out of range"))?;
    } else {
        next.streak = 0;
    }

    let mut promoted = false;
    if rating.is_success() && next.is_at_frontier() && next.current_level < max_level {
        next.current_level += 1;
        next.active_level = next.current_level;
        promoted = true;
    }

    let interval = interval_for(rating, next.active_level, next.streak, settings)?;
    let next_review = now
        .checked_add_signed(interval)
        .ok_or(ReviewError::InvariantViolation("next_review out of range"))?;

    next.validate(max_level)?;

    next.last_reviewed = Some(now);
    next.next_review = next_review;

    Ok(ReviewOutcome {
        state: next,
        next_review,
        interval,
        rating,
        promoted,
    })
}

/// Interval for the given post-review level and streak.
pub fn interval_for(
    rating: Rating,
    active_level: i32,
    streak: i32,
    settings: &LearnerSettings,
) -> ReviewResult<Duration> {
    let level_multiplier = 1.0 + f64::from(active_level) * settings.level_factor;
    let streak_multiplier = 1.0 + f64::from(streak) * settings.streak_factor;
    let penalty = if rating.is_success() {
        1.0
    } else {
        settings.again_penalty
    };

    let minutes = settings.base_interval_minutes
        * rating.multiplier()
        * level_multiplier
        * streak_multiplier
        * penalty;

    let millis = (minutes * MILLIS_PER_MINUTE).round();
    if !millis.is_finite() || millis < 0.0 || millis > i64::MAX as f64 {
        return Err(ReviewError::InvariantViolation("interval out of range"));
    }
    Duration::try_milliseconds(millis as i64)
        .ok_or(ReviewError::InvariantViolation("interval out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
    }

    fn state(current_level: i32, active_level: i32, streak: i32) -> ProgressState {
        ProgressState {
            current_level,
            active_level,
            streak,
            last_reviewed: None,
            next_review: now(),
        }
    }

    fn small_settings() -> LearnerSettings {
        LearnerSettings {
            base_interval_minutes: 1.0,
            level_factor: 0.1,
            streak_factor: 0.1,
            again_penalty: 0.5,
        }
    }

    #[test]
    fn test_again_from_fresh_state() {
        let outcome =
            apply_review(&state(0, 0, 0), Rating::Again, &small_settings(), 5, now()).unwrap();

        // 1 * 0.1 * 1 * 1 * 0.5 minutes
        assert_eq!(outcome.next_review, now() + Duration::seconds(3));
        assert_eq!(outcome.state.streak, 0);
        assert_eq!(outcome.state.current_level, 0);
        assert_eq!(outcome.state.last_reviewed, Some(now()));
        assert_eq!(outcome.state.next_review, outcome.next_review);
        assert!(!outcome.promoted);
    }

    #[test]
    fn test_easy_from_fresh_state_uses_post_review_values() {
        let outcome =
            apply_review(&state(0, 0, 0), Rating::Easy, &small_settings(), 5, now()).unwrap();

        assert_eq!(outcome.state.current_level, 1);
        assert_eq!(outcome.state.active_level, 1);
        assert_eq!(outcome.state.streak, 1);
        assert!(outcome.promoted);
        // 1 * 1.8 * (1 + 1 * 0.1) * (1 + 1 * 0.1) minutes = 130.68 s
        assert_eq!(outcome.interval, Duration::milliseconds(130_680));
    }

    #[test]
    fn test_easy_at_zero_max_level_only_grows_streak() {
        let outcome =
            apply_review(&state(0, 0, 0), Rating::Easy, &small_settings(), 0, now()).unwrap();

        assert_eq!(outcome.state.current_level, 0);
        assert_eq!(outcome.state.streak, 1);
        // 1 * 1.8 * 1 * 1.1 minutes = 118.8 s
        assert_eq!(outcome.interval, Duration::milliseconds(118_800));
    }

    #[test]
    fn test_five_goods_reach_max_level() {
        let settings = LearnerSettings::default();
        let mut progress = state(0, 0, 0);
        for _ in 0..5 {
            progress = apply_review(&progress, Rating::Good, &settings, 5, now())
                .unwrap()
                .state;
        }
        assert_eq!(progress.current_level, 5);
        assert_eq!(progress.active_level, 5);
        assert_eq!(progress.streak, 5);

        let capped = apply_review(&progress, Rating::Good, &settings, 5, now()).unwrap();
        assert_eq!(capped.state.current_level, 5);
        assert_eq!(capped.state.streak, 6);
        assert!(!capped.promoted);
    }

    #[test]
    fn test_ceiling_still_grows_interval() {
        let settings = LearnerSettings::default();
        let first = apply_review(&state(3, 3, 2), Rating::Good, &settings, 3, now()).unwrap();
        let second = apply_review(&first.state, Rating::Good, &settings, 3, now()).unwrap();
        assert!(second.interval > first.interval);
    }

    #[test]
    fn test_again_keeps_levels_and_resets_streak() {
        let settings = LearnerSettings::default();
        let outcome = apply_review(&state(2, 2, 5), Rating::Again, &settings, 5, now()).unwrap();
        assert_eq!(outcome.state.streak, 0);
        assert_eq!(outcome.state.current_level, 2);
        assert_eq!(outcome.state.active_level, 2);
    }

    #[test]
    fn test_reviewing_lower_level_never_promotes() {
        let settings = LearnerSettings::default();
        let outcome = apply_review(&state(3, 1, 0), Rating::Easy, &settings, 5, now()).unwrap();
        assert_eq!(outcome.state.current_level, 3);
        assert_eq!(outcome.state.active_level, 1);
        assert_eq!(outcome.state.streak, 1);
    }

    #[test]
    fn test_input_state_is_not_mutated() {
        let original = state(1, 1, 1);
        let copy = original.clone();
        let _ = apply_review(&original, Rating::Good, &LearnerSettings::default(), 5, now());
        assert_eq!(original, copy);
    }

    #[test]
    fn test_corrupted_state_is_rejected() {
        let settings = LearnerSettings::default();
        let err = apply_review(&state(1, 2, 0), Rating::Good, &settings, 5, now()).unwrap_err();
        assert_eq!(
            err,
            ReviewError::InvariantViolation("active_level cannot exceed current_level")
        );

        // current_level above the card's ceiling, e.g. after levels were removed
        assert!(apply_review(&state(4, 4, 0), Rating::Good, &settings, 2, now()).is_err());
    }

    #[test]
    fn test_streak_at_type_limit_is_reported() {
        let settings = LearnerSettings::default();
        let progress = state(0, 0, i32::MAX);
        assert!(progress.validate(0).is_ok());

        let err = apply_review(&progress, Rating::Good, &settings, 0, now()).unwrap_err();
        assert_eq!(err, ReviewError::InvariantViolation("streak out of range"));

        // again resets instead of incrementing
        let reset = apply_review(&progress, Rating::Again, &settings, 0, now()).unwrap();
        assert_eq!(reset.state.streak, 0);
    }

    #[test]
    fn test_misconfigured_settings_are_rejected() {
        let settings = LearnerSettings {
            streak_factor: -5.0,
            ..LearnerSettings::default()
        };
        let err = apply_review(&state(0, 0, 3), Rating::Good, &settings, 5, now()).unwrap_err();
        assert!(matches!(err, ReviewError::InvariantViolation(_)));
    }

    #[test]
    fn test_interval_minutes_matches_duration() {
        let outcome = apply_review(
            &state(0, 0, 0),
            Rating::Good,
            &LearnerSettings {
                level_factor: 0.0,
                streak_factor: 0.0,
                ..LearnerSettings::default()
            },
            0,
            now(),
        )
        .unwrap();
        assert_eq!(outcome.interval_minutes(), 1440.0);
        assert_eq!(outcome.next_review, now() + Duration::days(1));
    }

    fn arb_rating() -> impl Strategy<Value = Rating> {
        prop_oneof![
            Just(Rating::Again),
            Just(Rating::Hard),
            Just(Rating::Good),
            Just(Rating::Easy),
        ]
    }

    fn arb_success() -> impl Strategy<Value = Rating> {
        prop_oneof![Just(Rating::Hard), Just(Rating::Good), Just(Rating::Easy)]
    }

    fn arb_settings() -> impl Strategy<Value = LearnerSettings> {
        (1.0f64..10_000.0, 0.0f64..3.0, 0.0f64..3.0, 0.1f64..=1.0).prop_map(
            |(base_interval_minutes, level_factor, streak_factor, again_penalty)| {
                LearnerSettings {
                    base_interval_minutes,
                    level_factor,
                    streak_factor,
                    again_penalty,
                }
            },
        )
    }

    /// Any valid state together with its max level.
    fn arb_valid_state() -> impl Strategy<Value = (ProgressState, i32)> {
        (0i32..20, 0i32..100).prop_flat_map(|(max_level, streak)| {
            (0..=max_level).prop_flat_map(move |current| {
                (0..=current).prop_map(move |active| (state(current, active, streak), max_level))
            })
        })
    }

    /// Valid state shown at its frontier, with room left to promote.
    fn arb_frontier_state() -> impl Strategy<Value = (ProgressState, i32)> {
        (1i32..20, 0i32..100).prop_flat_map(|(max_level, streak)| {
            (0..max_level).prop_map(move |current| (state(current, current, streak), max_level))
        })
    }

    /// Valid state browsing a level below its frontier.
    fn arb_lower_level_state() -> impl Strategy<Value = (ProgressState, i32)> {
        (1i32..20, 0i32..100).prop_flat_map(|(current, streak)| {
            (0..current, current..20)
                .prop_map(move |(active, max_level)| (state(current, active, streak), max_level))
        })
    }

    proptest! {
        #[test]
        fn prop_again_resets_streak_and_shortens(
            (progress, max_level) in arb_valid_state(),
            settings in arb_settings(),
        ) {
            // keep the level multiplier small enough that 0.1 * penalty * level stays below 1
            let progress = ProgressState {
                current_level: progress.current_level.min(5),
                active_level: progress.active_level.min(5),
                ..progress
            };
            let settings = LearnerSettings { level_factor: settings.level_factor.min(1.0), ..settings };
            let outcome = apply_review(&progress, Rating::Again, &settings, max_level, now()).unwrap();

            prop_assert_eq!(outcome.state.streak, 0);
            prop_assert_eq!(outcome.state.current_level, progress.current_level);
            prop_assert_eq!(outcome.state.active_level, progress.active_level);
            let base = Duration::milliseconds((settings.base_interval_minutes * MILLIS_PER_MINUTE) as i64);
            prop_assert!(outcome.next_review < now() + base);
        }

        #[test]
        fn prop_success_at_frontier_promotes(
            (progress, max_level) in arb_frontier_state(),
            rating in arb_success(),
            settings in arb_settings(),
        ) {
            let outcome = apply_review(&progress, rating, &settings, max_level, now()).unwrap();

            prop_assert_eq!(outcome.state.current_level, progress.current_level + 1);
            prop_assert_eq!(outcome.state.active_level, outcome.state.current_level);
            prop_assert_eq!(outcome.state.streak, progress.streak + 1);
        }

        #[test]
        fn prop_success_below_frontier_keeps_levels(
            (progress, max_level) in arb_lower_level_state(),
            rating in arb_success(),
            settings in arb_settings(),
        ) {
            let outcome = apply_review(&progress, rating, &settings, max_level, now()).unwrap();

            prop_assert_eq!(outcome.state.current_level, progress.current_level);
            prop_assert_eq!(outcome.state.active_level, progress.active_level);
        }

        #[test]
        fn prop_stronger_rating_means_later_review(
            (progress, max_level) in arb_valid_state(),
            settings in arb_settings(),
        ) {
            let due: Vec<_> = [Rating::Hard, Rating::Good, Rating::Easy]
                .into_iter()
                .map(|rating| apply_review(&progress, rating, &settings, max_level, now()).unwrap().next_review)
                .collect();
            let again = apply_review(&progress, Rating::Again, &settings, max_level, now()).unwrap();

            prop_assert!(again.next_review < due[0]);
            prop_assert!(due[0] < due[1]);
            prop_assert!(due[1] < due[2]);
        }

        #[test]
        fn prop_higher_active_level_means_later_review(
            rating in arb_rating(),
            level in 0i32..30,
            streak in 0i32..50,
            settings in arb_settings(),
        ) {
            prop_assume!(settings.level_factor > 0.01);
            let lower = interval_for(rating, level, streak, &settings).unwrap();
            let higher = interval_for(rating, level + 1, streak, &settings).unwrap();
            prop_assert!(lower < higher);
        }

        #[test]
        fn prop_longer_streak_means_later_review(
            rating in arb_success(),
            level in 0i32..30,
            streak in 0i32..50,
            settings in arb_settings(),
        ) {
            prop_assume!(settings.streak_factor > 0.01);
            let shorter = interval_for(rating, level, streak, &settings).unwrap();
            let longer = interval_for(rating, level, streak + 1, &settings).unwrap();
            prop_assert!(shorter < longer);
        }

        #[test]
        fn prop_invariants_hold_over_rating_sequences(
            ratings in proptest::collection::vec(arb_rating(), 1..60),
            max_level in 0i32..8,
            settings in arb_settings(),
        ) {
            let mut progress = ProgressState::new(now());
            let mut clock = now();
            for rating in ratings {
                let outcome = apply_review(&progress, rating, &settings, max_level, clock).unwrap();
                prop_assert!(outcome.state.validate(max_level).is_ok());
                prop_assert!(outcome.next_review >= clock);
                clock = outcome.next_review;
                progress = outcome.state;
            }
        }
    }
}
