// ABOUTME: Deterministic additive risk score over flags, check-in, and training context
// ABOUTME: green 0-1 points, amber 2-3, red 4 and up
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Risk scorer.
//!
//! Points accumulate from a fixed flag table, a poor-sleep/high-RPE
//! check-in combination, and a consecutive-hard-sessions training pattern.
//! Reasons record each contribution in order as `code (+points)`.

use crate::models::{CheckIn, Flag, FlagSet, RiskAssessment, RiskLevel, TrainingContext};

/// Points per flag. Flags outside this table carry no risk weight.
const FLAG_POINTS: [(Flag, i64); 5] = [
    (Flag::FatiguePossible, 1),
    (Flag::PainReported, 2),
    (Flag::LoadSpike, 3),
    (Flag::PainSevere, 4),
    (Flag::IllnessOrExtremeFatigue, 4),
];

/// Compute the risk assessment for one activity.
#[must_use]
pub fn compute(
    flags: &FlagSet,
    check_in: Option<&CheckIn>,
    training_context: &TrainingContext,
) -> RiskAssessment {
    let mut points: i64 = 0;
    let mut reasons: Vec<String> = Vec::new();

    for (flag, value) in FLAG_POINTS {
        if flags.contains(&flag) {
            points += value;
            reasons.push(format!("{} (+{value})", flag.as_str()));
        }
    }

    // Poor sleep combined with a very hard perceived effort
    if let Some(check_in) = check_in {
        if let (Some(sleep), Some(rpe)) = (check_in.sleep_quality, check_in.rpe) {
            if sleep <= 2 && rpe >= 8 {
                points += 2;
                reasons.push("poor_sleep_high_rpe (+2)".to_owned());
            }
        }
    }

    // Two or more hard sessions with the latest within three days
    if training_context.hard_sessions_this_week >= 2
        && training_context
            .days_since_last_hard
            .is_some_and(|d| d <= 3)
    {
        points += 1;
        reasons.push("consecutive_hard_sessions (+1)".to_owned());
    }

    let level = if points >= 4 {
        RiskLevel::Red
    } else if points >= 2 {
        RiskLevel::Amber
    } else {
        RiskLevel::Green
    };

    RiskAssessment {
        risk_level: level,
        risk_score: points,
        risk_reasons: reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn check_in(rpe: Option<i64>, sleep: Option<i64>) -> CheckIn {
        CheckIn {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            rpe,
            pain_score: None,
            pain_location: None,
            sleep_quality: sleep,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_signals_is_green_zero() {
        let result = compute(&FlagSet::new(), None, &TrainingContext::default());
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_level, RiskLevel::Green);
        assert!(result.risk_reasons.is_empty());
    }

    #[test]
    fn level_bands_are_exact() {
        // exactly 2 -> amber
        let flags: FlagSet = [Flag::PainReported].into_iter().collect();
        let result = compute(&flags, None, &TrainingContext::default());
        assert_eq!(result.risk_score, 2);
        assert_eq!(result.risk_level, RiskLevel::Amber);

        // exactly 4 -> red
        let flags: FlagSet = [Flag::PainSevere].into_iter().collect();
        let result = compute(&flags, None, &TrainingContext::default());
        assert_eq!(result.risk_score, 4);
        assert_eq!(result.risk_level, RiskLevel::Red);

        // 1 point stays green
        let flags: FlagSet = [Flag::FatiguePossible].into_iter().collect();
        let result = compute(&flags, None, &TrainingContext::default());
        assert_eq!(result.risk_level, RiskLevel::Green);
    }

    #[test]
    fn severe_pain_stacks_with_reported_pain() {
        let flags: FlagSet = [Flag::PainReported, Flag::PainSevere].into_iter().collect();
        let result = compute(&flags, None, &TrainingContext::default());
        assert_eq!(result.risk_score, 6);
        assert_eq!(result.risk_level, RiskLevel::Red);
        assert_eq!(
            result.risk_reasons,
            vec!["pain_reported (+2)", "pain_severe (+4)"]
        );
    }

    #[test]
    fn sleep_rpe_combination_adds_two() {
        let result = compute(
            &FlagSet::new(),
            Some(&check_in(Some(9), Some(1))),
            &TrainingContext::default(),
        );
        assert_eq!(result.risk_score, 2);
        assert_eq!(result.risk_level, RiskLevel::Amber);

        // either signal missing defuses the combination
        let result = compute(
            &FlagSet::new(),
            Some(&check_in(Some(9), None)),
            &TrainingContext::default(),
        );
        assert_eq!(result.risk_score, 0);
    }

    #[test]
    fn consecutive_hard_sessions_add_one() {
        let context = TrainingContext {
            hard_sessions_this_week: 2,
            days_since_last_hard: Some(2),
            ..TrainingContext::default()
        };
        let result = compute(&FlagSet::new(), None, &context);
        assert_eq!(result.risk_score, 1);
        assert_eq!(
            result.risk_reasons,
            vec!["consecutive_hard_sessions (+1)"]
        );

        // a single hard session is fine
        let context = TrainingContext {
            hard_sessions_this_week: 1,
            days_since_last_hard: Some(1),
            ..TrainingContext::default()
        };
        assert_eq!(compute(&FlagSet::new(), None, &context).risk_score, 0);
    }

    #[test]
    fn flags_without_points_carry_no_weight() {
        let flags: FlagSet = [Flag::DataLowConfidenceHr, Flag::IntensityMismatch]
            .into_iter()
            .collect();
        let result = compute(&flags, None, &TrainingContext::default());
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.risk_level, RiskLevel::Green);
    }
}
