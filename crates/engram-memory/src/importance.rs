//! Importance scoring.
//!
//! The score of a chamber is a pure function of its records' metadata: no
//! decryption is needed because every record carries its plaintext length.
//!
//! ```text
//! score = min(message_count / 50, 0.3)
//!       + min(total_content_length / 5000, 0.3)
//!       + clamp(1 - age_of_newest / 30 days, 0, 1) * 0.2
//!       + min(user_authored_count / 20, 0.2)
//! ```
//!
//! clamped to `[0, 1]`.

use chrono::{DateTime, Utc};
use engram_types::MemoryRecord;

const RECENCY_WINDOW_SECS: f64 = 30.0 * 24.0 * 60.0 * 60.0;

/// Aggregate inputs of the importance formula.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImportanceInputs {
    pub message_count: usize,
    pub total_content_length: usize,
    pub most_recent: Option<DateTime<Utc>>,
    pub user_authored_count: usize,
}

impl ImportanceInputs {
    pub fn from_records(records: &[MemoryRecord]) -> Self {
        Self {
            message_count: records.len(),
            total_content_length: records.iter().map(|r| r.content_length).sum(),
            most_recent: records.iter().map(|r| r.created_at).max(),
            user_authored_count: records.iter().filter(|r| r.is_user).count(),
        }
    }
}

/// Score `inputs` as of `now`. An empty group scores `0.0`.
pub fn importance_score(inputs: &ImportanceInputs, now: DateTime<Utc>) -> f64 {
    let volume = (inputs.message_count as f64 / 50.0).clamp(0.0, 0.3);
    let length = (inputs.total_content_length as f64 / 5000.0).clamp(0.0, 0.3);
    let recency = match inputs.most_recent {
        Some(at) => {
            let age = (now - at).num_milliseconds() as f64 / 1000.0;
            (1.0 - age / RECENCY_WINDOW_SECS).clamp(0.0, 1.0) * 0.2
        }
        None => 0.0,
    };
    let authorship = (inputs.user_authored_count as f64 / 20.0).clamp(0.0, 0.2);
    (volume + length + recency + authorship).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_group_scores_zero() {
        assert_eq!(importance_score(&ImportanceInputs::default(), Utc::now()), 0.0);
    }

    #[test]
    fn saturated_group_scores_one() {
        let now = Utc::now();
        let inputs = ImportanceInputs {
            message_count: 500,
            total_content_length: 100_000,
            most_recent: Some(now),
            user_authored_count: 100,
        };
        assert!(approx(importance_score(&inputs, now), 1.0));
    }

    #[test]
    fn components_add_up() {
        let now = Utc::now();
        let inputs = ImportanceInputs {
            message_count: 10,                            // 0.2
            total_content_length: 1000,                   // 0.2
            most_recent: Some(now - Duration::days(15)),  // 0.5 * 0.2 = 0.1
            user_authored_count: 2,                       // 0.1
        };
        assert!(approx(importance_score(&inputs, now), 0.6));
    }

    #[test]
    fn stale_groups_lose_only_the_recency_term() {
        let now = Utc::now();
        let inputs = ImportanceInputs {
            message_count: 50,
            total_content_length: 0,
            most_recent: Some(now - Duration::days(90)),
            user_authored_count: 0,
        };
        assert!(approx(importance_score(&inputs, now), 0.3));
    }

    #[test]
    fn future_timestamps_do_not_exceed_bounds() {
        let now = Utc::now();
        let inputs = ImportanceInputs {
            message_count: 0,
            total_content_length: 0,
            most_recent: Some(now + Duration::days(3)),
            user_authored_count: 0,
        };
        assert!(approx(importance_score(&inputs, now), 0.2));
    }
}
