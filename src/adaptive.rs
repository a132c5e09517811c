/**
 * Choose the difficulty tier of a practice session from past performance.
 *
 * Easy:   the topic's practice average is below 50%
 * Medium: no practice history yet, or an average between 50% and 80%
 * Hard:   the topic's practice average is 80% or above
 *
 * The tier is recomputed from the records at the start of every practice session.
 * Exams mix all tiers and never consult this module.
 */
use tracing::debug;

use super::common::{Difficulty, Topic};
use super::persistence::Record;
use super::stats;

// At or above this average the learner is moved up to hard questions.
const UP_THRESHOLD: f64 = 80.0;
// Below this average the learner is moved down to easy questions.
const DOWN_THRESHOLD: f64 = 50.0;

/// Return the tier for the next practice session on `topic`, given prior practice
/// records (of any topic).
pub fn select_difficulty(topic: Topic, records: &[Record]) -> Difficulty {
    let attempts = records.iter().filter(|r| r.topic == topic).count();
    if attempts == 0 {
        debug!(%topic, "no practice history, starting at medium");
        return Difficulty::Medium;
    }

    let average = stats::average_for_topic(records, topic);
    let difficulty = if average >= UP_THRESHOLD {
        Difficulty::Hard
    } else if average < DOWN_THRESHOLD {
        Difficulty::Easy
    } else {
        Difficulty::Medium
    };
    debug!(%topic, attempts, average, %difficulty, "selected difficulty");
    difficulty
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    use super::super::common::Mode;

    fn records(topic: Topic, percentages: &[u8]) -> Vec<Record> {
        percentages
            .iter()
            .map(|p| Record {
                topic,
                percentage: *p,
                mode: Mode::Practice,
                weak_areas: Vec::new(),
                date: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            })
            .collect()
    }

    #[test]
    fn cold_start_is_medium() {
        assert_eq!(select_difficulty(Topic::Science, &[]), Difficulty::Medium);

        // History for other topics does not count.
        let other = records(Topic::Language, &[100, 100]);
        assert_eq!(select_difficulty(Topic::Science, &other), Difficulty::Medium);
    }

    #[test]
    fn thresholds_are_inclusive_at_eighty() {
        assert_eq!(select_difficulty(Topic::Science, &records(Topic::Science, &[80])), Difficulty::Hard);
        assert_eq!(
            select_difficulty(Topic::Science, &records(Topic::Science, &[79, 80])),
            Difficulty::Medium
        );
    }

    #[test]
    fn low_averages_are_easy() {
        assert_eq!(
            select_difficulty(Topic::Science, &records(Topic::Science, &[40, 59])),
            Difficulty::Easy
        );
        assert_eq!(select_difficulty(Topic::Science, &records(Topic::Science, &[50])), Difficulty::Medium);
        assert_eq!(select_difficulty(Topic::Science, &records(Topic::Science, &[0])), Difficulty::Easy);
    }
}
