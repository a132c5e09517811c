/**
 * Statistics derived from the history of attempt records: averages, mastery, streaks,
 * the weakest topic and the recommended focus for the next session.
 *
 * Every function here is pure and total; empty inputs produce zeros, never errors.
 */
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::bank::QuestionBank;
use super::common::Topic;
use super::persistence::Record;

/// Records scoring below this count as failures when breaking ties between topics.
pub const FAILURE_THRESHOLD: u8 = 70;

/// The mean percentage of `records`, or 0 if there are none.
pub fn average(records: &[Record]) -> f64 {
    mean(records.iter())
}

/// The mean percentage of the records for `topic`, or 0 if there are none.
pub fn average_for_topic(records: &[Record], topic: Topic) -> f64 {
    mean(records.iter().filter(|r| r.topic == topic))
}

fn mean<'a, I: Iterator<Item = &'a Record>>(records: I) -> f64 {
    let mut sum = 0.0;
    let mut count = 0;
    for record in records {
        sum += f64::from(record.percentage);
        count += 1;
    }

    if count > 0 {
        sum / (count as f64)
    } else {
        0.0
    }
}

/// The rounded average percentage for `topic`.
pub fn mastery(records: &[Record], topic: Topic) -> u8 {
    average_for_topic(records, topic).round() as u8
}

/// Return the topic in `topics` with the lowest average. Among tied topics, the one
/// with the most recent failing record wins; if none of them has failed, the first in
/// `topics` wins. `None` is returned only if `topics` is empty.
pub fn weakest_topic(topics: &[Topic], records: &[Record]) -> Option<Topic> {
    let lowest = topics
        .iter()
        .map(|topic| average_for_topic(records, *topic))
        .fold(f64::INFINITY, f64::min);

    let mut best: Option<(Topic, Option<DateTime<Utc>>)> = None;
    for topic in topics.iter() {
        if (average_for_topic(records, *topic) - lowest).abs() > 1e-9 {
            continue;
        }

        let failed = last_failure(records, *topic);
        best = match best {
            None => Some((*topic, failed)),
            // `None < Some(_)`, so a topic that has failed beats one that has not.
            Some((_, best_failed)) if failed > best_failed => Some((*topic, failed)),
            keep => keep,
        };
    }
    best.map(|(topic, _)| topic)
}

fn last_failure(records: &[Record], topic: Topic) -> Option<DateTime<Utc>> {
    records
        .iter()
        .filter(|r| r.topic == topic && r.percentage < FAILURE_THRESHOLD)
        .map(|r| r.date)
        .max()
}

/// Count the consecutive calendar days (UTC) with at least one record, ending today
/// or yesterday. A day with no activity between the last record and today breaks the
/// streak.
pub fn practice_streak(records: &[Record], now: DateTime<Utc>) -> u32 {
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.date.date_naive()).collect();
    let today = now.date_naive();
    let yesterday = today - Duration::days(1);

    let mut day = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// A recommendation for what to study next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Focus {
    pub topic: Topic,
    /// The first concept of the topic in bank order.
    pub concept: Option<String>,
    pub mastery: u8,
    /// Suggested session length in minutes.
    pub minutes: u32,
}

/// Pick the weakest of the bank's topics from the practice `records` and suggest a
/// session length for it.
pub fn focus(bank: &QuestionBank, records: &[Record]) -> Option<Focus> {
    let topic = weakest_topic(&bank.topics(), records)?;
    let mastery = mastery(records, topic);
    Some(Focus {
        topic,
        concept: bank.first_concept(topic).map(String::from),
        mastery,
        minutes: suggested_minutes(mastery),
    })
}

pub fn suggested_minutes(mastery: u8) -> u32 {
    if mastery < 50 {
        5
    } else if mastery < 70 {
        10
    } else {
        15
    }
}

/// Per-topic figures for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub topic: Topic,
    pub attempts: usize,
    pub mastery: u8,
    pub best: Option<u8>,
    pub last_attempt: Option<DateTime<Utc>>,
}

pub fn topic_summary(records: &[Record], topic: Topic) -> TopicSummary {
    let matching: Vec<&Record> = records.iter().filter(|r| r.topic == topic).collect();
    TopicSummary {
        topic,
        attempts: matching.len(),
        mastery: mastery(records, topic),
        best: matching.iter().map(|r| r.percentage).max(),
        last_attempt: matching.iter().map(|r| r.date).max(),
    }
}

/// Merge practice and exam records, newest first, keeping at most `limit` of them.
pub fn timeline<'a>(
    progress: &'a [Record],
    exams: &'a [Record],
    limit: Option<usize>,
) -> Vec<&'a Record> {
    let mut merged: Vec<&Record> = progress.iter().chain(exams.iter()).collect();
    // Stable, so records with equal dates stay in insertion order.
    merged.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(limit) = limit {
        merged.truncate(limit);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use super::super::common::Mode;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn record(topic: Topic, percentage: u8, date: DateTime<Utc>) -> Record {
        Record { topic, percentage, mode: Mode::Practice, weak_areas: Vec::new(), date }
    }

    #[test]
    fn averages_of_nothing_are_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average_for_topic(&[], Topic::Science), 0.0);
        assert_eq!(mastery(&[], Topic::Science), 0);
    }

    #[test]
    fn averages_are_restricted_by_topic() {
        let now = at(2024, 5, 1, 9, 0);
        let records = vec![
            record(Topic::Science, 100, now),
            record(Topic::Science, 55, now),
            record(Topic::Language, 10, now),
        ];
        assert!((average(&records) - 55.0).abs() < 1e-9);
        assert!((average_for_topic(&records, Topic::Science) - 77.5).abs() < 1e-9);
        assert_eq!(mastery(&records, Topic::Science), 78);
        assert_eq!(average_for_topic(&records, Topic::Mathematics), 0.0);
    }

    #[test]
    fn weakest_topic_prefers_lowest_average() {
        let now = at(2024, 5, 1, 9, 0);
        let records = vec![
            record(Topic::Mathematics, 90, now),
            record(Topic::Science, 40, now),
            record(Topic::Language, 60, now),
        ];
        assert_eq!(weakest_topic(&Topic::ALL, &records), Some(Topic::Science));
        assert_eq!(weakest_topic(&[], &records), None);
    }

    #[test]
    fn weakest_topic_ties_go_to_most_recent_failure() {
        let records = vec![
            record(Topic::Mathematics, 50, at(2024, 5, 1, 9, 0)),
            record(Topic::Science, 50, at(2024, 5, 3, 9, 0)),
            record(Topic::Language, 80, at(2024, 5, 4, 9, 0)),
        ];
        assert_eq!(weakest_topic(&Topic::ALL, &records), Some(Topic::Science));
    }

    #[test]
    fn weakest_topic_ties_without_failures_use_canonical_order() {
        let now = at(2024, 5, 1, 9, 0);
        let records = vec![
            record(Topic::Language, 80, now),
            record(Topic::Science, 80, now),
            record(Topic::Mathematics, 80, now),
        ];
        assert_eq!(weakest_topic(&Topic::ALL, &records), Some(Topic::Mathematics));
        assert_eq!(
            weakest_topic(&[Topic::Science, Topic::Language], &records),
            Some(Topic::Science)
        );
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let now = at(2024, 5, 10, 15, 0);
        let records = vec![
            record(Topic::Science, 50, at(2024, 5, 7, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 8, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 9, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 9, 20, 0)),
            record(Topic::Science, 50, at(2024, 5, 10, 8, 0)),
        ];
        assert_eq!(practice_streak(&records, now), 4);
    }

    #[test]
    fn streak_stops_at_gap() {
        let now = at(2024, 5, 10, 15, 0);
        let records = vec![
            record(Topic::Science, 50, at(2024, 5, 4, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 5, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 8, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 9, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 10, 8, 0)),
        ];
        assert_eq!(practice_streak(&records, now), 3);
    }

    #[test]
    fn streak_may_end_yesterday_but_not_earlier() {
        let records = vec![
            record(Topic::Science, 50, at(2024, 5, 8, 8, 0)),
            record(Topic::Science, 50, at(2024, 5, 9, 8, 0)),
        ];
        assert_eq!(practice_streak(&records, at(2024, 5, 10, 23, 0)), 2);
        assert_eq!(practice_streak(&records, at(2024, 5, 11, 0, 30)), 0);
        assert_eq!(practice_streak(&[], at(2024, 5, 11, 0, 30)), 0);
    }

    #[test]
    fn sessions_either_side_of_midnight_are_two_days() {
        let records = vec![
            record(Topic::Science, 50, at(2024, 5, 9, 23, 59)),
            record(Topic::Science, 50, at(2024, 5, 10, 0, 1)),
        ];
        assert_eq!(practice_streak(&records, at(2024, 5, 10, 0, 2)), 2);
    }

    #[test]
    fn focus_buckets_session_length() {
        assert_eq!(suggested_minutes(0), 5);
        assert_eq!(suggested_minutes(49), 5);
        assert_eq!(suggested_minutes(50), 10);
        assert_eq!(suggested_minutes(69), 10);
        assert_eq!(suggested_minutes(70), 15);
    }

    #[test]
    fn focus_recommends_first_concept_of_weakest_topic() {
        let bank = QuestionBank::builtin().unwrap();
        let now = at(2024, 5, 1, 9, 0);
        let records = vec![
            record(Topic::Mathematics, 90, now),
            record(Topic::Science, 65, now),
            record(Topic::Language, 85, now),
        ];
        let recommended = focus(&bank, &records).unwrap();
        assert_eq!(recommended.topic, Topic::Science);
        assert_eq!(recommended.concept.as_deref(), Some("photosynthesis"));
        assert_eq!(recommended.mastery, 65);
        assert_eq!(recommended.minutes, 10);
    }

    #[test]
    fn summary_and_timeline() {
        let progress = vec![
            record(Topic::Science, 40, at(2024, 5, 1, 9, 0)),
            record(Topic::Science, 90, at(2024, 5, 3, 9, 0)),
        ];
        let mut exam = record(Topic::Language, 70, at(2024, 5, 2, 9, 0));
        exam.mode = Mode::Exam;
        let exams = vec![exam];

        let summary = topic_summary(&progress, Topic::Science);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.mastery, 65);
        assert_eq!(summary.best, Some(90));
        assert_eq!(summary.last_attempt, Some(at(2024, 5, 3, 9, 0)));
        assert_eq!(topic_summary(&progress, Topic::Language).best, None);

        let merged = timeline(&progress, &exams, Some(2));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].percentage, 90);
        assert_eq!(merged[1].mode, Mode::Exam);
    }
}
