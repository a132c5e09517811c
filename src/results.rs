/**
 * Turning a finished session into a persisted record and the feedback shown to the
 * learner.
 */
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::common::{Mode, Topic};
use super::persistence::{self, Record, RecordStore, PROGRESS_KEY};
use super::stats;

/// The most concepts suggested for improvement after a session.
const MAX_IMPROVEMENTS: usize = 3;

/// Per-concept answer counts for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    attempts: BTreeMap<String, u32>,
    misses: BTreeMap<String, u32>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, concept: &str, correct: bool) {
        *self.attempts.entry(concept.to_string()).or_insert(0) += 1;
        if !correct {
            *self.misses.entry(concept.to_string()).or_insert(0) += 1;
        }
    }

    /// How many times each concept was missed. Concepts never missed are absent.
    pub fn misses(&self) -> &BTreeMap<String, u32> {
        &self.misses
    }

    /// Concepts missed at least once, alphabetically.
    pub fn weak_areas(&self) -> Vec<String> {
        self.misses.keys().cloned().collect()
    }

    /// Concepts answered correctly every time they were asked, alphabetically.
    pub fn strengths(&self) -> Vec<String> {
        self.attempts
            .keys()
            .filter(|concept| !self.misses.contains_key(*concept))
            .cloned()
            .collect()
    }

    /// The most-missed concepts, most misses first, ties broken alphabetically.
    pub fn improvements(&self) -> Vec<String> {
        let mut missed: Vec<(&String, &u32)> = self.misses.iter().collect();
        // Stable, and the map iterates alphabetically.
        missed.sort_by(|a, b| b.1.cmp(a.1));
        missed
            .into_iter()
            .take(MAX_IMPROVEMENTS)
            .map(|(concept, _)| concept.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTier {
    Excellent,
    Great,
    KeepGoing,
    Learning,
}

impl FeedbackTier {
    pub fn from_percentage(percentage: u8) -> Self {
        if percentage >= 80 {
            FeedbackTier::Excellent
        } else if percentage >= 60 {
            FeedbackTier::Great
        } else if percentage >= 40 {
            FeedbackTier::KeepGoing
        } else {
            FeedbackTier::Learning
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FeedbackTier::Excellent => "excellent",
            FeedbackTier::Great => "great",
            FeedbackTier::KeepGoing => "keep-going",
            FeedbackTier::Learning => "learning",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            FeedbackTier::Excellent => "🏆",
            FeedbackTier::Great => "🌟",
            FeedbackTier::KeepGoing => "💪",
            FeedbackTier::Learning => "📚",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FeedbackTier::Excellent => "Excellent work!",
            FeedbackTier::Great => "Great job!",
            FeedbackTier::KeepGoing => "Keep going!",
            FeedbackTier::Learning => "Keep learning!",
        }
    }
}

/// How a session compares with earlier practice on the same topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryTrend {
    Improved,
    Declined,
    Consistent,
    FirstAttempt,
}

impl MasteryTrend {
    /// Compare `percentage` with `prior`, the earlier practice records for the topic.
    /// Returns the trend and the signed difference from the prior mastery.
    pub fn compare(percentage: u8, topic: Topic, prior: &[Record]) -> (Self, Option<i32>) {
        if !prior.iter().any(|r| r.topic == topic) {
            return (MasteryTrend::FirstAttempt, None);
        }

        let delta = i32::from(percentage) - i32::from(stats::mastery(prior, topic));
        let trend = if delta > 0 {
            MasteryTrend::Improved
        } else if delta < 0 {
            MasteryTrend::Declined
        } else {
            MasteryTrend::Consistent
        };
        (trend, Some(delta))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MasteryTrend::Improved => "improved",
            MasteryTrend::Declined => "declined",
            MasteryTrend::Consistent => "consistent",
            MasteryTrend::FirstAttempt => "first-attempt",
        }
    }
}

impl fmt::Display for FeedbackTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl fmt::Display for MasteryTrend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Represents the outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    /// The record that was appended to the store.
    pub record: Record,
    pub score: u32,
    pub total_answered: usize,
    /// How many questions were queued, including any left unanswered.
    pub total_questions: usize,
    /// `true` if the exam countdown ran out.
    pub timed_out: bool,
    pub feedback: FeedbackTier,
    pub trend: MasteryTrend,
    pub mastery_delta: Option<i32>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    /// `false` if the record could not be written; the feedback is still valid.
    pub saved: bool,
}

/// Everything the recorder needs to know about a session that just ended.
pub struct Finished<'a> {
    pub topic: Topic,
    pub mode: Mode,
    pub score: u32,
    pub total_answered: usize,
    pub total_questions: usize,
    pub timed_out: bool,
    pub tally: &'a Tally,
}

/// `round(100 * score / answered)`, clamped to `[0, 100]`. Zero answered scores 0.
pub fn percentage(score: u32, total_answered: usize) -> u8 {
    let total = total_answered.max(1) as f64;
    let percentage = (100.0 * f64::from(score) / total).round();
    percentage.max(0.0).min(100.0) as u8
}

/// Build the record for `finished`, append it to the list for its mode and compute the
/// feedback.
pub fn finalize<S: RecordStore + ?Sized>(
    store: &S,
    finished: Finished,
    now: DateTime<Utc>,
) -> SessionResult {
    // Read before saving so the new record is not part of the comparison.
    let prior = store.load(PROGRESS_KEY);

    let percentage = percentage(finished.score, finished.total_answered);
    let record = Record {
        topic: finished.topic,
        percentage,
        mode: finished.mode,
        weak_areas: finished.tally.weak_areas(),
        date: now,
    };
    let saved = persistence::append_record(
        store,
        persistence::key_for_mode(finished.mode),
        record.clone(),
    );
    let (trend, mastery_delta) = MasteryTrend::compare(percentage, finished.topic, &prior);

    SessionResult {
        record,
        score: finished.score,
        total_answered: finished.total_answered,
        total_questions: finished.total_questions,
        timed_out: finished.timed_out,
        feedback: FeedbackTier::from_percentage(percentage),
        trend,
        mastery_delta,
        strengths: finished.tally.strengths(),
        improvements: finished.tally.improvements(),
        saved,
    }
}
