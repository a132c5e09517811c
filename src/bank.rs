/**
 * The question bank: a read-only catalog of multiple-choice questions for each topic
 * and difficulty tier, loaded from JSON.
 */
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::common::{Difficulty, QuizError, Result, Topic};

/// The bank that ships with the application.
const BUILTIN_BANK: &str = include_str!("bank.json");

/// Represents a multiple-choice question.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Question {
    /// Stable identifier, unique across the whole bank.
    pub id: u32,
    pub text: String,
    /// Between two and four distinct options, displayed in this order.
    pub options: Vec<String>,
    /// The text of the correct option. Always one of `options`.
    #[serde(rename = "correct")]
    pub correct_option: String,
    /// The fine-grained skill this question exercises, e.g. `"percentages"`.
    pub concept: String,
}

#[derive(Debug, Clone)]
pub struct QuestionBank {
    topics: BTreeMap<Topic, BTreeMap<Difficulty, Vec<Question>>>,
}

impl Question {
    /// Return `true` if `guess` is the correct option. Strings that differ only in
    /// their Unicode composition are treated as equal.
    pub fn is_correct(&self, guess: &str) -> bool {
        normalize(&self.correct_option) == normalize(guess)
    }
}

fn normalize(s: &str) -> String {
    s.nfc().collect::<String>()
}

impl QuestionBank {
    /// Load the bank compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_BANK)
    }

    /// Load a bank from a string containing JSON data. The top-level object maps
    /// topics to objects that map difficulty tiers to arrays of questions.
    pub fn from_json(data: &str) -> Result<Self> {
        let mut bank_as_json: serde_json::Value = serde_json::from_str(data)?;

        // Expand each question object before doing strongly-typed deserialization.
        if let Some(topics) = bank_as_json.as_object_mut() {
            for tiers in topics.values_mut() {
                if let Some(tiers) = tiers.as_object_mut() {
                    for questions in tiers.values_mut() {
                        if let Some(questions) = questions.as_array_mut() {
                            for question in questions.iter_mut() {
                                if let Some(object) = question.as_object() {
                                    *question =
                                        serde_json::Value::Object(normalize_question_json(object));
                                }
                            }
                        }
                    }
                }
            }
        }

        let topics: BTreeMap<Topic, BTreeMap<Difficulty, Vec<Question>>> =
            serde_json::from_value(bank_as_json)?;
        let bank = QuestionBank { topics };
        bank.validate()?;
        Ok(bank)
    }

    /// Return the questions for `topic` at `difficulty`, in bank order. Unknown
    /// combinations yield an empty slice.
    pub fn get_questions(&self, topic: Topic, difficulty: Difficulty) -> &[Question] {
        self.topics
            .get(&topic)
            .and_then(|tiers| tiers.get(&difficulty))
            .map(|questions| questions.as_slice())
            .unwrap_or(&[])
    }

    /// Return every question for `topic`, easy tier first.
    pub fn all_questions(&self, topic: Topic) -> Vec<&Question> {
        Difficulty::ALL
            .iter()
            .flat_map(|difficulty| self.get_questions(topic, *difficulty).iter())
            .collect()
    }

    /// The topics that have at least one question, in canonical order.
    pub fn topics(&self) -> Vec<Topic> {
        Topic::ALL
            .iter()
            .copied()
            .filter(|topic| self.count(*topic) > 0)
            .collect()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.all_questions(topic).len()
    }

    /// The first concept tag that appears for `topic`, in bank order.
    pub fn first_concept(&self, topic: Topic) -> Option<&str> {
        self.all_questions(topic)
            .first()
            .map(|question| question.concept.as_str())
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for (topic, tiers) in self.topics.iter() {
            for (difficulty, questions) in tiers.iter() {
                for question in questions.iter() {
                    let fail = |message: &str| {
                        Err(QuizError::InvalidBank(format!(
                            "question {} ({} {}): {}",
                            question.id, topic, difficulty, message
                        )))
                    };

                    if question.options.len() < 2 || question.options.len() > 4 {
                        return fail("must have between 2 and 4 options");
                    }
                    let distinct: HashSet<&String> = question.options.iter().collect();
                    if distinct.len() != question.options.len() {
                        return fail("options must be unique");
                    }
                    if !question.options.contains(&question.correct_option) {
                        return fail("correct option is not one of the options");
                    }
                    if question.concept.trim().is_empty() {
                        return fail("concept must not be empty");
                    }
                    if !ids.insert(question.id) {
                        return fail("duplicate id");
                    }
                }
            }
        }
        Ok(())
    }
}

type JSONMap = serde_json::Map<String, serde_json::Value>;

/// Given a question object in the disk format, return an equivalent object in the
/// format that the deserialization library understands (i.e., one that is isomorphic to
/// the fields of the `Question` struct).
fn normalize_question_json(question: &JSONMap) -> JSONMap {
    let mut ret = question.clone();

    // `question` is accepted as an alias for `text`.
    if !ret.contains_key("text") {
        if let Some(text) = ret.remove("question") {
            ret.insert(String::from("text"), text);
        }
    }

    // The correct answer may be given as an index into `options`.
    let index = ret.get("correct").and_then(|correct| correct.as_u64());
    if let Some(index) = index {
        let option = ret
            .get("options")
            .and_then(|options| options.as_array())
            .and_then(|options| options.get(index as usize))
            .cloned();
        if let Some(option) = option {
            ret.insert(String::from("correct"), option);
        }
    }

    ret
}
