/**
 * Definitions of data structures used by several modules, such as `QuizError`, the
 * topic/difficulty/mode enumerations and the structs that hold command-line arguments.
 */
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    /// For when a session is requested for a topic with no questions.
    #[error("no questions found")]
    EmptyQuiz,
    /// For when a new session is requested while another one is running.
    #[error("a session is already in progress")]
    SessionInProgress,
    /// For when an exam is cancelled without going through confirmation.
    #[error("an exam is in progress and must be confirmed before leaving")]
    ExamInProgress,
    #[error("no session is waiting to be started")]
    NotPreparing,
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    #[error("unknown mode '{0}'")]
    UnknownMode(String),
    #[error("invalid question bank ({0})")]
    InvalidBank(String),
    /// For when the application directory cannot be created.
    #[error("unable to create application directory at {}", .0.to_string_lossy())]
    CannotMakeAppDir(PathBuf),
    /// For JSON errors.
    #[error("could not parse JSON ({0})")]
    Json(#[from] serde_json::Error),
    #[error("database error ({0})")]
    Sql(#[from] rusqlite::Error),
    #[error("IO error ({0})")]
    Io(#[from] io::Error),
    #[error("")]
    ReadlineInterrupted,
    #[error("")]
    ReadlineEof,
    #[error("error while reading input")]
    ReadlineOther,
}

impl QuizError {
    /// Return `true` for errors that should end the program without a message, e.g.
    /// when the user presses Ctrl+C or standard output is closed.
    pub fn is_quiet(&self) -> bool {
        match self {
            QuizError::ReadlineInterrupted | QuizError::ReadlineEof => true,
            QuizError::Io(e) => e.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}

/// A top-level subject category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Mathematics,
    Science,
    Language,
}

/// A difficulty tier of the question bank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Practice sessions are untimed and adaptive; exams are timed and mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Practice,
    Exam,
}

impl Topic {
    /// The canonical ordering, used for listing and for breaking ties.
    pub const ALL: [Topic; 3] = [Topic::Mathematics, Topic::Science, Topic::Language];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Mathematics => "mathematics",
            Topic::Science => "science",
            Topic::Language => "language",
        }
    }
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Practice => "practice",
            Mode::Exam => "exam",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self> {
        Topic::ALL
            .iter()
            .find(|topic| topic.as_str() == s)
            .copied()
            .ok_or_else(|| QuizError::UnknownTopic(s.to_string()))
    }
}

impl FromStr for Mode {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "practice" => Ok(Mode::Practice),
            "exam" => Ok(Mode::Exam),
            _ => Err(QuizError::UnknownMode(s.to_string())),
        }
    }
}

/// Which backend holds the attempt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
}

/// Holds the command-line configuration for the application.
#[derive(Parser)]
#[command(name = "selfcheck", version, about = "Adaptive self-assessment quizzes.")]
pub struct Options {
    /// Keep attempt records in a particular directory.
    #[arg(short = 'd', long = "directory", env = "SELFCHECK_DIR", global = true)]
    pub directory: Option<PathBuf>,
    /// Storage backend for attempt records.
    #[arg(long = "store", value_enum, default_value = "json", global = true)]
    pub store: StoreKind,
    /// Do not emit colorized output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Take an untimed practice session at an adaptive difficulty.
    Practice(PracticeOptions),
    /// Take a timed exam mixing all difficulty tiers.
    Exam(ExamOptions),
    /// Show mastery, streak and a recommended focus.
    Dashboard,
    /// List previous attempts, newest first.
    History(HistoryOptions),
    /// List available topics and question counts.
    Topics,
}

#[derive(Args)]
pub struct PracticeOptions {
    /// Topic to practice.
    #[arg(value_enum)]
    pub topic: Topic,
}

#[derive(Args)]
pub struct ExamOptions {
    /// Topic of the exam.
    #[arg(value_enum)]
    pub topic: Topic,
    /// Length of the countdown in minutes.
    #[arg(long = "minutes", default_value = "15")]
    pub minutes: u64,
}

#[derive(Args)]
pub struct HistoryOptions {
    /// Only show the first `n` attempts.
    #[arg(short = 'n')]
    pub num_to_show: Option<usize>,
    /// Only show exam attempts.
    #[arg(long = "exams")]
    pub exams_only: bool,
}
