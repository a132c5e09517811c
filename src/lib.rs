/**
 * Adaptive self-assessment quizzes.
 *
 * The library holds the assessment engine (question bank, attempt records, statistics,
 * difficulty selection, the session state machine and the result recorder) and a
 * terminal front end that drives it.
 */
#[macro_use]
pub mod iohelper;

pub mod adaptive;
pub mod bank;
pub mod cli;
pub mod common;
pub mod engine;
pub mod persistence;
pub mod results;
pub mod stats;
pub mod timer;

pub use bank::{Question, QuestionBank};
pub use common::{Difficulty, Mode, QuizError, Result, Topic};
pub use engine::{EngineConfig, QuizEngine, State};
pub use persistence::{Record, RecordStore};
pub use results::SessionResult;
