/**
 * The quiz session state machine.
 *
 *   Idle/Completed --start_session--> Preparing --confirm_start--> InProgress
 *   InProgress --last answer or countdown expiry--> Completed
 *   Preparing/InProgress --cancel--> Idle
 *
 * There is only ever one session. It is owned by `QuizEngine` and nothing else
 * mutates it. The exam countdown is advanced by the owner calling `tick`; a tick that
 * arrives after the session has finished is ignored, so a session is finalized exactly
 * once no matter which of the final answer and the countdown comes first.
 */
use std::mem;

use chrono::{DateTime, SubsecRound, Utc};
use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::debug;

use super::adaptive;
use super::bank::{Question, QuestionBank};
use super::common::{Difficulty, Mode, QuizError, Result, Topic};
use super::persistence::{RecordStore, PROGRESS_KEY};
use super::results::{self, Finished, SessionResult, Tally};
use super::timer::{Countdown, Tick};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, truncated to the millisecond precision records are stored with.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }
}

/// Puts exam questions in a random order.
pub trait Shuffler {
    fn shuffle(&mut self, questions: &mut [Question]);
}

/// Uniform Fisher-Yates shuffle with the thread-local generator.
pub struct ThreadShuffler;

impl Shuffler for ThreadShuffler {
    fn shuffle(&mut self, questions: &mut [Question]) {
        let mut rng = thread_rng();
        questions.shuffle(&mut rng);
    }
}

/// Leaves questions in bank order.
pub struct NoShuffle;

impl Shuffler for NoShuffle {
    fn shuffle(&mut self, _questions: &mut [Question]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The most questions asked in an exam.
    pub exam_length: usize,
    /// Length of the exam countdown.
    pub exam_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { exam_length: 10, exam_seconds: 900 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Preparing,
    InProgress,
    Completed,
}

/// The in-progress session.
#[derive(Debug, Clone)]
pub struct SessionState {
    topic: Topic,
    mode: Mode,
    /// Only practice sessions have a single tier.
    difficulty: Option<Difficulty>,
    queue: Vec<Question>,
    current_index: usize,
    score: u32,
    tally: Tally,
    /// Ids of the questions answered so far, in order.
    answered: Vec<u32>,
    countdown: Option<Countdown>,
}

impl SessionState {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn queue(&self) -> &[Question] {
        &self.queue
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn answered(&self) -> &[u32] {
        &self.answered
    }

    /// How many times each concept has been missed so far.
    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn time_remaining(&self) -> Option<u64> {
        self.countdown.as_ref().map(|countdown| countdown.remaining())
    }
}

/// What the presentation layer needs to show the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView<'a> {
    /// 1-based position in the session.
    pub number: usize,
    pub total: usize,
    pub text: &'a str,
    pub options: &'a [String],
    pub concept: &'a str,
    pub difficulty: Option<Difficulty>,
}

/// The outcome of submitting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answered {
    pub correct: bool,
    pub correct_option: String,
    pub concept: String,
    /// Set when this was the last question.
    pub finished: Option<SessionResult>,
}

enum Phase {
    Idle,
    Preparing(SessionState),
    InProgress(SessionState),
    Completed(SessionResult),
}

pub struct QuizEngine<S, C = SystemClock, R = ThreadShuffler> {
    bank: QuestionBank,
    store: S,
    clock: C,
    shuffler: R,
    config: EngineConfig,
    phase: Phase,
}

impl<S: RecordStore> QuizEngine<S> {
    pub fn new(bank: QuestionBank, store: S) -> Self {
        QuizEngine::with_collaborators(
            bank,
            store,
            SystemClock,
            ThreadShuffler,
            EngineConfig::default(),
        )
    }
}

impl<S: RecordStore, C: Clock, R: Shuffler> QuizEngine<S, C, R> {
    pub fn with_collaborators(
        bank: QuestionBank,
        store: S,
        clock: C,
        shuffler: R,
        config: EngineConfig,
    ) -> Self {
        QuizEngine { bank, store, clock, shuffler, config, phase: Phase::Idle }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        match self.phase {
            Phase::Idle => State::Idle,
            Phase::Preparing(_) => State::Preparing,
            Phase::InProgress(_) => State::InProgress,
            Phase::Completed(_) => State::Completed,
        }
    }

    /// The session being prepared or taken, if any.
    pub fn session(&self) -> Option<&SessionState> {
        match &self.phase {
            Phase::Preparing(session) | Phase::InProgress(session) => Some(session),
            _ => None,
        }
    }

    /// `true` while an exam is running. Callers must not navigate away or start
    /// another session while this holds; the only way out is answering every
    /// question, the countdown expiring, or `cancel_exam_confirmed`.
    pub fn exam_in_progress(&self) -> bool {
        match &self.phase {
            Phase::InProgress(session) => session.mode == Mode::Exam,
            _ => false,
        }
    }

    /// Build the question queue for a new session on `topic` and wait for
    /// `confirm_start`. A prepared or finished session is discarded; a running one
    /// causes `SessionInProgress`. A topic without questions causes `EmptyQuiz`. In
    /// both error cases the engine is left as it was.
    pub fn start_session(&mut self, topic: Topic, mode: Mode) -> Result<&SessionState> {
        if let Phase::InProgress(_) = self.phase {
            return Err(QuizError::SessionInProgress);
        }

        let (difficulty, queue) = match mode {
            Mode::Exam => {
                let mut pool: Vec<Question> =
                    self.bank.all_questions(topic).into_iter().cloned().collect();
                self.shuffler.shuffle(&mut pool);
                pool.truncate(self.config.exam_length);
                (None, pool)
            }
            Mode::Practice => {
                let history = self.store.load(PROGRESS_KEY);
                let difficulty = adaptive::select_difficulty(topic, &history);
                (Some(difficulty), self.bank.get_questions(topic, difficulty).to_vec())
            }
        };

        if queue.is_empty() {
            return Err(QuizError::EmptyQuiz);
        }

        debug!(%topic, %mode, questions = queue.len(), "preparing session");
        self.phase = Phase::Preparing(SessionState {
            topic,
            mode,
            difficulty,
            queue,
            current_index: 0,
            score: 0,
            tally: Tally::new(),
            answered: Vec::new(),
            countdown: None,
        });
        match &self.phase {
            Phase::Preparing(session) => Ok(session),
            _ => Err(QuizError::NotPreparing),
        }
    }

    /// Begin the prepared session, starting the countdown for exams.
    pub fn confirm_start(&mut self) -> Result<()> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Preparing(mut session) => {
                if session.mode == Mode::Exam {
                    session.countdown = Some(Countdown::start(self.config.exam_seconds));
                }
                debug!(topic = %session.topic, mode = %session.mode, "session started");
                self.phase = Phase::InProgress(session);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(QuizError::NotPreparing)
            }
        }
    }

    /// The question waiting to be answered.
    pub fn current_question(&self) -> Option<QuestionView> {
        let session = match &self.phase {
            Phase::InProgress(session) => session,
            _ => return None,
        };
        let question = session.queue.get(session.current_index)?;
        Some(QuestionView {
            number: session.current_index + 1,
            total: session.queue.len(),
            text: &question.text,
            options: &question.options,
            concept: &question.concept,
            difficulty: session.difficulty,
        })
    }

    /// `(answered, total)` for the running session.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match &self.phase {
            Phase::InProgress(session) => Some((session.current_index, session.queue.len())),
            _ => None,
        }
    }

    /// The remaining exam time as `M:SS`.
    pub fn time_display(&self) -> Option<String> {
        match &self.phase {
            Phase::InProgress(session) => {
                session.countdown.as_ref().map(|countdown| countdown.display())
            }
            _ => None,
        }
    }

    /// The result of the most recently finished session, until the next one starts.
    pub fn last_result(&self) -> Option<&SessionResult> {
        match &self.phase {
            Phase::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Answer the current question with the text of the chosen option. Ignored (and
    /// `None` returned) unless a session is in progress.
    pub fn submit_answer(&mut self, selected: &str) -> Option<Answered> {
        let session = match &mut self.phase {
            Phase::InProgress(session) => session,
            _ => return None,
        };
        let question = session.queue.get(session.current_index)?;

        let correct = question.is_correct(selected);
        if correct {
            session.score += 1;
        }
        session.tally.record(&question.concept, correct);
        session.answered.push(question.id);
        let mut answered = Answered {
            correct,
            correct_option: question.correct_option.clone(),
            concept: question.concept.clone(),
            finished: None,
        };

        session.current_index += 1;
        if session.current_index == session.queue.len() {
            answered.finished = self.finish(false);
        }
        Some(answered)
    }

    /// Advance the exam countdown by one second. Returns the result on the tick that
    /// runs the countdown out; every other tick returns `None`.
    pub fn tick(&mut self) -> Option<SessionResult> {
        let expired = match &mut self.phase {
            Phase::InProgress(session) => match session.countdown.as_mut() {
                Some(countdown) => countdown.tick() == Tick::Expired,
                None => false,
            },
            _ => false,
        };

        if expired {
            debug!("countdown expired");
            self.finish(true)
        } else {
            None
        }
    }

    /// Tick `seconds` times, stopping early if the session finishes.
    pub fn elapse(&mut self, seconds: u64) -> Option<SessionResult> {
        for _ in 0..seconds {
            if self.state() != State::InProgress {
                break;
            }
            if let Some(result) = self.tick() {
                return Some(result);
            }
        }
        None
    }

    /// Abandon a prepared session or a practice session. Running exams are refused
    /// with `ExamInProgress` and must go through `cancel_exam_confirmed`. Returns
    /// whether anything was cancelled; from `Idle` or `Completed` this does nothing.
    pub fn cancel(&mut self) -> Result<bool> {
        if self.exam_in_progress() {
            return Err(QuizError::ExamInProgress);
        }
        Ok(self.discard())
    }

    /// Abandon any prepared or running session, exams included. The caller is
    /// responsible for having asked the learner first.
    pub fn cancel_exam_confirmed(&mut self) -> bool {
        self.discard()
    }

    /// Forget a finished session's result and return to `Idle`.
    pub fn dismiss_result(&mut self) {
        if let Phase::Completed(_) = self.phase {
            self.phase = Phase::Idle;
        }
    }

    fn discard(&mut self) -> bool {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Preparing(session) | Phase::InProgress(session) => {
                let mut session = session;
                if let Some(countdown) = session.countdown.as_mut() {
                    countdown.stop();
                }
                debug!(topic = %session.topic, mode = %session.mode, "session cancelled");
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// Move a running session to `Completed`, persisting its record. Does nothing and
    /// returns `None` if no session is running.
    fn finish(&mut self, timed_out: bool) -> Option<SessionResult> {
        let mut session = match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::InProgress(session) => session,
            other => {
                self.phase = other;
                return None;
            }
        };
        if let Some(countdown) = session.countdown.as_mut() {
            countdown.stop();
        }

        let finished = Finished {
            topic: session.topic,
            mode: session.mode,
            score: session.score,
            total_answered: session.answered.len(),
            total_questions: session.queue.len(),
            timed_out,
            tally: &session.tally,
        };
        let result = results::finalize(&self.store, finished, self.clock.now());
        debug!(
            topic = %session.topic,
            mode = %session.mode,
            percentage = result.record.percentage,
            timed_out,
            "session completed"
        );
        self.phase = Phase::Completed(result.clone());
        Some(result)
    }
}
