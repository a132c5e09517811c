/**
 * Helper functions for terminal input and output.
 *
 * Everything here takes the writer and reader as parameters so that the front end can
 * be driven by a script in tests.
 */
use std::io;

use colored::*;
use rustyline::error::ReadlineError;

use super::common::{QuizError, Result};

#[macro_export]
macro_rules! my_writeln {
    ($dst:expr, $($arg:tt)*) => (
        writeln!($dst, $($arg)*).map_err($crate::common::QuizError::Io)
    );
}

#[macro_export]
macro_rules! my_write {
    ($dst:expr, $($arg:tt)*) => (
        write!($dst, $($arg)*).map_err($crate::common::QuizError::Io)
    );
}

/// A source of lines of user input.
pub trait Readline {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

impl<H: rustyline::Helper> Readline for rustyline::Editor<H> {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        match self.readline(&format!("{}", prompt.white())) {
            Ok(s) => Ok(s),
            Err(ReadlineError::Interrupted) => Err(QuizError::ReadlineInterrupted),
            Err(ReadlineError::Eof) => Err(QuizError::ReadlineEof),
            _ => Err(QuizError::ReadlineOther),
        }
    }
}

/// Display a prompt and read lines until the user enters one with at least one
/// non-whitespace character, which is returned trimmed. Ctrl+D yields `Ok(None)`;
/// Ctrl+C yields `Err(ReadlineInterrupted)`.
pub fn prompt<R: Readline>(reader: &mut R, message: &str) -> Result<Option<String>> {
    loop {
        match reader.read_line(message) {
            Ok(response) => {
                let response = response.trim();
                if !response.is_empty() {
                    return Ok(Some(response.to_string()));
                }
            }
            Err(QuizError::ReadlineInterrupted) => {
                return Err(QuizError::ReadlineInterrupted);
            }
            Err(QuizError::ReadlineEof) => {
                return Ok(None);
            }
            Err(e) => {
                return Err(e);
            }
        }
    }
}

/// Ask a yes-no question. Anything other than an answer starting with `y`, including
/// end of input, counts as no.
pub fn yesno<R: Readline>(reader: &mut R, message: &str) -> Result<bool> {
    match prompt(reader, message)? {
        Some(response) => Ok(response.to_lowercase().starts_with('y')),
        None => Ok(false),
    }
}

/// Print `message`, breaking lines according to the current width of the terminal.
/// Prepend `prefix` to the first line and indent all subsequent lines by its length.
pub fn prettyprint<W: io::Write>(writer: &mut W, message: &str, prefix: &str) -> Result<()> {
    prettyprint_colored(writer, message, prefix, None, None)
}

pub fn prettyprint_colored<W: io::Write>(
    writer: &mut W,
    message: &str,
    prefix: &str,
    message_color: Option<Color>,
    prefix_color: Option<Color>,
) -> Result<()> {
    let width = textwrap::termwidth().saturating_sub(prefix.chars().count()).max(20);
    let mut lines = textwrap::wrap_iter(message, width);

    if let Some(first_line) = lines.next() {
        let colored_prefix = color_optional(prefix, prefix_color);
        let colored_line = color_optional(&first_line, message_color);
        my_writeln!(writer, "{}{}", colored_prefix, colored_line)?;
    }

    let indent = " ".repeat(prefix.chars().count());
    for line in lines {
        let colored_line = color_optional(&line, message_color);
        my_writeln!(writer, "{}{}", indent, colored_line)?;
    }
    Ok(())
}

fn color_optional(text: &str, color: Option<Color>) -> ColoredString {
    if let Some(color) = color {
        text.color(color)
    } else {
        text.normal()
    }
}
