//! Operator prompts and colored output macros
//!
//! The workflow talks to the operator only through [`Prompter`], so it can be
//! driven by [`TerminalPrompter`] in the binary and by [`ScriptedPrompter`] in
//! tests.
//!
//! All termcolor operations use `let _ =` to deliberately ignore errors.
//! Colored output is decorative and non-essential. If stderr/stdout is unavailable
//! (broken pipe, no TTY, etc.), the program continues gracefully without colors.

use crate::error::{PublishError, Result};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use termcolor::WriteColor;

/// Macro for printing warnings with yellow color
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Yellow)));
        let _ = write!(&mut buffer, "⚠️  ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Macro for printing errors with red color
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stderr(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Red)));
        let _ = write!(&mut buffer, "❌ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Macro for printing success messages with green color
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color(termcolor::ColorSpec::new().set_fg(Some(termcolor::Color::Green)));
        let _ = write!(&mut buffer, "✓ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// One entry of a single-choice question
#[derive(Debug, Clone)]
pub struct Choice {
    /// Value recorded in [`Answers`]
    pub value: &'static str,
    pub label: String,
}

impl Choice {
    pub fn new(value: &'static str, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QuestionKind {
    Text,
    /// Input is not echoed
    Masked,
    Select(Vec<Choice>),
}

/// Local check applied to an answer after its transform
#[derive(Debug, Clone, Copy)]
pub enum Validator {
    Optional,
    Required,
    Custom(fn(&str) -> std::result::Result<(), String>),
}

impl Validator {
    fn check(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            Self::Optional => Ok(()),
            Self::Required if value.trim().is_empty() => {
                Err("A value is required".to_string())
            }
            Self::Required => Ok(()),
            Self::Custom(check) => check(value),
        }
    }
}

/// Answers collected so far, keyed by question name
#[derive(Debug, Default, Clone)]
pub struct Answers(HashMap<&'static str, String>);

impl Answers {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub name: &'static str,
    pub message: String,
    pub kind: QuestionKind,
    pub validator: Validator,
    /// Ask only when this returns true for the answers collected so far
    pub when: Option<fn(&Answers) -> bool>,
    /// Applied to the raw answer before validation
    pub transform: Option<fn(&str) -> std::result::Result<String, String>>,
}

impl Question {
    fn new(name: &'static str, message: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            name,
            message: message.into(),
            kind,
            validator: Validator::Optional,
            when: None,
            transform: None,
        }
    }

    pub fn text(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, message, QuestionKind::Text)
    }

    pub fn masked(name: &'static str, message: impl Into<String>) -> Self {
        Self::new(name, message, QuestionKind::Masked)
    }

    pub fn select(name: &'static str, message: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::new(name, message, QuestionKind::Select(choices))
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.validator = Validator::Required;
        self
    }

    #[must_use]
    pub fn validate_with(mut self, check: fn(&str) -> std::result::Result<(), String>) -> Self {
        self.validator = Validator::Custom(check);
        self
    }

    #[must_use]
    pub fn when(mut self, predicate: fn(&Answers) -> bool) -> Self {
        self.when = Some(predicate);
        self
    }

    #[must_use]
    pub fn transform(mut self, transform: fn(&str) -> std::result::Result<String, String>) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Capability to ask the operator a single question.
pub trait Prompter {
    /// Return the raw answer; for [`QuestionKind::Select`] the chosen [`Choice::value`].
    fn ask(&mut self, question: &Question) -> Result<String>;

    /// Called when an answer fails its transform or validator, before re-asking.
    fn reject(&mut self, _question: &Question, reason: &str) {
        error!("{}", reason);
    }
}

/// Ask `questions` in order, skipping those whose `when` predicate is false.
///
/// Answers failing their transform or validator are rejected and asked again
/// until they pass; a local failure never ends the run.
pub fn prompt_all(prompter: &mut dyn Prompter, questions: &[Question]) -> Result<Answers> {
    let mut answers = Answers::default();

    for question in questions {
        if let Some(when) = question.when
            && !when(&answers)
        {
            continue;
        }

        let value = loop {
            let raw = prompter.ask(question)?;

            let value = match question.transform {
                Some(transform) => match transform(&raw) {
                    Ok(value) => value,
                    Err(reason) => {
                        prompter.reject(question, &reason);
                        continue;
                    }
                },
                None => raw,
            };

            match question.validator.check(&value) {
                Ok(()) => break value,
                Err(reason) => prompter.reject(question, &reason),
            }
        };

        answers.0.insert(question.name, value);
    }

    Ok(answers)
}

/// Interactive prompter reading from the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &Question) -> Result<String> {
        match &question.kind {
            QuestionKind::Text => {
                print!("{}: ", question.message);
                io::stdout().flush()?;

                let mut input = String::new();
                let bytes_read = io::stdin().read_line(&mut input)?;

                // EOF (Ctrl+D on Unix, Ctrl+Z on Windows)
                if bytes_read == 0 {
                    println!();
                    return Err(PublishError::Cancelled);
                }

                Ok(input.trim().to_string())
            }
            QuestionKind::Masked => Ok(dialoguer::Password::new()
                .with_prompt(&question.message)
                .allow_empty_password(true)
                .interact()?),
            QuestionKind::Select(choices) => {
                let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
                let index = dialoguer::Select::new()
                    .with_prompt(&question.message)
                    .items(&labels)
                    .default(0)
                    .interact()?;
                Ok(choices[index].value.to_string())
            }
        }
    }

    fn reject(&mut self, _question: &Question, reason: &str) {
        error!("{}", reason);
        println!("   Please try again\n");
    }
}

/// Prompter replaying canned answers, for driving the workflow without a terminal.
///
/// Running out of answers behaves like EOF on the terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<&'static str>,
    rejected: Vec<&'static str>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Names of the questions asked, in order, including re-asks
    #[must_use]
    pub fn asked(&self) -> &[&'static str] {
        &self.asked
    }

    /// Names of the questions whose answer was rejected locally
    #[must_use]
    pub fn rejected(&self) -> &[&'static str] {
        &self.rejected
    }

    /// Answers not consumed by the run
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &Question) -> Result<String> {
        self.asked.push(question.name);
        self.answers.pop_front().ok_or(PublishError::Cancelled)
    }

    fn reject(&mut self, question: &Question, _reason: &str) {
        self.rejected.push(question.name);
    }
}
