//! Terminal front end
//!
//! Reads lines from stdin, turns them into driver commands, and prints the
//! driver's updates. Input typed while a reply is outstanding stays queued,
//! except `F`, which is passed on at once.

use crate::driver::{Command, DriverError, DriverHandle, DriverUpdate};
use crate::emotion::Emotion;
use crate::protocol::ProbeDepth;
use crate::session::RespondentState;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

const FINISH_TOKEN: &str = "F";
const INVALID_SELECTION: &str = "Oops! Please choose a valid key that you haven't completed yet.";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("Driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Forward stdin lines from a dedicated thread.
///
/// Blocking reads on tokio's stdin would keep the runtime alive at shutdown.
pub fn spawn_stdin_reader(capacity: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(capacity);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// `■■▢ (2/3 reflections completed)`
pub fn progress_bar(answers: usize) -> String {
    let total = ProbeDepth::TERMINAL.answer_count();
    let done = answers.min(total);
    format!(
        "{}{} ({done}/{total} reflections completed)",
        "■".repeat(done),
        "▢".repeat(total - done)
    )
}

fn is_finish(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(FINISH_TOKEN)
}

fn menu_tokens(emotions: &[Emotion]) -> String {
    emotions
        .iter()
        .map(|e| e.token().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_welcome(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "\nWelcome to your personal reflection survey!")?;
    writeln!(out, "* First, choose an emotion by entering A, B, or C.")?;
    writeln!(out, "* Then you will be asked a reflection question.")?;
    writeln!(out, "* Type anything you like in response.")?;
    writeln!(out, "* Press '{FINISH_TOKEN}' at any time to finish.")?;
    writeln!(out, "\nChoose an emotion:")?;
    for emotion in Emotion::ALL {
        writeln!(out, "{} - {}", emotion.token(), emotion.label())?;
    }
    Ok(())
}

fn write_selection_prompt(out: &mut impl Write, remaining: &[Emotion]) -> std::io::Result<()> {
    if remaining.is_empty() {
        writeln!(out, "\nPress '{FINISH_TOKEN}' to finish:")?;
    } else {
        writeln!(
            out,
            "\nDraw a card ({}) or press '{FINISH_TOKEN}' to finish:",
            menu_tokens(remaining)
        )?;
    }
    out.flush()
}

/// Front-end state between driver updates
struct Terminal<W> {
    out: W,
    remaining: Vec<Emotion>,
    awaiting_answer: bool,
}

impl<W: Write> Terminal<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            remaining: Emotion::ALL.to_vec(),
            awaiting_answer: false,
        }
    }

    /// Turn one input line into a command, or answer it locally
    fn handle_line(&mut self, line: &str) -> std::io::Result<Option<Command>> {
        if is_finish(line) {
            return Ok(Some(Command::Finish));
        }
        let input = line.trim();

        if self.awaiting_answer {
            if input.is_empty() {
                writeln!(self.out, "Please type a response, or '{FINISH_TOKEN}' to finish:")?;
                self.out.flush()?;
                return Ok(None);
            }
            self.awaiting_answer = false;
            return Ok(Some(Command::Answer(input.to_string())));
        }

        if let Some(emotion) = Emotion::from_token(input) {
            return Ok(Some(Command::Select(emotion)));
        }
        writeln!(self.out, "{INVALID_SELECTION}")?;
        write_selection_prompt(&mut self.out, &self.remaining)?;
        Ok(None)
    }

    /// Print an update; true once the driver has finished
    fn handle_update(&mut self, update: DriverUpdate) -> std::io::Result<bool> {
        match update {
            DriverUpdate::Prompt { depth, text, .. } => {
                writeln!(self.out, "\n{text}")?;
                writeln!(self.out, "\nProgress: {}", progress_bar(depth.answer_count()))?;
                writeln!(
                    self.out,
                    "\nType your response below (or press '{FINISH_TOKEN}' to finish):"
                )?;
                self.out.flush()?;
                self.awaiting_answer = true;
            }
            DriverUpdate::Completed {
                emotion,
                closing_text,
                completed,
                remaining,
            } => {
                self.awaiting_answer = false;
                self.remaining = remaining;
                writeln!(self.out, "\n{closing_text}")?;
                writeln!(self.out, "\nReflection completed for {}", emotion.label())?;
                writeln!(
                    self.out,
                    "Progress: {}",
                    progress_bar(ProbeDepth::TERMINAL.answer_count())
                )?;
                if self.remaining.is_empty() {
                    writeln!(self.out, "\nYou've completed reflections for all emotions!")?;
                } else {
                    writeln!(
                        self.out,
                        "\nYou've reflected on {completed}/{} emotions.",
                        Emotion::ALL.len()
                    )?;
                }
                write_selection_prompt(&mut self.out, &self.remaining)?;
            }
            DriverUpdate::Rejected {
                message,
                invalid_selection,
            } => {
                if invalid_selection {
                    writeln!(self.out, "{INVALID_SELECTION}")?;
                } else {
                    writeln!(self.out, "{message}")?;
                }
                if !self.awaiting_answer {
                    write_selection_prompt(&mut self.out, &self.remaining)?;
                }
            }
            DriverUpdate::EngineUnavailable { emotion, .. } => {
                self.awaiting_answer = false;
                writeln!(
                    self.out,
                    "\nNo reflection question arrived for {}. Please try again.",
                    emotion.label()
                )?;
                write_selection_prompt(&mut self.out, &self.remaining)?;
            }
            DriverUpdate::Finished => {
                writeln!(
                    self.out,
                    "\nEnding your reflection session. Thank you for participating!"
                )?;
                self.out.flush()?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Drive one participant through the terminal until they finish.
///
/// Returns the driver's final state once it has stopped.
pub async fn run_session<W: Write>(
    out: W,
    mut lines: mpsc::Receiver<String>,
    handle: DriverHandle,
) -> Result<RespondentState, CliError> {
    let DriverHandle {
        commands,
        mut updates,
        task,
    } = handle;

    let mut terminal = Terminal::new(out);
    // Lines typed while a command is with the driver
    let mut queued: VecDeque<String> = VecDeque::new();
    let mut waiting = false;
    let mut input_closed = false;
    let mut finish_sent = false;

    write_welcome(&mut terminal.out)?;
    write_selection_prompt(&mut terminal.out, &terminal.remaining)?;

    'session: loop {
        while !waiting && !finish_sent {
            let command = match queued.pop_front() {
                Some(line) => match terminal.handle_line(&line)? {
                    Some(command) => command,
                    None => continue,
                },
                // End of input finishes once everything typed is handled
                None if input_closed => Command::Finish,
                None => break,
            };
            finish_sent = command == Command::Finish;
            if commands.send(command).await.is_err() {
                tracing::warn!("Driver stopped accepting commands");
                break 'session;
            }
            waiting = true;
        }

        tokio::select! {
            line = lines.recv(), if !input_closed => match line {
                Some(line) if waiting && !finish_sent && is_finish(&line) => {
                    finish_sent = true;
                    if commands.send(Command::Finish).await.is_err() {
                        tracing::warn!("Driver stopped accepting commands");
                        break 'session;
                    }
                }
                Some(line) => queued.push_back(line),
                None => input_closed = true,
            },

            update = updates.recv() => {
                waiting = false;
                match update {
                    Ok(update) => {
                        if terminal.handle_update(update)? {
                            break 'session;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Front end fell behind driver updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break 'session,
                }
            }
        }
    }

    drop(commands);
    Ok(task.await??)
}
