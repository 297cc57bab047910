//! The status line: a single always-current line at the bottom of the
//! session's console, repainted in place.

use std::io::{self, Write};

use ansi_term::{Colour, Style};
use chrono::{DateTime, Local};

/// The three numbers a session exposes at any point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub lines: u64,
    pub minutes: u64,
    pub errors: usize,
}

impl StatusSnapshot {
    /// Canonical status text. Styling only decorates it, the wording never
    /// changes.
    pub fn render(&self) -> String {
        format!(
            "{} lines | {} min | {} errors",
            self.lines, self.minutes, self.errors
        )
    }
}

const ERASE_LINE: &str = "\r\x1b[2K";

pub struct StatusLine<W> {
    out: W,
    styled: bool,
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W) -> Self {
        Self { out, styled: false }
    }

    /// Enables ANSI decoration of the rendered numbers.
    pub fn with_style(mut self) -> Self {
        self.styled = true;
        self
    }

    /// Repaints the status line in place.
    pub fn update(&mut self, snapshot: &StatusSnapshot) -> io::Result<()> {
        let text = self.decorate(snapshot);
        write!(self.out, "{ERASE_LINE}{text}")?;
        self.out.flush()
    }

    /// Prints a one-shot report on its own line, then repaints the status
    /// line under it.
    pub fn notify(&mut self, snapshot: &StatusSnapshot, at: DateTime<Local>) -> io::Result<()> {
        let text = self.decorate(snapshot);
        writeln!(self.out, "{ERASE_LINE}Report {} | {text}", at.format("%H:%M"))?;
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Releases the line so the console prompt comes back clean.
    pub fn clear(&mut self) -> io::Result<()> {
        write!(self.out, "{ERASE_LINE}")?;
        self.out.flush()
    }

    fn decorate(&self, snapshot: &StatusSnapshot) -> String {
        if !self.styled {
            return snapshot.render();
        }
        let errors = if snapshot.errors > 0 {
            Colour::Red.bold()
        } else {
            Style::new()
        };
        format!(
            "{} lines | {} min | {}",
            Colour::Cyan.paint(snapshot.lines.to_string()),
            Colour::Yellow.paint(snapshot.minutes.to_string()),
            errors.paint(format!("{} errors", snapshot.errors)),
        )
    }
}
