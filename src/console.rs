//! # Console
//!
//! Terminal side of the ticker: interactive prompts for missing settings,
//! the keyboard cancel signal, a one-line status display and a log writer
//! that stays readable while the terminal is in raw mode.
//!
//! ## Raw Mode
//!
//! While the ticker runs, the terminal is switched to raw mode so that a
//! single ESC can be read without Enter. Raw mode also turns off `\n` to
//! `\r\n` translation, so [`CrlfWriter`] adds the carriage returns back to
//! log lines. Ctrl-C no longer raises SIGINT in raw mode and is treated like
//! ESC.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::{AccountKind, PartialConfig};
use crate::scheduler::{CancelSignal, Status};

// ============================================================================
// RAW MODE
// ============================================================================

/// Raw mode for as long as the guard lives.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

// ============================================================================
// CANCEL SIGNAL
// ============================================================================

/// Cancels on ESC or Ctrl-C. Holds the terminal in raw mode.
pub struct KeyboardCancel {
    _raw: RawModeGuard,
}

impl KeyboardCancel {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _raw: RawModeGuard::enable()?,
        })
    }
}

impl CancelSignal for KeyboardCancel {
    fn cancelled(&mut self) -> bool {
        // drain everything typed since the last tick without blocking
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if is_cancel_key(&key) => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                },
                _ => return false,
            }
        }
    }
}

/// ESC or Ctrl-C, on press.
pub fn is_cancel_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

// ============================================================================
// STATUS LINE
// ============================================================================

/// Text shown for each scheduler status.
pub fn status_text(status: Status) -> &'static str {
    match status {
        Status::Pinging => "Pinging server...",
        Status::Retrieving => "Retrieving data...",
        Status::Printing => "Sending to printer...",
        Status::Waiting => "Waiting... (ESC quits)",
    }
}

/// Overwrite the current terminal line with the status text.
pub fn show_status(status: Status) {
    let mut out = io::stdout();
    let _ = write!(out, "\r{:<24}\r", status_text(status));
    let _ = out.flush();
}

// ============================================================================
// PROMPTS
// ============================================================================

fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "input cancelled")
}

fn prompt_line(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"));
    }
    Ok(line.trim().to_string())
}

/// Read a line without echoing it.
fn prompt_secret(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut secret = String::new();
    {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            if is_cancel_key(&key) {
                return Err(interrupted());
            }
            match key.code {
                KeyCode::Enter => break,
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
    println!();
    Ok(secret)
}

/// Wait for R or D.
fn prompt_account(label: &str) -> io::Result<AccountKind> {
    print!("{}", label);
    io::stdout().flush()?;

    let kind = {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            if is_cancel_key(&key) {
                return Err(interrupted());
            }
            match key.code {
                KeyCode::Char('r') | KeyCode::Char('R') => break AccountKind::Real,
                KeyCode::Char('d') | KeyCode::Char('D') => break AccountKind::Demo,
                _ => {}
            }
        }
    };
    println!("{}", if kind == AccountKind::Real { "R" } else { "D" });
    Ok(kind)
}

/// Ask for every required setting the layers left empty.
///
/// Prompts repeat until they get a usable answer. `needs_printer` is false
/// for commands that never print.
pub fn fill_missing(partial: &mut PartialConfig, needs_printer: bool) -> io::Result<()> {
    while partial.user_id.is_none_or(|id| id == 0) {
        partial.user_id = prompt_line("User ID (numeric):      ")?.parse().ok();
    }

    while partial.password.as_deref().is_none_or(str::is_empty) {
        partial.password = Some(prompt_secret("User password:          ")?);
    }

    if partial.account.is_none() {
        partial.account = Some(prompt_account("(R)eal or (D)emo acc?:  ")?);
    }

    if needs_printer {
        while partial.printer_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            partial.printer_name = Some(prompt_line("Bluetooth printer name: ")?);
        }
    }

    Ok(())
}

// ============================================================================
// LOG WRITER
// ============================================================================

/// Writes to stderr, turning `\n` into `\r\n` so lines start at column 0
/// in raw mode.
pub struct CrlfWriter<W: Write> {
    inner: W,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, &b) in buf.iter().enumerate() {
            if b == b'\n' && (i == 0 || buf[i - 1] != b'\r') {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// [`MakeWriter`] for `tracing_subscriber` producing [`CrlfWriter`]s over
/// stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLog;

impl<'a> MakeWriter<'a> for ConsoleLog {
    type Writer = CrlfWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        CrlfWriter::new(io::stderr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_cancel_keys() {
        assert!(is_cancel_key(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_cancel_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_cancel_key(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_cancel_key(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }

    #[test]
    fn test_key_release_does_not_cancel() {
        let mut esc = key(KeyCode::Esc, KeyModifiers::NONE);
        esc.kind = KeyEventKind::Release;
        assert!(!is_cancel_key(&esc));
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(Status::Waiting), "Waiting... (ESC quits)");
        assert_eq!(status_text(Status::Pinging), "Pinging server...");
    }

    #[test]
    fn test_crlf_writer() {
        let mut out = CrlfWriter::new(Vec::new());
        out.write_all(b"one\ntwo\r\nthree\n").unwrap();
        assert_eq!(out.inner, b"one\r\ntwo\r\nthree\r\n");
    }

    #[test]
    fn test_fill_missing_keeps_complete_config() {
        let mut partial = PartialConfig {
            user_id: Some(1),
            password: Some("pw".into()),
            account: Some(AccountKind::Demo),
            printer_name: Some("GB01".into()),
            ..Default::default()
        };
        // nothing is missing, so no prompt reads stdin
        fill_missing(&mut partial, true).unwrap();
        assert_eq!(partial.user_id, Some(1));
        assert_eq!(partial.printer_name.as_deref(), Some("GB01"));
    }
}
