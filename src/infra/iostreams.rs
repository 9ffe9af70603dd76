//! Standard streams
//!
//! Owns stdin/stdout/stderr for one invocation together with the state
//! derived from them: TTY detection, colour decision, terminal width, the
//! pager child process, the progress spinner and the alternate screen.
//! Tests swap the streams for shared in-memory buffers.

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::{Mutex, MutexGuard};
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use crate::config::defaults;
use crate::config::env::{self, EnvVars};

/// Cloneable in-memory buffer used as a stream in tests
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Contents as UTF-8 (lossy)
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Clear the buffer
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handles to the buffers behind a test [`IoStreams`]
#[derive(Debug, Clone, Default)]
pub struct TestStreams {
    /// Captured standard output
    pub out: SharedBuffer,
    /// Captured standard error
    pub err: SharedBuffer,
}

enum OutSink {
    Stdout(io::Stdout),
    Pager(ChildStdin),
    Buffer(SharedBuffer),
}

/// Writer over standard output, locked for the lifetime of the value
pub struct OutWriter<'a> {
    sink: MutexGuard<'a, OutSink>,
}

impl Write for OutWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.sink {
            OutSink::Stdout(s) => s.write(buf),
            OutSink::Pager(p) => p.write(buf),
            OutSink::Buffer(b) => b.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.sink {
            OutSink::Stdout(s) => s.flush(),
            OutSink::Pager(p) => p.flush(),
            OutSink::Buffer(b) => b.flush(),
        }
    }
}

/// Writer over standard error
pub struct ErrWriter<'a> {
    sink: MutexGuard<'a, Box<dyn Write + Send>>,
}

impl Write for ErrWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Standard streams and terminal state for one invocation
pub struct IoStreams {
    input: Mutex<Box<dyn BufRead + Send>>,
    out: Mutex<OutSink>,
    err: Mutex<Box<dyn Write + Send>>,
    stdin_tty: bool,
    stdout_tty: bool,
    stderr_tty: bool,
    color: bool,
    width: Option<usize>,
    pager_command: Mutex<Option<String>>,
    pager: Mutex<Option<Child>>,
    progress: Mutex<Option<ProgressBar>>,
    alt_screen: Mutex<bool>,
}

impl std::fmt::Debug for IoStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStreams")
            .field("stdin_tty", &self.stdin_tty)
            .field("stdout_tty", &self.stdout_tty)
            .field("stderr_tty", &self.stderr_tty)
            .field("color", &self.color)
            .finish()
    }
}

impl IoStreams {
    /// Streams attached to the real process stdio
    pub fn system(env: &EnvVars) -> Self {
        let mut stdout_tty = io::stdout().is_terminal();
        let mut width = None;
        if let Some(force) = env.get(env::AZDO_FORCE_TTY) {
            stdout_tty = true;
            width = force.parse::<usize>().ok();
        }
        if let Ok(term) = std::env::var("TERM") {
            if term == "dumb" {
                stdout_tty = false;
            }
        }
        let color = color_enabled(env, stdout_tty);
        Self {
            input: Mutex::new(Box::new(io::BufReader::new(io::stdin()))),
            out: Mutex::new(OutSink::Stdout(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
            stdin_tty: io::stdin().is_terminal(),
            stdout_tty,
            stderr_tty: io::stderr().is_terminal(),
            color,
            width,
            pager_command: Mutex::new(env.first_of(env::PAGER_VARS).map(str::to_string)),
            pager: Mutex::new(None),
            progress: Mutex::new(None),
            alt_screen: Mutex::new(false),
        }
    }

    /// In-memory streams; nothing is a TTY and colour is off
    pub fn test() -> (Self, TestStreams) {
        Self::test_with_input("")
    }

    /// In-memory streams with the given standard input
    pub fn test_with_input(input: &str) -> (Self, TestStreams) {
        let streams = TestStreams::default();
        let io = Self {
            input: Mutex::new(Box::new(io::Cursor::new(input.as_bytes().to_vec()))),
            out: Mutex::new(OutSink::Buffer(streams.out.clone())),
            err: Mutex::new(Box::new(streams.err.clone())),
            stdin_tty: false,
            stdout_tty: false,
            stderr_tty: false,
            color: false,
            width: None,
            pager_command: Mutex::new(None),
            pager: Mutex::new(None),
            progress: Mutex::new(None),
            alt_screen: Mutex::new(false),
        };
        (io, streams)
    }

    /// Override TTY detection
    #[must_use]
    pub fn with_tty(mut self, stdin: bool, stdout: bool, stderr: bool) -> Self {
        self.stdin_tty = stdin;
        self.stdout_tty = stdout;
        self.stderr_tty = stderr;
        self
    }

    /// Override the colour decision
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Override the terminal width
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Whether stdin is a terminal
    pub fn is_stdin_tty(&self) -> bool {
        self.stdin_tty
    }

    /// Whether stdout is a terminal
    pub fn is_stdout_tty(&self) -> bool {
        self.stdout_tty
    }

    /// Whether stderr is a terminal
    pub fn is_stderr_tty(&self) -> bool {
        self.stderr_tty
    }

    /// Whether prompts can be shown at all
    pub fn can_prompt(&self) -> bool {
        self.stdin_tty && self.stdout_tty
    }

    /// Whether output should carry ANSI colour
    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// Terminal width in columns
    pub fn terminal_width(&self) -> usize {
        if let Some(width) = self.width {
            return width;
        }
        if !self.stdout_tty {
            return defaults::TERMINAL_WIDTH;
        }
        console::Term::stdout()
            .size_checked()
            .map(|(_, cols)| usize::from(cols))
            .filter(|cols| *cols > 0)
            .unwrap_or(defaults::TERMINAL_WIDTH)
    }

    /// Lock standard output for writing
    pub fn out(&self) -> OutWriter<'_> {
        OutWriter {
            sink: self.out.lock(),
        }
    }

    /// Lock standard error for writing
    pub fn err(&self) -> ErrWriter<'_> {
        ErrWriter {
            sink: self.err.lock(),
        }
    }

    /// Read one line from standard input, without the trailing newline
    pub fn read_line(&self) -> io::Result<String> {
        let mut line = String::new();
        self.input.lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read standard input to the end
    pub fn read_all(&self) -> io::Result<String> {
        let mut text = String::new();
        self.input.lock().read_to_string(&mut text)?;
        Ok(text)
    }

    /// Replace the pager command (config value taking part in precedence)
    pub fn set_pager_command(&self, command: Option<String>) {
        *self.pager_command.lock() = command;
    }

    /// Current pager command
    pub fn pager_command(&self) -> Option<String> {
        self.pager_command.lock().clone()
    }

    /// Redirect standard output through the pager when stdout is a TTY
    pub fn start_pager(&self) -> io::Result<()> {
        if !self.stdout_tty {
            return Ok(());
        }
        let command = match self.pager_command() {
            Some(c) if !c.trim().is_empty() && c.trim() != "cat" => c,
            _ => return Ok(()),
        };
        let argv = shell_words::split(&command)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::piped());
        if std::env::var_os("LESS").is_none() {
            cmd.env("LESS", "FRX");
        }
        if std::env::var_os("LV").is_none() {
            cmd.env("LV", "-c");
        }
        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "pager has no stdin"))?;
        tracing::debug!("started pager '{}'", command);
        *self.out.lock() = OutSink::Pager(stdin);
        *self.pager.lock() = Some(child);
        Ok(())
    }

    /// Close the pager pipe and wait for the pager to exit
    pub fn stop_pager(&self) {
        let child = self.pager.lock().take();
        if let Some(mut child) = child {
            // Dropping the previous sink closes the pipe
            *self.out.lock() = OutSink::Stdout(io::stdout());
            if let Err(e) = child.wait() {
                tracing::debug!("waiting for pager: {}", e);
            }
        }
    }

    /// Show a spinner on stderr when it is a terminal
    pub fn start_progress(&self, label: &str) {
        if !self.stderr_tty {
            return;
        }
        let mut progress = self.progress.lock();
        if let Some(pb) = progress.as_ref() {
            pb.set_message(label.to_string());
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.blue} {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        *progress = Some(pb);
    }

    /// Remove the spinner
    pub fn stop_progress(&self) {
        if let Some(pb) = self.progress.lock().take() {
            pb.finish_and_clear();
        }
    }

    /// Switch to the alternate screen buffer
    pub fn start_alternate_screen(&self) -> io::Result<()> {
        if !self.stdout_tty {
            return Ok(());
        }
        let mut active = self.alt_screen.lock();
        if *active {
            return Ok(());
        }
        let mut out = self.out();
        crossterm::execute!(out, crossterm::terminal::EnterAlternateScreen)?;
        *active = true;
        Ok(())
    }

    /// Leave the alternate screen buffer if it is active
    pub fn stop_alternate_screen(&self) -> io::Result<()> {
        let mut active = self.alt_screen.lock();
        if !*active {
            return Ok(());
        }
        let mut out = self.out();
        crossterm::execute!(out, crossterm::terminal::LeaveAlternateScreen)?;
        *active = false;
        Ok(())
    }

    /// Whether the alternate screen is active
    pub fn in_alternate_screen(&self) -> bool {
        *self.alt_screen.lock()
    }

    /// Put the terminal back into its normal state after an interrupt
    pub fn restore_terminal(&self) {
        self.stop_progress();
        if let Err(e) = self.stop_alternate_screen() {
            tracing::debug!("leaving alternate screen: {}", e);
        }
    }
}

impl Drop for IoStreams {
    fn drop(&mut self) {
        self.stop_progress();
        self.stop_pager();
    }
}

/// Colour decision from the environment and the stdout TTY state
fn color_enabled(env: &EnvVars, stdout_tty: bool) -> bool {
    if env.get(env::NO_COLOR).is_some() {
        return false;
    }
    if env.get(env::CLICOLOR_FORCE).is_some_and(|v| v != "0") {
        return true;
    }
    if env.get(env::CLICOLOR) == Some("0") {
        return false;
    }
    stdout_tty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_capture_output() {
        let (io, streams) = IoStreams::test();
        write!(io.out(), "hello").unwrap();
        write!(io.err(), "oops").unwrap();
        assert_eq!(streams.out.contents(), "hello");
        assert_eq!(streams.err.contents(), "oops");
    }

    #[test]
    fn test_read_line_strips_newline() {
        let (io, _) = IoStreams::test_with_input("token-value\r\nrest");
        assert_eq!(io.read_line().unwrap(), "token-value");
        assert_eq!(io.read_all().unwrap(), "rest");
    }

    #[test]
    fn test_color_rules() {
        assert!(!color_enabled(&EnvVars::from_pairs([("NO_COLOR", "1")]), true));
        assert!(color_enabled(&EnvVars::from_pairs([("CLICOLOR_FORCE", "1")]), false));
        assert!(!color_enabled(&EnvVars::from_pairs([("CLICOLOR", "0")]), true));
        assert!(color_enabled(&EnvVars::default(), true));
        assert!(!color_enabled(&EnvVars::default(), false));
    }

    #[test]
    fn test_pager_not_started_without_tty() {
        let (io, streams) = IoStreams::test();
        io.set_pager_command(Some("less".into()));
        io.start_pager().unwrap();
        write!(io.out(), "direct").unwrap();
        io.stop_pager();
        assert_eq!(streams.out.contents(), "direct");
    }

    #[test]
    fn test_alternate_screen_is_noop_without_tty() {
        let (io, streams) = IoStreams::test();
        io.start_alternate_screen().unwrap();
        assert!(!io.in_alternate_screen());
        assert_eq!(streams.out.contents(), "");
    }

    #[test]
    fn test_alternate_screen_round_trip_on_tty() {
        let (io, streams) = IoStreams::test();
        let io = io.with_tty(true, true, false);
        io.start_alternate_screen().unwrap();
        assert!(io.in_alternate_screen());
        io.stop_alternate_screen().unwrap();
        assert!(!io.in_alternate_screen());
        let written = streams.out.contents();
        assert!(written.contains("\x1b[?1049h"));
        assert!(written.contains("\x1b[?1049l"));
    }

    #[test]
    fn test_restore_terminal_leaves_alternate_screen() {
        let (io, streams) = IoStreams::test();
        let io = io.with_tty(true, true, false);
        io.start_alternate_screen().unwrap();
        io.restore_terminal();
        assert!(!io.in_alternate_screen());
        assert!(streams.out.contents().ends_with("\x1b[?1049l"));
        io.restore_terminal();
        assert_eq!(streams.out.contents().matches("\x1b[?1049l").count(), 1);
    }

    #[test]
    fn test_width_defaults_when_not_tty() {
        let (io, _) = IoStreams::test();
        assert_eq!(io.terminal_width(), defaults::TERMINAL_WIDTH);
        let io = io.with_width(132);
        assert_eq!(io.terminal_width(), 132);
    }
}
