//! Input stream management: a replayable line buffer with interactive fallback.
//!
//! The shell reads every command through [`InputStream::next_line`]. Lines
//! come from the pending-line buffer while it has content (batch scripts
//! spliced in with [`InputStream::write`], jump targets reached with
//! [`InputStream::jump`]) and fall back to the interactive device once the
//! buffer is exhausted.
//!
//! Three sentinel lines carry control meaning and are never returned to the
//! caller: `@ON`/`@OFF` toggle echo, `:EOF` marks the end of an injected
//! segment and drops consumed history. Any other line starting with `:` is a
//! label: skipped as a command, but matchable by `jump`.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;
use thiserror::Error;

/// Sentinel line that turns echo on.
pub const ECHO_ON: &str = "@ON";
/// Sentinel line that turns echo off.
pub const ECHO_OFF: &str = "@OFF";
/// Sentinel line that ends an injected segment and clears consumed history.
pub const STREAM_EOF: &str = ":EOF";

/// Read from the interactive device even if buffered lines remain.
pub const FORCE_STDIN: u32 = 1 << 0;
/// Read from the buffer only; running out of buffered input is an error.
pub const FORCE_STREAM: u32 = 1 << 1;
/// Always show the prompt, regardless of the echo state.
pub const FORCE_STDOUT: u32 = 1 << 2;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Arguments conflict: FORCE_STDIN and FORCE_STREAM")]
    ConflictingFlags,
    #[error("Unexpected end of input while reading")]
    UnexpectedEof,
    #[error("Label {0:?} not found")]
    LabelNotFound(String),
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// The interactive input device behind [`InputStream`].
///
/// Production code uses the rustyline-backed [`Readline`]; tests inject
/// scripted readers.
pub trait LineReader {
    /// Read one line, displaying `prompt` only when `show_prompt` is true.
    /// Interrupted or end-of-input reads should map to an empty line so the
    /// caller's re-prompt loop stays in charge.
    fn read_line(&mut self, prompt: &str, show_prompt: bool) -> io::Result<String>;
}

/// [`LineReader`] over a rustyline editor with history.
pub struct Readline {
    editor: DefaultEditor,
}

impl Readline {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineReader for Readline {
    fn read_line(&mut self, prompt: &str, show_prompt: bool) -> io::Result<String> {
        match self.editor.readline(if show_prompt { prompt } else { "" }) {
            Ok(line) => {
                let _ = self.editor.add_history_entry(line.as_str());
                Ok(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                Ok(String::new())
            }
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    }
}

/// Ordered buffer of pending lines plus a cursor, owned by one shell session.
///
/// Lines strictly before the cursor are consumed history: still reachable by
/// a backward [`InputStream::jump`] until [`InputStream::clear`] (or an
/// `:EOF` sentinel) drops them. Deliberately not `Clone`.
pub struct InputStream {
    lines: Vec<String>,
    cursor: usize,
    /// Whether consumed lines are echoed and the interactive prompt shown.
    pub echo: bool,
    reader: Box<dyn LineReader>,
}

impl InputStream {
    /// Stream backed by the interactive terminal.
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self::with_reader(Box::new(Readline::new()?)))
    }

    /// Stream backed by a caller-supplied interactive device.
    pub fn with_reader(reader: Box<dyn LineReader>) -> Self {
        Self {
            lines: Vec::new(),
            cursor: 0,
            echo: true,
            reader,
        }
    }

    /// The first non-blank pending line, trimmed, without consuming it.
    pub fn peek(&self) -> Option<String> {
        self.lines[self.cursor..]
            .iter()
            .map(|line| line.trim())
            .find(|text| !text.is_empty())
            .map(str::to_string)
    }

    /// The echo state after the next command: an upcoming `@ON`/`@OFF`
    /// sentinel decides it, otherwise the current flag stands.
    pub fn peek_echo(&self) -> bool {
        match self.peek().as_deref() {
            Some(ECHO_ON) => true,
            Some(ECHO_OFF) => false,
            _ => self.echo,
        }
    }

    /// Whether the prompt (and the echo of a consumed line) should be
    /// visible right now: echo must be on both currently and after the
    /// pending sentinel, if any.
    fn prompt_visible(&self) -> bool {
        self.echo && self.peek_echo()
    }

    /// Read the next command line.
    ///
    /// Consumes buffered lines while any remain (or the interactive device
    /// when `FORCE_STDIN` is set or the buffer is exhausted), handling
    /// sentinel lines in place: echo toggles, `:EOF` history drops, label
    /// and comment skips. Only an ordinary line, trimmed, is returned.
    ///
    /// Errors: `FORCE_STDIN` combined with `FORCE_STREAM`, or `FORCE_STREAM`
    /// when no buffered input remains.
    pub fn next_line(&mut self, prompt: &str, flags: u32) -> Result<String, StreamError> {
        if flags & FORCE_STDIN != 0 && flags & FORCE_STREAM != 0 {
            return Err(StreamError::ConflictingFlags);
        }

        loop {
            if flags & FORCE_STREAM != 0 && self.eof() {
                return Err(StreamError::UnexpectedEof);
            }

            if flags & FORCE_STDIN != 0 || self.eof() {
                let show_prompt = flags & FORCE_STDOUT != 0 || self.prompt_visible();
                let line = self.reader.read_line(prompt, show_prompt)?;
                let line = line.trim();
                match line {
                    ECHO_OFF => self.echo = false,
                    ECHO_ON => self.echo = true,
                    STREAM_EOF => self.clear(),
                    "" => {}
                    _ if line.starts_with(':') => {}
                    _ => return Ok(line.to_string()),
                }
                continue;
            }

            let line = self.lines[self.cursor].trim().to_string();
            self.cursor += 1;
            // Decided after consuming: a sentinel directly after this line
            // suppresses its echo.
            let echo_state = self.prompt_visible();
            match line.as_str() {
                ECHO_OFF => self.echo = false,
                ECHO_ON => self.echo = true,
                STREAM_EOF => {
                    self.clear();
                    if flags & FORCE_STREAM != 0 {
                        return Err(StreamError::UnexpectedEof);
                    }
                }
                _ if !line.is_empty() && line.starts_with(':') => {}
                _ => {
                    if echo_state {
                        println!("{prompt}{line}");
                    }
                    return Ok(line);
                }
            }
        }
    }

    /// Splice lines in at the cursor, making them the next lines read.
    /// The cursor is left pointing at the first inserted line.
    pub fn write_lines<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        let inserted: Vec<String> = lines.into_iter().collect();
        self.lines.splice(self.cursor..self.cursor, inserted);
    }

    /// Split `data` on newlines, trim each line and drop blanks, then
    /// splice the rest in at the cursor.
    pub fn write(&mut self, data: &str) {
        let lines: Vec<String> = data
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        self.write_lines(lines);
    }

    /// Discard all consumed history. Lines before the cursor can no longer
    /// be replayed or jumped to.
    pub fn clear(&mut self) {
        self.lines.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Whether the cursor is at the end of the buffer.
    pub fn eof(&self) -> bool {
        self.cursor >= self.lines.len()
    }

    /// Move the cursor to the line equal to `label` (after trimming):
    /// forward from the cursor first, then wrapping around from the start
    /// of retained history. The wraparound is what allows backward jumps to
    /// re-execute consumed-but-not-cleared lines.
    pub fn jump(&mut self, label: &str) -> Result<(), StreamError> {
        for index in self.cursor..self.lines.len() {
            if self.lines[index].trim() == label {
                self.cursor = index;
                return Ok(());
            }
        }

        for index in 0..self.cursor {
            if self.lines[index].trim() == label {
                self.cursor = index;
                return Ok(());
            }
        }

        Err(StreamError::LabelNotFound(label.to_string()))
    }

    /// Append the stream footer to `buffer`: a blank line, the end-of-stream
    /// sentinel, and the sentinel restoring the current echo state. Injected
    /// content carrying this footer terminates cleanly and leaves echo as it
    /// found it.
    pub fn append_footer(&self, buffer: &mut String) {
        buffer.push('\n');
        buffer.push_str(STREAM_EOF);
        buffer.push('\n');
        buffer.push_str(if self.echo { ECHO_ON } else { ECHO_OFF });
        buffer.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Interactive device for buffered-only tests: any read is a test bug.
    struct NoInput;

    impl LineReader for NoInput {
        fn read_line(&mut self, _prompt: &str, _show_prompt: bool) -> io::Result<String> {
            panic!("test unexpectedly fell back to interactive input");
        }
    }

    /// Interactive device replaying scripted lines.
    struct Scripted {
        lines: VecDeque<String>,
    }

    impl Scripted {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl LineReader for Scripted {
        fn read_line(&mut self, _prompt: &str, _show_prompt: bool) -> io::Result<String> {
            Ok(self.lines.pop_front().expect("script ran out of lines"))
        }
    }

    /// Interactive device recording the `show_prompt` value of every read.
    struct Recording {
        lines: VecDeque<String>,
        shown: Rc<RefCell<Vec<bool>>>,
    }

    impl Recording {
        fn new(lines: &[&str], shown: Rc<RefCell<Vec<bool>>>) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                shown,
            }
        }
    }

    impl LineReader for Recording {
        fn read_line(&mut self, _prompt: &str, show_prompt: bool) -> io::Result<String> {
            self.shown.borrow_mut().push(show_prompt);
            Ok(self.lines.pop_front().expect("script ran out of lines"))
        }
    }

    fn buffered(lines: &[&str]) -> InputStream {
        let mut stream = InputStream::with_reader(Box::new(NoInput));
        stream.write_lines(lines.iter().map(|s| s.to_string()));
        stream
    }

    #[test]
    fn test_buffered_lines_skip_labels() {
        let mut stream = buffered(&["echo hi", ":loop", "echo again", ":EOF"]);
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo hi");
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo again");
    }

    #[test]
    fn test_jump_backward_then_reread() {
        let mut stream = buffered(&["echo hi", ":loop", "echo again", ":EOF"]);
        stream.next_line("> ", 0).unwrap();
        stream.next_line("> ", 0).unwrap();
        stream.jump(":loop").unwrap();
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo again");
    }

    #[test]
    fn test_jump_prefers_forward_match() {
        let mut stream = buffered(&[":here", "echo first", ":here", "echo second"]);
        stream.next_line("> ", 0).unwrap();
        stream.jump(":here").unwrap();
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo second");
    }

    #[test]
    fn test_jump_unknown_label_fails() {
        let mut stream = buffered(&["echo hi"]);
        assert!(matches!(
            stream.jump(":nowhere"),
            Err(StreamError::LabelNotFound(label)) if label == ":nowhere"
        ));
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let mut stream = buffered(&["echo hi"]);
        assert!(matches!(
            stream.next_line("> ", FORCE_STDIN | FORCE_STREAM),
            Err(StreamError::ConflictingFlags)
        ));
    }

    #[test]
    fn test_force_stream_at_eof_fails() {
        let mut stream = buffered(&[]);
        assert!(matches!(
            stream.next_line("> ", FORCE_STREAM),
            Err(StreamError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_force_stream_hitting_eof_sentinel_fails() {
        let mut stream = buffered(&[":EOF", "echo later"]);
        assert!(matches!(
            stream.next_line("> ", FORCE_STREAM),
            Err(StreamError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_write_splits_trims_and_drops_blanks() {
        let mut stream = buffered(&[]);
        stream.write("a\n\n  b  \n");
        assert_eq!(stream.next_line("> ", 0).unwrap(), "a");
        assert_eq!(stream.next_line("> ", 0).unwrap(), "b");
    }

    #[test]
    fn test_write_splices_at_cursor() {
        let mut stream = buffered(&["echo tail"]);
        stream.write("echo head");
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo head");
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo tail");
    }

    #[test]
    fn test_echo_sentinels_toggle_state() {
        let mut stream = buffered(&["@OFF", "echo quiet", "@ON", "echo loud"]);
        assert!(stream.echo);
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo quiet");
        assert!(!stream.echo);
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo loud");
        assert!(stream.echo);
    }

    #[test]
    fn test_eof_sentinel_drops_history() {
        let mut stream = buffered(&["echo a", ":EOF", "echo b"]);
        stream.next_line("> ", 0).unwrap();
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo b");
        // "echo a" and the sentinel are gone; only "echo b" is retained.
        assert!(stream.jump("echo a").is_err());
        assert!(stream.eof());
    }

    #[test]
    fn test_clear_forgets_consumed_lines() {
        let mut stream = buffered(&[":top", "echo x", "echo y"]);
        stream.next_line("> ", 0).unwrap();
        stream.clear();
        assert!(matches!(stream.jump(":top"), Err(StreamError::LabelNotFound(_))));
        assert_eq!(stream.next_line("> ", 0).unwrap(), "echo y");
    }

    #[test]
    fn test_peek_skips_blank_lines() {
        let mut stream = buffered(&[]);
        stream.write_lines(vec!["".to_string(), "   ".to_string(), " echo hi ".to_string()]);
        assert_eq!(stream.peek().as_deref(), Some("echo hi"));
        // Peeking does not consume.
        assert_eq!(stream.peek().as_deref(), Some("echo hi"));
    }

    #[test]
    fn test_peek_none_when_only_blanks_remain() {
        let mut stream = buffered(&[]);
        stream.write_lines(vec!["  ".to_string()]);
        assert_eq!(stream.peek(), None);
    }

    #[test]
    fn test_peek_echo_reports_upcoming_sentinel() {
        let mut stream = buffered(&["@OFF", "echo hi"]);
        assert!(stream.echo);
        assert!(!stream.peek_echo());

        let mut stream = buffered(&["@ON"]);
        stream.echo = false;
        assert!(stream.peek_echo());

        let stream = buffered(&["echo hi"]);
        assert!(stream.peek_echo());
    }

    #[test]
    fn test_eof_tracks_cursor() {
        let mut stream = buffered(&["echo hi"]);
        assert!(!stream.eof());
        stream.next_line("> ", 0).unwrap();
        assert!(stream.eof());
    }

    #[test]
    fn test_append_footer_restores_echo_state() {
        let mut stream = buffered(&[]);
        let mut buffer = String::from("echo hi");
        stream.append_footer(&mut buffer);
        assert_eq!(buffer, "echo hi\n:EOF\n@ON\n");

        stream.echo = false;
        let mut buffer = String::new();
        stream.append_footer(&mut buffer);
        assert_eq!(buffer, "\n:EOF\n@OFF\n");
    }

    #[test]
    fn test_interactive_fallback_skips_control_lines() {
        let mut stream = InputStream::with_reader(Box::new(Scripted::new(&[
            "",
            "@OFF",
            ":comment",
            "  hello  ",
        ])));
        assert_eq!(stream.next_line("> ", 0).unwrap(), "hello");
        assert!(!stream.echo);
    }

    #[test]
    fn test_force_stdin_ignores_buffer() {
        let mut stream = InputStream::with_reader(Box::new(Scripted::new(&["typed"])));
        stream.write("buffered");
        assert_eq!(stream.next_line("> ", FORCE_STDIN).unwrap(), "typed");
        // The buffered line is still there for the next ordinary read.
        assert_eq!(stream.next_line("> ", 0).unwrap(), "buffered");
    }

    #[test]
    fn test_prompt_shown_by_default() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let mut stream =
            InputStream::with_reader(Box::new(Recording::new(&["typed"], Rc::clone(&shown))));
        assert_eq!(stream.next_line("> ", 0).unwrap(), "typed");
        assert_eq!(*shown.borrow(), vec![true]);
    }

    #[test]
    fn test_force_stdout_shows_prompt_despite_echo_off() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let mut stream =
            InputStream::with_reader(Box::new(Recording::new(&["typed"], Rc::clone(&shown))));
        stream.echo = false;
        assert_eq!(stream.next_line("> ", FORCE_STDOUT).unwrap(), "typed");
        assert_eq!(*shown.borrow(), vec![true]);
    }

    #[test]
    fn test_prompt_hidden_when_echo_off_pending() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let mut stream =
            InputStream::with_reader(Box::new(Recording::new(&["typed"], Rc::clone(&shown))));
        stream.write("@OFF");
        // Echo is still on, but the buffered @OFF already decides against
        // the prompt for this read.
        assert!(stream.echo);
        assert_eq!(stream.next_line("> ", FORCE_STDIN).unwrap(), "typed");
        assert_eq!(*shown.borrow(), vec![false]);
    }

    #[test]
    fn test_echo_decision_sees_pending_sentinel() {
        // next_line consults this decision after consuming a line, so a
        // line directly before @OFF is not echoed.
        let stream = buffered(&["@OFF", "echo quiet"]);
        assert!(stream.echo);
        assert!(!stream.prompt_visible());

        let stream = buffered(&["echo hi"]);
        assert!(stream.prompt_visible());

        let mut stream = buffered(&["@ON"]);
        stream.echo = false;
        assert!(!stream.prompt_visible());
    }

    #[test]
    fn test_interactive_eof_sentinel_clears_history() {
        let mut stream = InputStream::with_reader(Box::new(Scripted::new(&[":EOF", "next"])));
        stream.write("echo a\necho b");
        stream.next_line("> ", 0).unwrap();
        stream.next_line("> ", 0).unwrap();
        // Buffer exhausted; the typed :EOF drops history, then "next" returns.
        assert_eq!(stream.next_line("> ", 0).unwrap(), "next");
        assert!(stream.jump("echo a").is_err());
    }
}
