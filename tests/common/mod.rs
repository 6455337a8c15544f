//! Common test utilities for lish integration tests

use lish::{InputStream, LineReader, Shell};
use std::collections::VecDeque;
use std::io;

/// Interactive device replaying scripted lines, then answering `exit`
/// forever so a test session always terminates.
pub struct ScriptedReader {
    lines: VecDeque<String>,
}

impl ScriptedReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineReader for ScriptedReader {
    fn read_line(&mut self, _prompt: &str, _show_prompt: bool) -> io::Result<String> {
        Ok(self.lines.pop_front().unwrap_or_else(|| "exit".to_string()))
    }
}

/// Shell whose stream is preloaded with `script`; once the buffer is
/// exhausted the interactive device answers `exit`.
pub fn scripted_shell(script: &str) -> Shell {
    let mut stream = InputStream::with_reader(Box::new(ScriptedReader::new(Vec::<String>::new())));
    stream.write(script);
    Shell::with_stream(stream)
}
