//! lish - a lightweight batch-style command shell
//!
//! # Overview
//!
//! lish executes typed command lines the way classic batch interpreters do:
//! every line is read from a replayable stream, variable references are
//! resolved, and the result is dispatched to a builtin. Batch scripts are
//! not parsed up front; they are spliced into the pending-line stream and
//! replayed as if typed, which is what makes labels and jumps work.
//!
//! # Mini-language
//!
//! ```text
//! $name, ${name}       # variable reference, expanded transitively
//! $$                   # literal dollar sign
//! @ON / @OFF           # control lines toggling echo
//! :EOF                 # control line ending an injected segment
//! :anything-else       # label: skipped as a command, target for goto/if
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lish::Shell;
//!
//! let mut shell = Shell::new().unwrap();
//! shell.stream().write("set who world\necho hello $who");
//! shell.run().unwrap();
//! ```
//!
//! The two engine pieces are usable on their own: [`Environment`] for
//! variable resolution and integer arithmetic, [`InputStream`] for the
//! pending-line buffer with its cursor, sentinels and jumps.

pub mod env;
pub mod shell;
pub mod stream;

// Re-export commonly used items
pub use env::{Environment, ExprError, ResolveError};
pub use shell::{Shell, ShellError, PROMPT};
pub use stream::{InputStream, LineReader, Readline, StreamError};
pub use stream::{ECHO_OFF, ECHO_ON, STREAM_EOF};
pub use stream::{FORCE_STDIN, FORCE_STDOUT, FORCE_STREAM};
