//! Session driver: one environment, one input stream, a handful of builtins.
//!
//! The driver loop is deliberately thin. Each turn it pulls a raw line from
//! the stream, resolves variable references, splits on whitespace, and
//! dispatches on the command word. Commands close the loop by writing back
//! into the stream (`for`, `call`), jumping it (`goto`, `if`), or mutating
//! the environment (`set`, `eval`). After every command the `errorlevel`
//! variable records the outcome, so scripts can branch on failures.

use crate::env::{Environment, ExprError, ResolveError};
use crate::stream::{InputStream, StreamError, FORCE_STREAM};
use chrono::{Local, Utc};
use std::fs;
use thiserror::Error;

/// Prompt shown for interactive reads (and echoed before replayed lines).
pub const PROMPT: &str = "lish> ";

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

/// One shell session. Owns exactly one [`Environment`] and one
/// [`InputStream`]; neither is shared or copied.
pub struct Shell {
    env: Environment,
    stream: InputStream,
    running: bool,
}

impl Shell {
    /// Session backed by the interactive terminal.
    pub fn new() -> Result<Self, ShellError> {
        Ok(Self::with_stream(InputStream::new()?))
    }

    /// Session over a caller-supplied stream (tests, embedding).
    pub fn with_stream(stream: InputStream) -> Self {
        let mut env = Environment::new();
        env.set_value("errorlevel", "0");
        Self {
            env,
            stream,
            running: true,
        }
    }

    pub fn env(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn stream(&mut self) -> &mut InputStream {
        &mut self.stream
    }

    /// Splice a script file in at the cursor, followed by the stream footer
    /// so the segment terminates cleanly and restores the echo state.
    pub fn source(&mut self, path: &str) -> Result<(), ShellError> {
        let mut script = fs::read_to_string(path)?;
        self.stream.append_footer(&mut script);
        self.stream.write(&script);
        Ok(())
    }

    /// Drive the session until `exit`. Command failures are reported and
    /// recorded in `errorlevel`; only read errors abort the loop.
    pub fn run(&mut self) -> Result<(), ShellError> {
        while self.running {
            let line = self.stream.next_line(PROMPT, 0)?;
            match self.execute(&line) {
                Ok(()) => {
                    self.env.set_value("errorlevel", "0");
                }
                Err(err) => {
                    eprintln!("{err}");
                    self.env.set_value("errorlevel", "1");
                }
            }
        }
        Ok(())
    }

    /// Resolve and dispatch a single command line.
    pub fn execute(&mut self, line: &str) -> Result<(), ShellError> {
        let line = self.env.resolve(line)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = tokens.split_first() else {
            return Ok(());
        };

        match name {
            "echo" => println!("{}", args.join(" ")),
            "set" => self.cmd_set(args),
            "eval" => self.cmd_eval(args)?,
            "if" => self.cmd_if(args)?,
            "goto" => self.cmd_goto(args)?,
            "for" => self.cmd_for(args)?,
            "call" => self.cmd_call(args)?,
            "date" => cmd_date(),
            "help" => cmd_help(),
            "exit" => self.running = false,
            other => return Err(ShellError::UnknownCommand(other.to_string())),
        }
        Ok(())
    }

    /// `set` lists the table; `set <name> <value…>` assigns.
    fn cmd_set(&mut self, args: &[&str]) {
        match args.split_first() {
            None => {
                for (name, value) in self.env.get_values() {
                    println!("{name}={value}");
                }
            }
            Some((&name, rest)) => {
                self.env.set_value(name, rest.join(" "));
            }
        }
    }

    /// `eval <expr…> [into <name>]` evaluates integer arithmetic and prints
    /// the result or stores it in a variable.
    fn cmd_eval(&mut self, args: &[&str]) -> Result<(), ShellError> {
        if args.is_empty() {
            return Err(ShellError::Usage("eval <expr> [into <name>]"));
        }
        let (expr, target) = match args.len().checked_sub(2) {
            Some(split) if args[split] == "into" => (&args[..split], Some(args[split + 1])),
            _ => (args, None),
        };
        let value = self.env.eval_ll(&expr.join(" "))?;
        match target {
            Some(name) => {
                self.env.set_value(name, value.to_string());
            }
            None => println!("{value}"),
        }
        Ok(())
    }

    /// `if <expr> <cmp> <expr> <label>` jumps when the comparison holds.
    fn cmd_if(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let &[lhs, cmp, rhs, label] = args else {
            return Err(ShellError::Usage("if <expr> <cmp> <expr> <label>"));
        };
        let lhs = self.env.eval_ll(lhs)?;
        let rhs = self.env.eval_ll(rhs)?;
        let holds = match cmp {
            "==" => lhs == rhs,
            "!=" => lhs != rhs,
            "<" => lhs < rhs,
            "<=" => lhs <= rhs,
            ">" => lhs > rhs,
            ">=" => lhs >= rhs,
            _ => return Err(ShellError::Usage("if: comparator is one of == != < <= > >=")),
        };
        if holds {
            self.stream.jump(label)?;
        }
        Ok(())
    }

    fn cmd_goto(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let &[label] = args else {
            return Err(ShellError::Usage("goto <label>"));
        };
        self.stream.jump(label)?;
        Ok(())
    }

    /// `for <var> [<start>] <end>` iterates `var` over `start..end` (end
    /// exclusive, descending when `start > end`). The body (the following
    /// lines up to the matching `endfor`) is unrolled into `set`-prefixed
    /// copies and spliced back in at the cursor.
    fn cmd_for(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let (var, start, end) = match *args {
            [var, end] => (var, 0, self.env.eval_ll(end)?),
            [var, start, end] => (var, self.env.eval_ll(start)?, self.env.eval_ll(end)?),
            _ => return Err(ShellError::Usage("for <var> [<start>] <end>")),
        };

        let body = self.collect_for_body()?;
        let mut unrolled = Vec::new();
        let step = if start <= end { 1 } else { -1 };
        let mut value = start;
        while value != end {
            unrolled.push(format!("set {var} {value}"));
            unrolled.extend(body.iter().cloned());
            value += step;
        }
        self.stream.write_lines(unrolled);
        Ok(())
    }

    /// Read body lines until the `endfor` matching this `for`, counting
    /// nested pairs. Body lines come from the buffer when it has content
    /// (a script must contain its own `endfor`), interactively otherwise.
    fn collect_for_body(&mut self) -> Result<Vec<String>, ShellError> {
        let flags = if self.stream.eof() { 0 } else { FORCE_STREAM };
        let mut body = Vec::new();
        let mut depth = 1u32;
        loop {
            let line = self.stream.next_line("for> ", flags)?;
            if line.starts_with("for ") {
                depth += 1;
            } else if line == "endfor" {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            body.push(line);
        }
        Ok(body)
    }

    /// `call <script>` splices a batch script in at the cursor.
    fn cmd_call(&mut self, args: &[&str]) -> Result<(), ShellError> {
        let &[path] = args else {
            return Err(ShellError::Usage("call <script>"));
        };
        self.source(path)
    }
}

fn cmd_date() {
    let format = "%A %d/%m/%Y %H:%M:%S";
    println!("System time (UTC): {}", Utc::now().format(format));
    println!("Local time: {}", Local::now().format(format));
}

fn cmd_help() {
    println!("Builtin commands:");
    println!("  echo <text>                  Print text (after variable resolution)");
    println!("  set [<name> <value>]         Assign a variable, or list them all");
    println!("  eval <expr> [into <name>]    Integer arithmetic; print or store");
    println!("  if <a> <cmp> <b> <label>     Jump to <label> when the comparison holds");
    println!("  goto <label>                 Jump to a :label line");
    println!("  for <var> [<start>] <end>    Unroll the lines up to endfor");
    println!("  call <script>                Splice a batch script into the stream");
    println!("  date                         Show the current UTC and local time");
    println!("  exit                         Leave the shell");
    println!();
    println!("Control lines: @ON/@OFF toggle echo, :EOF ends an injected segment,");
    println!("other lines starting with ':' are labels for goto/if.");
}
