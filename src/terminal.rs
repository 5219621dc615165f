//! Terminal interaction adapter.
//!
//! Prompts go to stderr so stdout stays a single JSON document. Answers are
//! read line by line; end of input counts as a cancellation.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

use testfind_core::interaction::{InteractionAdapter, InteractionError, InteractionResult};

/// Adapter reading answers from a line source and writing prompts to a sink.
pub struct TerminalAdapter {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
    interactive: bool,
}

impl TerminalAdapter {
    /// stdin/stderr; interactive only when both are terminals.
    pub fn stdio() -> Self {
        let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
        TerminalAdapter {
            input: Mutex::new(Box::new(io::BufReader::new(io::stdin()))),
            output: Mutex::new(Box::new(io::stderr())),
            interactive,
        }
    }

    /// Adapter over explicit streams, always interactive.
    pub fn with_streams(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        TerminalAdapter {
            input: Mutex::new(input),
            output: Mutex::new(output),
            interactive: true,
        }
    }

    fn write(&self, text: &str) -> InteractionResult<()> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| InteractionError::other("output stream poisoned"))?;
        output.write_all(text.as_bytes())?;
        output.flush()?;
        Ok(())
    }

    fn read_line(&self) -> InteractionResult<String> {
        let mut input = self
            .input
            .lock()
            .map_err(|_| InteractionError::other("input stream poisoned"))?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(InteractionError::Cancelled);
        }
        Ok(line.trim().to_string())
    }
}

impl InteractionAdapter for TerminalAdapter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn ask_text(&self, prompt: &str, default: Option<&str>) -> InteractionResult<String> {
        match default {
            Some(default) => self.write(&format!("{prompt} [{default}] "))?,
            None => self.write(prompt)?,
        }
        let answer = self.read_line()?;
        match (answer.is_empty(), default) {
            (true, Some(default)) => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn ask_select(&self, prompt: &str, options: &[&str]) -> InteractionResult<usize> {
        if options.is_empty() {
            return Err(InteractionError::InvalidInput(
                "options cannot be empty".to_string(),
            ));
        }
        let menu: Vec<String> = options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("{i}: {option}"))
            .collect();
        self.write(&format!("{}\n{prompt} ", menu.join("\n")))?;
        let answer = self.read_line()?;
        match answer.parse::<usize>() {
            Ok(index) if index < options.len() => Ok(index),
            _ => Err(InteractionError::InvalidInput(answer)),
        }
    }

    fn ask_confirm(&self, prompt: &str, default: bool) -> InteractionResult<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        self.write(&format!("{prompt} {hint} "))?;
        let answer = self.read_line()?.to_ascii_lowercase();
        Ok(match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }

    fn print_info(&self, message: &str) {
        let _ = self.write(&format!("{message}\n"));
    }

    fn print_warning(&self, message: &str) {
        let _ = self.write(&format!("warning: {message}\n"));
    }
}
