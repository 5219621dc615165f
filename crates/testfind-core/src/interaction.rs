//! Interaction adapter trait for mode-agnostic user prompts
//!
//! Finders occasionally need a human decision: several source files match a
//! class name, a module declares several test configs, or fuzzy matching has a
//! single "did you mean" candidate. Those decisions go through
//! `InteractionAdapter` so the engine never touches the terminal directly:
//!
//! - **CLI mode**: the `tfind` binary supplies a terminal adapter
//! - **Non-interactive mode**: `NonInteractiveAdapter` answers with defaults
//!
//! The trait is object-safe, allowing it to be used as `dyn InteractionAdapter`.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::error::{FinderError, FinderResult};

/// Error type for interaction operations
#[derive(Error, Debug)]
pub enum InteractionError {
    /// User cancelled the operation (e.g., pressed Ctrl+C or closed stdin)
    #[error("operation cancelled by user")]
    Cancelled,

    /// Standard input is not a TTY (e.g., running in CI or piped input)
    #[error("stdin is not a TTY - interactive input unavailable")]
    NonTty,

    /// IO error during interaction
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Other interaction error
    #[error("{0}")]
    Other(String),
}

impl InteractionError {
    /// Create a new IO error
    pub fn io(err: impl fmt::Display) -> Self {
        Self::Io(err.to_string())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<std::io::Error> for InteractionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for interaction operations
pub type InteractionResult<T> = Result<T, InteractionError>;

/// Trait for abstracting user interaction across execution modes
///
/// Implementations:
///
/// - `TerminalAdapter` (in the `testfind` crate): prompts on stderr, reads stdin
/// - `NonInteractiveAdapter`: returns defaults, for CI and non-TTY environments
///
/// # Example
///
/// ```ignore
/// fn confirm_guess(adapter: &dyn InteractionAdapter, guess: &str) -> InteractionResult<bool> {
///     adapter.ask_confirm(&format!("Did you mean {guess}?"), true)
/// }
/// ```
pub trait InteractionAdapter: Send + Sync {
    /// Whether answers come from a human.
    ///
    /// Non-interactive adapters make the engine take every candidate instead
    /// of showing a selection menu.
    fn is_interactive(&self) -> bool;

    /// Ask the user for free text input
    ///
    /// # Errors
    /// Returns `InteractionError::Cancelled` if user cancels, `NonTty` if not interactive
    fn ask_text(&self, prompt: &str, default: Option<&str>) -> InteractionResult<String>;

    /// Ask the user to select one option from a list
    ///
    /// # Returns
    /// The index of the selected option (0-based)
    ///
    /// # Errors
    /// Returns `InvalidInput` if options is empty
    fn ask_select(&self, prompt: &str, options: &[&str]) -> InteractionResult<usize>;

    /// Ask the user a yes/no confirmation question
    fn ask_confirm(&self, prompt: &str, default: bool) -> InteractionResult<bool>;

    /// Print an informational message
    fn print_info(&self, message: &str);

    /// Print a warning message
    fn print_warning(&self, message: &str);
}

// ============================================================================
// Non-interactive adapter
// ============================================================================

/// Adapter for CI and piped runs: never blocks, answers with defaults.
#[derive(Debug, Clone, Default)]
pub struct NonInteractiveAdapter {
    assume_yes: bool,
}

impl NonInteractiveAdapter {
    /// Create an adapter that answers confirmations with their default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an adapter that answers every confirmation with "yes".
    pub fn assume_yes() -> Self {
        Self { assume_yes: true }
    }
}

impl InteractionAdapter for NonInteractiveAdapter {
    fn is_interactive(&self) -> bool {
        false
    }

    fn ask_text(&self, _prompt: &str, default: Option<&str>) -> InteractionResult<String> {
        default
            .map(str::to_string)
            .ok_or(InteractionError::NonTty)
    }

    fn ask_select(&self, _prompt: &str, options: &[&str]) -> InteractionResult<usize> {
        if options.is_empty() {
            return Err(InteractionError::InvalidInput(
                "options cannot be empty".to_string(),
            ));
        }
        Ok(0)
    }

    fn ask_confirm(&self, _prompt: &str, default: bool) -> InteractionResult<bool> {
        Ok(self.assume_yes || default)
    }

    fn print_info(&self, message: &str) {
        debug!(message, "interaction info");
    }

    fn print_warning(&self, message: &str) {
        debug!(message, "interaction warning");
    }
}

// ============================================================================
// Multi-candidate selection
// ============================================================================

const SELECTION_PROMPT: &str = "Please enter numbers of test to use. If none of the above \
options matched, keep searching for other possible tests.\n(multiple selection is supported, \
e.g. '1' or '0,1' or '0-2'): ";

/// Parse a selection answer such as `0`, `0,2`, `1-3` or `5-2` into indices.
///
/// Whitespace is ignored and ranges may run backwards. Any malformed token, or
/// any index above `limit`, yields an empty set.
pub fn parse_selection(answer: &str, limit: usize) -> BTreeSet<usize> {
    let compact: String = answer.chars().filter(|c| !c.is_whitespace()).collect();
    let mut selections = BTreeSet::new();
    for token in compact.split(',') {
        let bounds: Vec<&str> = token.split('-').collect();
        let parsed: Result<Vec<usize>, _> = bounds.iter().map(|n| n.parse::<usize>()).collect();
        let Ok(numbers) = parsed else {
            debug!(token, "invalid selection token");
            return BTreeSet::new();
        };
        let (start, end) = match numbers.as_slice() {
            [single] => (*single, *single),
            [a, b] if a <= b => (*a, *b),
            [a, b] => (*b, *a),
            _ => return BTreeSet::new(),
        };
        // Check bounds before expanding.
        if end > limit {
            debug!(token, limit, "selection out of range");
            return BTreeSet::new();
        }
        selections.extend(start..=end);
    }
    selections
}

/// Choose among several candidates.
///
/// Candidates are sorted. With at most one candidate, with `select_all`, or
/// with a non-interactive adapter, every candidate is returned. Otherwise a
/// numbered menu with trailing `All` and `Quit` entries is shown; choosing
/// `Quit` aborts with `SelectionAborted`.
pub fn extract_selected<I, S>(
    candidates: I,
    adapter: &dyn InteractionAdapter,
    select_all: bool,
) -> FinderResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut items: Vec<String> = candidates.into_iter().map(Into::into).collect();
    items.sort();
    items.dedup();
    if items.len() <= 1 || select_all || !adapter.is_interactive() {
        return Ok(items);
    }

    let all_index = items.len();
    let quit_index = items.len() + 1;
    let menu: Vec<String> = items
        .iter()
        .map(String::as_str)
        .chain(["All", "Quit"])
        .enumerate()
        .map(|(i, item)| format!("{i}: {item}"))
        .collect();
    adapter.print_info(&format!("Multiple tests found:\n{}", menu.join("\n")));

    let answer = adapter.ask_text(SELECTION_PROMPT, None)?;
    let selections = parse_selection(&answer, quit_index);
    if selections.is_empty() {
        adapter.print_warning("Invalid input detected.");
        return Ok(Vec::new());
    }
    if selections.contains(&all_index) {
        return Ok(items);
    }
    if selections.contains(&quit_index) {
        adapter.print_warning("Abort selection.");
        return Err(FinderError::SelectionAborted);
    }
    Ok(selections
        .into_iter()
        .filter_map(|i| items.get(i).cloned())
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
