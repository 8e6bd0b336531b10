//! Error types shared across the crate.

use crate::tokenizer::Token;
use smartstring::alias::String;
use thiserror::Error;

/// Raised while compiling a grammar or terminal set into tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Two completed rules compete for the same parser state.
    #[error("reduce-reduce conflict between `{rule1}` and `{rule2}`")]
    ReduceReduceConflict { rule1: String, rule2: String },

    /// A completed rule competes with an in-progress rule under LR(0).
    #[error("shift-reduce conflict between `{shift_rule}` and `{reduce_rule}`")]
    ShiftReduceConflict { shift_rule: String, reduce_rule: String },

    /// A terminal can never win the longest-match race: every string it
    /// accepts is claimed by a higher-priority terminal.
    #[error("terminal `{name}` (index {index}) can never be matched")]
    UnmatchableTerminal { index: usize, name: String },
}

/// Raised by [`crate::Parser::parse`] when the input does not belong to the
/// grammar's language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {}:{}: unexpected {:?}", .token.row, .token.column, .token.text)]
pub struct SyntaxError {
    /// The token that had no action in the current state.
    pub token: Token,
    /// Names of the terminals that would have been accepted instead.
    pub expected: Vec<String>,
}
