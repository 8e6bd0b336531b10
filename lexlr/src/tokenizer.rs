//! Subset construction and the longest-match scanner.
//!
//! A [`Tokenizer`] is compiled eagerly and exhaustively from an ordered list
//! of terminals: the combined state is the lockstep vector of all terminal
//! automata, every one of the 16 digit transitions is explored from every
//! reachable combined state, and the result is a dense transition table with
//! one accept classification per state. Terminal order is priority: when two
//! terminals accept the same text the lower index wins.

use crate::automaton::{Automaton, DIGITS};
use crate::error::CompileError;
use crate::terminal::Terminal;
use indexmap::IndexSet;
use smartstring::alias::String;
use std::collections::VecDeque;

/// Classification of one compiled scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// The highest-priority terminal matching the input consumed so far.
    Match(usize),
    /// Nothing matches yet but some terminal still can.
    Viable,
    /// No terminal can ever match from here.
    Dead,
}

/// A lexeme produced by [`Tokenizer::tokenize`].
///
/// `token_id` is the matched terminal's index, or `None` for a span no
/// terminal could match. `position` counts UTF-16 code units from the start
/// of the input; `row` and `column` are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: usize,
    pub row: usize,
    pub column: usize,
    pub token_id: Option<usize>,
}

impl From<Token> for std::string::String {
    fn from(token: Token) -> Self {
        token.text.to_string()
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.text
    }
}

/// A compiled scanner: dense 16-way digit transitions plus per-state accept
/// classification.
pub struct Tokenizer {
    transitions: Vec<[u32; DIGITS as usize]>,
    accept: Vec<Accept>,
    names: Vec<String>,
}

fn classify(combined: &[Automaton]) -> Accept {
    for (i, a) in combined.iter().enumerate() {
        if a.accepts() {
            return Accept::Match(i);
        }
    }
    if combined.iter().all(Automaton::is_reject) {
        Accept::Dead
    } else {
        Accept::Viable
    }
}

impl Tokenizer {
    /// Compiles the terminal list into a scanner.
    ///
    /// Fails with [`CompileError::UnmatchableTerminal`] when some terminal is
    /// never the accepting choice of any state, i.e. it is wholly shadowed by
    /// higher-priority terminals.
    pub fn compile(terminals: &[Terminal]) -> Result<Tokenizer, CompileError> {
        let mut states: IndexSet<Vec<Automaton>> = IndexSet::new();
        states.insert(terminals.iter().map(|t| t.automaton.clone()).collect());

        let mut transitions: Vec<[u32; DIGITS as usize]> = Vec::new();
        let mut index = 0;
        while index < states.len() {
            let combined = states[index].clone();
            let mut row = [0u32; DIGITS as usize];
            for d in 0..DIGITS {
                let next: Vec<Automaton> = combined.iter().map(|a| a.next(d)).collect();
                let target = match states.get_index_of(&next) {
                    Some(i) => i,
                    None => {
                        states.insert(next);
                        states.len() - 1
                    }
                };
                row[d as usize] = target as u32;
            }
            transitions.push(row);
            index += 1;
        }

        let accept: Vec<Accept> = states.iter().map(|c| classify(c)).collect();

        let mut found = vec![false; terminals.len()];
        for a in &accept {
            if let Accept::Match(i) = a {
                found[*i] = true;
            }
        }
        for (i, ok) in found.iter().enumerate() {
            if !ok {
                return Err(CompileError::UnmatchableTerminal {
                    index: i,
                    name: terminals[i].name().into(),
                });
            }
        }

        log::debug!(
            "compiled tokenizer: {} states over {} terminals",
            states.len(),
            terminals.len()
        );
        Ok(Tokenizer {
            transitions,
            accept,
            names: terminals.iter().map(|t| t.name().into()).collect(),
        })
    }

    pub(crate) fn terminal_names(&self) -> &[String] {
        &self.names
    }

    fn step(&self, state: usize, unit: u16) -> usize {
        let mut s = state;
        for shift in [12u32, 8, 4, 0] {
            s = self.transitions[s][((unit >> shift) & 0xf) as usize] as usize;
        }
        s
    }

    /// Classifies a whole string: the terminal it matches, still-viable
    /// prefix, or dead.
    pub fn match_str(&self, s: &str) -> Accept {
        let mut state = 0;
        for unit in s.encode_utf16() {
            state = self.step(state, unit);
        }
        self.accept[state]
    }

    /// Scans the input into tokens, longest match first, ties broken by
    /// terminal priority. Spans no terminal matches come out as tokens with
    /// `token_id == None`; the scanner never silently drops input.
    pub fn tokenize<I>(&self, input: I) -> Tokens<'_, I::IntoIter>
    where
        I: IntoIterator<Item = char>,
    {
        Tokens {
            tokenizer: self,
            input: input.into_iter(),
            carry: None,
            pending: VecDeque::new(),
            buffer: Vec::new(),
            state: 0,
            last_accept: None,
            position: 0,
            row: 0,
            column: 0,
        }
    }
}

/// Streaming token iterator; see [`Tokenizer::tokenize`].
pub struct Tokens<'t, I> {
    tokenizer: &'t Tokenizer,
    input: I,
    /// Low surrogate of a supplementary character awaiting consumption.
    carry: Option<u16>,
    /// Units awaiting re-scan after a rejected greedy continuation.
    pending: VecDeque<u16>,
    buffer: Vec<u16>,
    state: usize,
    /// Length in units and terminal id of the last accept seen.
    last_accept: Option<(usize, usize)>,
    position: usize,
    row: usize,
    column: usize,
}

impl<I: Iterator<Item = char>> Tokens<'_, I> {
    fn next_unit(&mut self) -> Option<u16> {
        if let Some(u) = self.pending.pop_front() {
            return Some(u);
        }
        if let Some(u) = self.carry.take() {
            return Some(u);
        }
        let ch = self.input.next()?;
        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);
        if encoded.len() == 2 {
            self.carry = Some(encoded[1]);
        }
        Some(encoded[0])
    }

    /// Emits the first `len` buffered units as one token and queues the rest
    /// for re-scanning from the initial state.
    fn emit(&mut self, len: usize, token_id: Option<usize>) -> Token {
        let text = std::string::String::from_utf16_lossy(&self.buffer[..len]);
        let token = Token {
            text: text.as_str().into(),
            position: self.position,
            row: self.row,
            column: self.column,
            token_id,
        };
        for &unit in &self.buffer[..len] {
            self.position += 1;
            if unit == u16::from(b'\n') {
                self.row += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        for unit in self.buffer.drain(len..).rev() {
            self.pending.push_front(unit);
        }
        self.buffer.clear();
        self.state = 0;
        self.last_accept = None;
        log::trace!("token {:?} ({:?})", token.text, token.token_id);
        token
    }

    fn flush(&mut self) -> Token {
        match self.last_accept {
            Some((len, id)) => self.emit(len, Some(id)),
            None => self.emit(self.buffer.len(), None),
        }
    }
}

impl<I: Iterator<Item = char>> Iterator for Tokens<'_, I> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            match self.next_unit() {
                Some(unit) => {
                    self.buffer.push(unit);
                    self.state = self.tokenizer.step(self.state, unit);
                    match self.tokenizer.accept[self.state] {
                        Accept::Match(id) => {
                            self.last_accept = Some((self.buffer.len(), id));
                        }
                        Accept::Viable => {}
                        Accept::Dead => return Some(self.flush()),
                    }
                }
                None => {
                    if self.buffer.is_empty() {
                        return None;
                    }
                    return Some(self.flush());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn compile(patterns: &[Terminal]) -> Tokenizer {
        match Tokenizer::compile(patterns) {
            Ok(t) => t,
            Err(e) => panic!("compile failed: {e}"),
        }
    }

    fn texts(tokens: &[Token]) -> Vec<(&str, Option<usize>)> {
        tokens
            .iter()
            .map(|t| (t.text.as_str(), t.token_id))
            .collect()
    }

    #[test]
    fn match_str_classifies() {
        let t = compile(&["foo".into(), "bar".into()]);
        assert_eq!(t.match_str("foo"), Accept::Match(0));
        assert_eq!(t.match_str("bar"), Accept::Match(1));
        assert_eq!(t.match_str("fo"), Accept::Viable);
        assert_eq!(t.match_str("fox"), Accept::Dead);
        assert_eq!(t.match_str("x"), Accept::Dead);
    }

    #[test]
    fn keywords_and_error_spans() {
        init_logger();
        let t = compile(&["foo".into(), "bar".into()]);
        let tokens: Vec<Token> = t.tokenize(" bar  foo ".chars()).collect();
        assert_eq!(
            texts(&tokens),
            vec![
                (" ", None),
                ("bar", Some(1)),
                (" ", None),
                (" ", None),
                ("foo", Some(0)),
                (" ", None),
            ]
        );
    }

    #[test]
    fn longest_match_wins() {
        let t = compile(&["a".into(), "ab".into()]);
        let tokens: Vec<Token> = t.tokenize("ab".chars()).collect();
        assert_eq!(texts(&tokens), vec![("ab", Some(1))]);
    }

    #[test]
    fn priority_breaks_ties() {
        // "if" is also an identifier; the earlier terminal wins
        let ident = (Terminal::alpha()).repeat(1..);
        let t = compile(&["if".into(), ident]);
        let tokens: Vec<Token> = t.tokenize("if iffy".chars()).collect();
        assert_eq!(
            texts(&tokens),
            vec![("if", Some(0)), (" ", None), ("iffy", Some(1))]
        );
    }

    #[test]
    fn rejected_continuation_is_rescanned() {
        let t = compile(&["123".into(), "12345".into()]);
        let whole: Vec<Token> = t.tokenize("12345".chars()).collect();
        assert_eq!(texts(&whole), vec![("12345", Some(1))]);

        // greedy scan of "1234" dies at the missing '5'; the accepted "123"
        // comes out and the '4' is rescanned on its own
        let partial: Vec<Token> = t.tokenize("1234".chars()).collect();
        assert_eq!(texts(&partial), vec![("123", Some(0)), ("4", None)]);
    }

    #[test]
    fn rescan_restarts_following_token() {
        let t = compile(&["ab".into(), "ba".into(), "aa".into()]);
        let tokens: Vec<Token> = t.tokenize("abaaba".chars()).collect();
        assert_eq!(
            texts(&tokens),
            vec![("ab", Some(0)), ("aa", Some(2)), ("ba", Some(1))]
        );
    }

    #[test]
    fn unmatchable_shadowed_terminal() {
        let err = Tokenizer::compile(&[
            Terminal::digit().repeat(1..),
            "123".into(),
            Terminal::any_char(),
        ]);
        match err {
            Err(CompileError::UnmatchableTerminal { index, name }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "123");
            }
            Ok(_) | Err(_) => panic!("expected an unmatchable-terminal error"),
        }
    }

    #[test]
    fn unmatchable_duplicate_pattern() {
        let err = Tokenizer::compile(&[Terminal::char('a'), "a".into()]);
        assert!(matches!(
            err,
            Err(CompileError::UnmatchableTerminal { index: 1, .. })
        ));
    }

    #[test]
    fn empty_terminal_list_compiles() {
        let t = compile(&[]);
        let tokens: Vec<Token> = t.tokenize("xy".chars()).collect();
        assert_eq!(texts(&tokens), vec![("x", None), ("y", None)]);
    }

    #[test]
    fn positions_rows_and_columns() {
        let t = compile(&["ab".into(), "cd".into(), "\n".into()]);
        let tokens: Vec<Token> = t.tokenize("ab\ncd".chars()).collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!((tokens[0].position, tokens[0].row, tokens[0].column), (0, 0, 0));
        assert_eq!((tokens[1].position, tokens[1].row, tokens[1].column), (2, 0, 2));
        assert_eq!((tokens[2].position, tokens[2].row, tokens[2].column), (3, 1, 0));
    }

    #[test]
    fn supplementary_characters_scan_as_two_units() {
        let t = compile(&[Terminal::any_char()]);
        let tokens: Vec<Token> = t.tokenize("🦀".chars()).collect();
        // one code unit per any_char match, so a surrogate pair splits
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.token_id == Some(0)));
    }

    #[test]
    fn number_and_identifier_mix() {
        init_logger();
        let number = (Terminal::digit()).repeat(1..).named("number");
        let ident = (Terminal::alpha() + (Terminal::alpha() | Terminal::digit()).repeat(0..))
            .named("ident");
        let t = compile(&[number, ident]);
        let tokens: Vec<Token> = t.tokenize("x1 42".chars()).collect();
        assert_eq!(
            texts(&tokens),
            vec![("x1", Some(1)), (" ", None), ("42", Some(0))]
        );
    }
}
