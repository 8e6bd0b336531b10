//! The compiled parser and its shift/reduce runtime.
//!
//! A [`Parser`] owns the scanner, the resolved LR tables and the runtime
//! rules; [`Parser::parse`] is re-entrant, keeping all mutable state (the
//! stack of state/value frames) on the call frame, so one compiled parser
//! can be shared across threads.

use crate::error::{CompileError, SyntaxError};
use crate::grammar::{analyze, Grammar, Reducer, Symbol};
use crate::lr::{self, Action, StateTables, Strategy};
use crate::terminal::Terminal;
use crate::tokenizer::{Token, Tokenizer};
use smartstring::alias::String;

struct RuntimeRule<V: 'static> {
    lhs: usize,
    arity: usize,
    reduce: Reducer<V>,
}

/// A compiled parser producing values of type `V`.
pub struct Parser<V: 'static> {
    tokenizer: Tokenizer,
    states: Vec<StateTables>,
    initial: usize,
    rules: Vec<RuntimeRule<V>>,
    terminal_names: Vec<String>,
    skip: Vec<bool>,
    eof: usize,
}

impl<V: From<Token>> Parser<V> {
    pub(crate) fn compile(
        grammar: &Grammar<V>,
        start: Symbol,
        strategy: Strategy,
        whitespace: &[Terminal],
    ) -> Result<Parser<V>, CompileError> {
        let tables = analyze(grammar, start, whitespace);
        let tokenizer = Tokenizer::compile(&tables.terminals[..tables.eof])?;
        let automaton = lr::build(&tables, strategy)?;
        let mut terminal_names: Vec<String> =
            tokenizer.terminal_names().to_vec();
        terminal_names.push("<eof>".into());
        Ok(Parser {
            tokenizer,
            states: automaton.states,
            initial: automaton.initial,
            rules: tables
                .rules
                .iter()
                .map(|r| RuntimeRule {
                    lhs: r.lhs,
                    arity: r.rhs.len(),
                    reduce: r.reduce.clone(),
                })
                .collect(),
            terminal_names,
            skip: tables.skip,
            eof: tables.eof,
        })
    }

    /// The scanner this parser drives. Useful for inspecting tokenization
    /// separately from parsing.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Parses a character sequence to a value.
    ///
    /// Tokens the scanner could not match and whitespace tokens are dropped;
    /// everything else must fit the grammar or the parse fails with a
    /// [`SyntaxError`] carrying the offending token and the terminals the
    /// state would have accepted.
    pub fn parse<I>(&self, input: I) -> Result<V, SyntaxError>
    where
        I: IntoIterator<Item = char>,
    {
        let mut stack: Vec<(usize, Option<V>)> = vec![(self.initial, None)];
        let mut tokens = self
            .tokenizer
            .tokenize(input)
            .filter(|t| t.token_id.is_some_and(|id| !self.skip[id]));
        let mut end = (0, 0, 0);
        let mut sent_eof = false;

        'tokens: loop {
            let token = match tokens.next() {
                Some(token) => {
                    end = end_of(&token);
                    token
                }
                None if !sent_eof => {
                    sent_eof = true;
                    self.eof_token(end)
                }
                None => {
                    // EOF was shifted without reaching Accept
                    let top = top_state(&stack);
                    return Err(self.syntax_error(top, self.eof_token(end)));
                }
            };
            let id = match token.token_id {
                Some(id) => id,
                None => unreachable!("unmatched tokens are filtered out"),
            };
            loop {
                let state = top_state(&stack);
                match self.states[state].actions[id] {
                    Action::Shift(target) => {
                        log::trace!("shift {:?} -> state {target}", token.text);
                        stack.push((target, Some(V::from(token))));
                        continue 'tokens;
                    }
                    Action::Reduce(rule) => {
                        let r = &self.rules[rule];
                        log::trace!("reduce rule {rule} (arity {})", r.arity);
                        let mut values = Vec::with_capacity(r.arity);
                        for _ in 0..r.arity {
                            match stack.pop() {
                                Some((_, Some(value))) => values.push(value),
                                _ => unreachable!("parse stack underflow"),
                            }
                        }
                        values.reverse();
                        let value = (r.reduce)(values, &token);
                        let target = self.states[top_state(&stack)].nonterminal_goto[r.lhs];
                        stack.push((target, Some(value)));
                        // re-dispatch the same token from the new state
                    }
                    Action::Accept => {
                        log::trace!("accept");
                        match stack.pop() {
                            Some((_, Some(value))) => return Ok(value),
                            _ => unreachable!("accepted parse with no value"),
                        }
                    }
                    Action::Error => return Err(self.syntax_error(state, token)),
                }
            }
        }
    }

    fn eof_token(&self, end: (usize, usize, usize)) -> Token {
        Token {
            text: "<eof>".into(),
            position: end.0,
            row: end.1,
            column: end.2,
            token_id: Some(self.eof),
        }
    }

    fn syntax_error(&self, state: usize, token: Token) -> SyntaxError {
        let expected = self.states[state]
            .actions
            .iter()
            .enumerate()
            .filter(|(_, action)| !matches!(action, Action::Error))
            .map(|(t, _)| self.terminal_names[t].clone())
            .collect();
        SyntaxError { token, expected }
    }
}

fn top_state<V>(stack: &[(usize, Option<V>)]) -> usize {
    match stack.last() {
        Some((state, _)) => *state,
        None => unreachable!("parse stack is never empty"),
    }
}

/// Position, row and column just past a token's text.
fn end_of(token: &Token) -> (usize, usize, usize) {
    let mut row = token.row;
    let mut column = token.column;
    let mut units = 0;
    for unit in token.text.encode_utf16() {
        units += 1;
        if unit == u16::from(b'\n') {
            row += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (token.position + units, row, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhs;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn text_of(mut values: Vec<String>, _: &Token) -> String {
        values.swap_remove(0)
    }

    fn concat(values: Vec<String>, _: &Token) -> String {
        let mut out = String::new();
        for v in values {
            out.push_str(&v);
        }
        out
    }

    /// E -> T | E + T; T -> i | ( E ), flattening matched `i`s into a string.
    fn expression_parser(strategy: Strategy) -> Parser<String> {
        let mut g: Grammar<String> = Grammar::new();
        let e = g.symbol("E");
        let t = g.symbol("T");
        g.rule(e, rhs![t], text_of);
        g.rule(e, rhs![e, '+', t], |mut v, _| {
            let t = match v.pop() {
                Some(t) => t,
                None => unreachable!(),
            };
            let _plus = v.pop();
            let mut e = match v.pop() {
                Some(e) => e,
                None => unreachable!(),
            };
            e.push_str(&t);
            e
        });
        g.rule(t, rhs!['i'], text_of);
        g.rule(t, rhs!['(', e, ')'], |mut v, _| v.swap_remove(1));
        match g.make_parser(e, strategy) {
            Ok(p) => p,
            Err(err) => panic!("grammar failed to compile: {err}"),
        }
    }

    #[test]
    fn parses_nested_expressions() {
        init_logger();
        let p = expression_parser(Strategy::Lr0);
        assert_eq!(p.parse("i".chars()).unwrap(), "i");
        assert_eq!(p.parse("i+i".chars()).unwrap(), "ii");
        assert_eq!(p.parse("i+(i)".chars()).unwrap(), "ii");
        assert_eq!(p.parse("i+(i+(i+i))+i".chars()).unwrap(), "iiiii");
    }

    #[test]
    fn rejects_malformed_input() {
        let p = expression_parser(Strategy::Lr0);
        assert!(p.parse("i)".chars()).is_err());
        assert!(p.parse("".chars()).is_err());
        assert!(p.parse("i+".chars()).is_err());
        assert!(p.parse("(i".chars()).is_err());
    }

    #[test]
    fn rejects_trailing_input() {
        let p = expression_parser(Strategy::Lr0);
        assert!(p.parse("i i".chars()).is_err());
    }

    #[test]
    fn reduction_sees_values_in_source_order() {
        let mut g: Grammar<String> = Grammar::new();
        let a = g.symbol("A");
        g.rule(a, rhs!['b', 'c', 'd'], |v, _| {
            let mut out = String::new();
            for (i, part) in v.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                out.push_str(part);
            }
            out
        });
        let p = match g.make_parser(a, Strategy::Lr0) {
            Ok(p) => p,
            Err(err) => panic!("grammar failed to compile: {err}"),
        };
        assert_eq!(p.parse("bcd".chars()).unwrap(), "b|c|d");
    }

    #[test]
    fn unmatched_spans_are_dropped() {
        // no whitespace terminal declared: spaces become error tokens and
        // are skipped before parsing
        let p = expression_parser(Strategy::Lr0);
        assert_eq!(p.parse(" i + i ".chars()).unwrap(), "ii");
    }

    #[test]
    fn whitespace_terminals_are_dropped() {
        let mut g: Grammar<String> = Grammar::new();
        let s = g.symbol("S");
        g.rule(s, rhs!['a', 'b'], concat);
        let ws = Terminal::one_of([' ', '\t']).repeat(1..).named("ws");
        let p = match g.make_parser_with(s, Strategy::Lr0, &[ws]) {
            Ok(p) => p,
            Err(err) => panic!("grammar failed to compile: {err}"),
        };
        assert_eq!(p.parse("a \t b".chars()).unwrap(), "ab");
        assert_eq!(p.parse("ab".chars()).unwrap(), "ab");
    }

    #[test]
    fn errors_surface_on_the_dispatch_after_the_bad_shift() {
        // a terminal with no legitimate continuation is shifted into the
        // error sink; the failure is reported at the next dispatch
        let p = expression_parser(Strategy::Lr0);
        let err = match p.parse("i+)".chars()) {
            Err(err) => err,
            Ok(v) => panic!("expected failure, parsed {v:?}"),
        };
        assert_eq!(err.token.text, "<eof>");
        assert_eq!(err.token.position, 3);
        assert!(err.expected.is_empty());
    }

    #[test]
    fn clr_parses_textbook_grammar() {
        let mut g: Grammar<String> = Grammar::new();
        let s = g.symbol("S");
        let c = g.symbol("C");
        g.rule(s, rhs![c, c], concat);
        g.rule(c, rhs!['c', c], concat);
        g.rule(c, rhs!['d'], text_of);
        let p = match g.make_parser(s, Strategy::Clr) {
            Ok(p) => p,
            Err(err) => panic!("grammar failed to compile: {err}"),
        };
        assert_eq!(p.parse("ccdd".chars()).unwrap(), "ccdd");
        assert_eq!(p.parse("dd".chars()).unwrap(), "dd");
        assert!(p.parse("d".chars()).is_err());
        assert!(p.parse("cd".chars()).is_err());
    }

    #[test]
    fn compilation_is_idempotent() {
        let first = expression_parser(Strategy::Lr0);
        let second = expression_parser(Strategy::Lr0);
        for input in ["i", "i+i", "i+(i)", "i)"] {
            assert_eq!(
                first.parse(input.chars()).is_ok(),
                second.parse(input.chars()).is_ok()
            );
        }
        assert_eq!(
            first.parse("i+(i)".chars()).unwrap(),
            second.parse("i+(i)".chars()).unwrap()
        );
    }

    #[test]
    fn multi_character_terminals() {
        init_logger();
        let mut g: Grammar<String> = Grammar::new();
        let s = g.symbol("S");
        let number = Terminal::digit().repeat(1..).named("number");
        g.rule(s, rhs![&number], text_of);
        g.rule(s, rhs![s, "+", &number], |mut v, _| {
            let n = match v.pop() {
                Some(n) => n,
                None => unreachable!(),
            };
            let _op = v.pop();
            let mut s = match v.pop() {
                Some(s) => s,
                None => unreachable!(),
            };
            s.push('+');
            s.push_str(&n);
            s
        });
        let p = match g.make_parser(s, Strategy::Clr) {
            Ok(p) => p,
            Err(err) => panic!("grammar failed to compile: {err}"),
        };
        assert_eq!(p.parse("12+345".chars()).unwrap(), "12+345");
    }
}
