//! Runtime parser generation: grammars declared as plain Rust values are
//! compiled, at runtime, into a longest-match tokenizer and an LR parser.
//!
//! The pipeline has three stages:
//!
//! * [`Terminal`] patterns compile to symbolic automata stepped four bits at
//!   a time, so the full 16-bit code unit space costs sixteen transitions per
//!   state instead of 65536.
//! * A [`Tokenizer`] is the subset construction over all of a grammar's
//!   terminals: a dense state machine yielding longest-match tokens, with
//!   unmatchable terminals rejected at compile time.
//! * A [`Grammar`] plus a [`Strategy`] yields a [`Parser`]: item sets are
//!   built eagerly into dense action/goto tables, conflicts are reported at
//!   compile time, and the parse runtime is a re-entrant shift/reduce loop
//!   folding user reduction functions over the value stack.
//!
//! ```
//! use lexlr::{Grammar, Strategy, Terminal, rhs};
//!
//! let mut g: Grammar<String> = Grammar::new();
//! let list = g.symbol("list");
//! let digit = Terminal::digit();
//! g.rule(list, rhs![&digit], |mut v, _| v.swap_remove(0));
//! g.rule(list, rhs![list, &digit], |mut v, _| {
//!     let d = v.pop().unwrap();
//!     let mut l = v.pop().unwrap();
//!     l.push_str(&d);
//!     l
//! });
//! let parser = g.make_parser(list, Strategy::Slr).unwrap();
//! assert_eq!(parser.parse("123".chars()).unwrap(), "123");
//! ```

mod automaton;
mod error;
mod grammar;
mod lr;
mod parser;
mod terminal;
mod tokenizer;

pub use error::{CompileError, SyntaxError};
pub use grammar::{Grammar, Symbol, SymbolRef};
pub use lr::Strategy;
pub use parser::Parser;
pub use terminal::Terminal;
pub use tokenizer::{Accept, Token, Tokenizer, Tokens};
