//! Grammar construction and static analysis.
//!
//! A [`Grammar`] is an arena of nonterminals addressed by [`Symbol`] handles;
//! rules attach a right-hand side and a reduction function to a nonterminal.
//! Compilation walks the rules reachable from a start symbol, interns every
//! distinct terminal (by automaton equality, so two separately built but
//! identical patterns share one token id), and computes the nullability and
//! First-set fixed points the LR builder feeds on.

use crate::automaton::Automaton;
use crate::error::CompileError;
use crate::lr::Strategy;
use crate::parser::Parser;
use crate::terminal::Terminal;
use crate::tokenizer::{Token, Tokenizer};
use indexmap::{IndexMap, IndexSet};
use smartstring::alias::String;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

pub(crate) type Reducer<V> = Arc<dyn Fn(Vec<V>, &Token) -> V + Send + Sync>;

/// Handle to a nonterminal in a [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub(crate) usize);

/// One element of a rule's right-hand side. Usually built implicitly through
/// the [`rhs!`](crate::rhs) macro's `From` conversions.
#[derive(Clone)]
pub enum SymbolRef {
    Terminal(Terminal),
    Symbol(Symbol),
}

impl From<Terminal> for SymbolRef {
    fn from(t: Terminal) -> SymbolRef {
        SymbolRef::Terminal(t)
    }
}

impl From<&Terminal> for SymbolRef {
    fn from(t: &Terminal) -> SymbolRef {
        SymbolRef::Terminal(t.clone())
    }
}

impl From<Symbol> for SymbolRef {
    fn from(s: Symbol) -> SymbolRef {
        SymbolRef::Symbol(s)
    }
}

impl From<&Symbol> for SymbolRef {
    fn from(s: &Symbol) -> SymbolRef {
        SymbolRef::Symbol(*s)
    }
}

impl From<char> for SymbolRef {
    fn from(ch: char) -> SymbolRef {
        SymbolRef::Terminal(Terminal::char(ch))
    }
}

impl From<&str> for SymbolRef {
    fn from(s: &str) -> SymbolRef {
        SymbolRef::Terminal(Terminal::string(s))
    }
}

/// Builds a rule right-hand side from anything convertible to [`SymbolRef`]:
/// symbols, terminals (by reference), chars and string literals.
#[macro_export]
macro_rules! rhs {
    ($($part:expr),* $(,)?) => {
        vec![$($crate::SymbolRef::from($part)),*]
    };
}

struct Rule<V: 'static> {
    rhs: Vec<SymbolRef>,
    reduce: Reducer<V>,
}

struct Nonterminal<V: 'static> {
    name: String,
    rules: Vec<Rule<V>>,
}

/// A context-free grammar producing values of type `V` while parsing.
///
/// `V` must be constructible from a [`Token`] so shifted terminals can enter
/// the value stack.
pub struct Grammar<V: 'static> {
    nonterminals: Vec<Nonterminal<V>>,
}

impl<V: 'static> Default for Grammar<V> {
    fn default() -> Self {
        Grammar::new()
    }
}

impl<V: 'static> Grammar<V> {
    pub fn new() -> Self {
        Grammar { nonterminals: Vec::new() }
    }

    /// Allocates a fresh nonterminal.
    pub fn symbol(&mut self, name: &str) -> Symbol {
        self.nonterminals.push(Nonterminal {
            name: name.into(),
            rules: Vec::new(),
        });
        Symbol(self.nonterminals.len() - 1)
    }

    /// Adds a production for `lhs`. The reduction function receives the
    /// right-hand-side values in source order plus the lookahead token that
    /// triggered the reduction.
    pub fn rule<R, F>(&mut self, lhs: Symbol, rhs: R, reduce: F)
    where
        R: IntoIterator<Item = SymbolRef>,
        F: Fn(Vec<V>, &Token) -> V + Send + Sync + 'static,
    {
        self.nonterminals[lhs.0].rules.push(Rule {
            rhs: rhs.into_iter().collect(),
            reduce: Arc::new(reduce),
        });
    }

    /// Compiles a parser for the language of `start` under the given table
    /// construction strategy.
    pub fn make_parser(&self, start: Symbol, strategy: Strategy) -> Result<Parser<V>, CompileError>
    where
        V: From<Token>,
    {
        Parser::compile(self, start, strategy, &[])
    }

    /// Like [`Grammar::make_parser`], with extra whitespace terminals that
    /// are scanned but dropped before parsing.
    pub fn make_parser_with(
        &self,
        start: Symbol,
        strategy: Strategy,
        whitespace: &[Terminal],
    ) -> Result<Parser<V>, CompileError>
    where
        V: From<Token>,
    {
        Parser::compile(self, start, strategy, whitespace)
    }

    /// Compiles just the scanner for the terminals reachable from `start`.
    pub fn make_tokenizer(&self, start: Symbol) -> Result<Tokenizer, CompileError> {
        let tables = analyze(self, start, &[]);
        Tokenizer::compile(&tables.terminals[..tables.eof])
    }
}

/// Grammar symbol after dense index assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Sym {
    /// Terminal index; the EOF terminal is the last one.
    T(usize),
    /// Nonterminal index; 0 is the augmented start.
    N(usize),
}

pub(crate) struct CompiledRule<V: 'static> {
    pub lhs: usize,
    pub rhs: Vec<Sym>,
    pub reduce: Reducer<V>,
}

/// Everything the LR builder and runtime need to know about a grammar:
/// interned terminals (EOF appended last), rules in a dense numbering with
/// rule 0 the augmented `start -> S $`, and the analysis fixed points.
pub(crate) struct GrammarTables<V: 'static> {
    pub terminals: Vec<Terminal>,
    /// Terminals scanned but dropped before parsing (whitespace).
    pub skip: Vec<bool>,
    pub nonterminal_names: Vec<String>,
    pub rules: Vec<CompiledRule<V>>,
    /// Rule indices grouped by left-hand-side nonterminal.
    pub rules_of: Vec<Vec<usize>>,
    pub nullable: Vec<bool>,
    pub first: Vec<BTreeSet<usize>>,
    /// Index of the EOF terminal (always `terminals.len() - 1`).
    pub eof: usize,
    /// Index of the augmented start nonterminal (always 0).
    pub start: usize,
}

impl<V: 'static> GrammarTables<V> {
    pub fn display_rule(&self, rule: usize) -> String {
        let r = &self.rules[rule];
        let mut out = std::string::String::new();
        out.push_str(&self.nonterminal_names[r.lhs]);
        out.push_str(" ->");
        for sym in &r.rhs {
            let _ = match sym {
                Sym::T(t) => write!(out, " {}", self.terminals[*t].name()),
                Sym::N(n) => write!(out, " {}", self.nonterminal_names[*n]),
            };
        }
        out.as_str().into()
    }
}

pub(crate) fn analyze<V: 'static>(
    grammar: &Grammar<V>,
    start: Symbol,
    whitespace: &[Terminal],
) -> GrammarTables<V> {
    // reachable nonterminals, in discovery order; dense index = position + 1
    let mut reachable: IndexSet<usize> = IndexSet::new();
    reachable.insert(start.0);
    let mut scan = 0;
    while scan < reachable.len() {
        let nt = reachable[scan];
        for rule in &grammar.nonterminals[nt].rules {
            for part in &rule.rhs {
                if let SymbolRef::Symbol(s) = part {
                    reachable.insert(s.0);
                }
            }
        }
        scan += 1;
    }
    let nt_index = |arena: usize| -> usize {
        match reachable.get_index_of(&arena) {
            Some(i) => i + 1,
            None => unreachable!("unreachable nonterminal in reachable rule"),
        }
    };

    // intern terminals by automaton equality; a Reject automaton is the EOF
    // terminal and stays out of the tokenizer
    let mut interned: IndexMap<Automaton, Terminal> = IndexMap::new();
    let mut intern = |t: &Terminal| -> Option<usize> {
        if t.automaton.is_reject() {
            return None;
        }
        match interned.get_index_of(&t.automaton) {
            Some(i) => Some(i),
            None => {
                interned.insert(t.automaton.clone(), t.clone());
                Some(interned.len() - 1)
            }
        }
    };
    for &nt in reachable.iter() {
        for rule in &grammar.nonterminals[nt].rules {
            for part in &rule.rhs {
                if let SymbolRef::Terminal(t) = part {
                    intern(t);
                }
            }
        }
    }
    let mut skip_indices: Vec<usize> = Vec::new();
    for ws in whitespace {
        if let Some(i) = intern(ws) {
            skip_indices.push(i);
        }
    }
    let mut terminals: Vec<Terminal> = interned.into_values().collect();
    let eof = terminals.len();
    terminals.push(Terminal::eof());
    let mut skip = vec![false; terminals.len()];
    for i in skip_indices {
        skip[i] = true;
    }
    let terminal_index = |t: &Terminal| -> usize {
        if t.automaton.is_reject() {
            return eof;
        }
        match terminals[..eof].iter().position(|x| x == t) {
            Some(i) => i,
            None => unreachable!("terminal was interned above"),
        }
    };

    // dense rules; rule 0 is the augmented start
    let mut nonterminal_names: Vec<String> = Vec::with_capacity(reachable.len() + 1);
    nonterminal_names.push("start".into());
    for &nt in reachable.iter() {
        nonterminal_names.push(grammar.nonterminals[nt].name.clone());
    }
    let mut rules: Vec<CompiledRule<V>> = Vec::new();
    rules.push(CompiledRule {
        lhs: 0,
        rhs: vec![Sym::N(nt_index(start.0)), Sym::T(eof)],
        reduce: Arc::new(|mut values: Vec<V>, _| values.swap_remove(0)),
    });
    for &nt in reachable.iter() {
        let lhs = nt_index(nt);
        for rule in &grammar.nonterminals[nt].rules {
            let rhs = rule
                .rhs
                .iter()
                .map(|part| match part {
                    SymbolRef::Terminal(t) => Sym::T(terminal_index(t)),
                    SymbolRef::Symbol(s) => Sym::N(nt_index(s.0)),
                })
                .collect();
            rules.push(CompiledRule {
                lhs,
                rhs,
                reduce: rule.reduce.clone(),
            });
        }
    }
    let mut rules_of: Vec<Vec<usize>> = vec![Vec::new(); nonterminal_names.len()];
    for (i, rule) in rules.iter().enumerate() {
        rules_of[rule.lhs].push(i);
    }

    // nullability fixed point
    let mut nullable = vec![false; nonterminal_names.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for rule in &rules {
            if nullable[rule.lhs] {
                continue;
            }
            let all = rule.rhs.iter().all(|sym| match sym {
                Sym::T(_) => false,
                Sym::N(n) => nullable[*n],
            });
            if all {
                nullable[rule.lhs] = true;
                changed = true;
            }
        }
    }

    // First-set fixed point
    let mut first: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nonterminal_names.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for rule in &rules {
            for sym in &rule.rhs {
                match sym {
                    Sym::T(t) => {
                        changed |= first[rule.lhs].insert(*t);
                        break;
                    }
                    Sym::N(n) => {
                        let add: Vec<usize> = first[*n].iter().copied().collect();
                        for t in add {
                            changed |= first[rule.lhs].insert(t);
                        }
                        if !nullable[*n] {
                            break;
                        }
                    }
                }
            }
        }
    }

    log::debug!(
        "analyzed grammar: {} nonterminals, {} terminals, {} rules",
        nonterminal_names.len(),
        terminals.len(),
        rules.len()
    );
    GrammarTables {
        terminals,
        skip,
        nonterminal_names,
        rules,
        rules_of,
        nullable,
        first,
        eof,
        start: 0,
    }
}
