//! LR automaton construction.
//!
//! States are canonicalized item sets (`BTreeSet<Item>`), discovered through
//! a worklist and deduplicated by an `IndexSet`, so the state space is built
//! once, eagerly, with dense action and goto tables per state. The four
//! strategies share the same item/goto machinery and differ only in initial
//! seeding, closure, and how a (state, terminal) pair resolves to an action.

use crate::error::CompileError;
use crate::grammar::{GrammarTables, Sym};
use indexmap::IndexSet;
use std::collections::BTreeSet;

/// Table construction strategy.
///
/// `Lalr` is resolved with exactly the SLR(1) policy (no lookahead merging
/// is performed), and `Clr` builds unmerged LR(1) states from
/// lookahead-carrying items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Lr0,
    Slr,
    Lalr,
    Clr,
}

/// A dotted rule, optionally carrying one lookahead terminal (CLR only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Item {
    pub rule: usize,
    pub dot: usize,
    pub lookahead: Option<usize>,
}

pub(crate) type ItemSet = BTreeSet<Item>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Error,
    Shift(usize),
    Reduce(usize),
    Accept,
}

/// Dense per-state tables: one action per terminal, one goto per terminal
/// and per nonterminal.
#[derive(Debug)]
pub(crate) struct StateTables {
    pub actions: Vec<Action>,
    pub nonterminal_goto: Vec<usize>,
}

#[derive(Debug)]
pub(crate) struct LrAutomaton {
    pub states: Vec<StateTables>,
    pub initial: usize,
}

fn at_end<V>(g: &GrammarTables<V>, item: &Item) -> bool {
    item.dot >= g.rules[item.rule].rhs.len()
}

/// First terminals of a symbol string, falling through to `lookahead` when
/// the whole string is nullable.
fn first_of<V>(g: &GrammarTables<V>, symbols: &[Sym], lookahead: Option<usize>) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    for sym in symbols {
        match *sym {
            Sym::T(t) => {
                out.insert(t);
                return out;
            }
            Sym::N(n) => {
                out.extend(g.first[n].iter().copied());
                if !g.nullable[n] {
                    return out;
                }
            }
        }
    }
    if let Some(la) = lookahead {
        out.insert(la);
    }
    out
}

fn closure<V>(g: &GrammarTables<V>, strategy: Strategy, mut items: ItemSet) -> ItemSet {
    let mut queue: Vec<Item> = items.iter().copied().collect();
    while let Some(item) = queue.pop() {
        let rhs = &g.rules[item.rule].rhs;
        if item.dot >= rhs.len() {
            continue;
        }
        let Sym::N(nt) = rhs[item.dot] else { continue };
        match strategy {
            Strategy::Clr => {
                let follow = first_of(g, &rhs[item.dot + 1..], item.lookahead);
                for &rule in &g.rules_of[nt] {
                    for &la in &follow {
                        let new = Item { rule, dot: 0, lookahead: Some(la) };
                        if items.insert(new) {
                            queue.push(new);
                        }
                    }
                }
            }
            _ => {
                for &rule in &g.rules_of[nt] {
                    let new = Item { rule, dot: 0, lookahead: None };
                    if items.insert(new) {
                        queue.push(new);
                    }
                }
            }
        }
    }
    items
}

fn goto<V>(g: &GrammarTables<V>, strategy: Strategy, items: &ItemSet, sym: Sym) -> ItemSet {
    let mut moved = ItemSet::new();
    for item in items {
        let rhs = &g.rules[item.rule].rhs;
        if item.dot < rhs.len() && rhs[item.dot] == sym {
            moved.insert(Item {
                rule: item.rule,
                dot: item.dot + 1,
                lookahead: item.lookahead,
            });
        }
    }
    closure(g, strategy, moved)
}

fn seed<V>(g: &GrammarTables<V>, strategy: Strategy) -> ItemSet {
    let mut items = ItemSet::new();
    for &rule in &g.rules_of[g.start] {
        match strategy {
            Strategy::Clr => {
                for &la in &g.first[g.start] {
                    items.insert(Item { rule, dot: 0, lookahead: Some(la) });
                }
            }
            _ => {
                items.insert(Item { rule, dot: 0, lookahead: None });
            }
        }
    }
    closure(g, strategy, items)
}

fn reduce_reduce<V>(g: &GrammarTables<V>, rule1: usize, rule2: usize) -> CompileError {
    CompileError::ReduceReduceConflict {
        rule1: g.display_rule(rule1),
        rule2: g.display_rule(rule2),
    }
}

/// Resolves the action for one (state, terminal) pair under the strategy's
/// policy.
fn resolve<V>(
    g: &GrammarTables<V>,
    strategy: Strategy,
    items: &ItemSet,
    terminal: usize,
    shift_target: usize,
) -> Result<Action, CompileError> {
    if items.is_empty() {
        // the error sink: every action is Error, every goto is itself
        return Ok(Action::Error);
    }
    if terminal == g.eof && items.iter().any(|i| i.rule == 0 && i.dot == 1) {
        return Ok(Action::Accept);
    }
    match strategy {
        Strategy::Lr0 => {
            let finished: Vec<&Item> = items.iter().filter(|i| at_end(g, i)).collect();
            if finished.len() > 1 {
                return Err(reduce_reduce(g, finished[0].rule, finished[1].rule));
            }
            if let Some(done) = finished.first() {
                if items.len() == 1 {
                    return Ok(Action::Reduce(done.rule));
                }
                let in_progress = items.iter().find(|i| !at_end(g, i));
                if let Some(shifting) = in_progress {
                    return Err(CompileError::ShiftReduceConflict {
                        shift_rule: g.display_rule(shifting.rule),
                        reduce_rule: g.display_rule(done.rule),
                    });
                }
            }
            Ok(Action::Shift(shift_target))
        }
        Strategy::Slr | Strategy::Lalr => {
            if items.iter().any(|i| !at_end(g, i)) {
                return Ok(Action::Shift(shift_target));
            }
            let mut finished = items.iter();
            match (finished.next(), finished.next()) {
                (Some(only), None) => Ok(Action::Reduce(only.rule)),
                (Some(a), Some(b)) => Err(reduce_reduce(g, a.rule, b.rule)),
                (None, _) => unreachable!("non-empty item set"),
            }
        }
        Strategy::Clr => {
            let matching: Vec<usize> = items
                .iter()
                .filter(|i| at_end(g, i) && i.lookahead == Some(terminal))
                .map(|i| i.rule)
                .collect();
            match matching.len() {
                0 => Ok(Action::Shift(shift_target)),
                1 => Ok(Action::Reduce(matching[0])),
                _ => Err(reduce_reduce(g, matching[0], matching[1])),
            }
        }
    }
}

/// Builds the full LR automaton with resolved dense tables.
pub(crate) fn build<V>(
    g: &GrammarTables<V>,
    strategy: Strategy,
) -> Result<LrAutomaton, CompileError> {
    let n_terminals = g.terminals.len();
    let n_nonterminals = g.nonterminal_names.len();

    let mut sets: IndexSet<ItemSet> = IndexSet::new();
    sets.insert(seed(g, strategy));

    let mut states: Vec<StateTables> = Vec::new();
    let mut index = 0;
    while index < sets.len() {
        let items = sets[index].clone();
        let mut intern = |target: ItemSet| -> usize {
            match sets.get_index_of(&target) {
                Some(i) => i,
                None => {
                    sets.insert(target);
                    sets.len() - 1
                }
            }
        };
        let terminal_goto: Vec<usize> = (0..n_terminals)
            .map(|t| intern(goto(g, strategy, &items, Sym::T(t))))
            .collect();
        let nonterminal_goto: Vec<usize> = (0..n_nonterminals)
            .map(|n| intern(goto(g, strategy, &items, Sym::N(n))))
            .collect();
        let actions = (0..n_terminals)
            .map(|t| resolve(g, strategy, &items, t, terminal_goto[t]))
            .collect::<Result<Vec<Action>, CompileError>>()?;
        states.push(StateTables { actions, nonterminal_goto });
        index += 1;
    }

    log::debug!("{:?} automaton: {} states", strategy, states.len());
    Ok(LrAutomaton { states, initial: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{analyze, Grammar};
    use crate::rhs;
    use crate::tokenizer::Token;
    use smartstring::alias::String;

    fn text_of(mut values: Vec<String>, _: &Token) -> String {
        values.swap_remove(0)
    }

    fn build_with(g: &Grammar<String>, start: crate::Symbol, strategy: Strategy)
        -> Result<LrAutomaton, CompileError>
    {
        build(&analyze(g, start, &[]), strategy)
    }

    /// E -> T | E + T; T -> i | ( E )  — a textbook LR(0) grammar.
    fn lr0_grammar() -> (Grammar<String>, crate::Symbol) {
        let mut g: Grammar<String> = Grammar::new();
        let e = g.symbol("E");
        let t = g.symbol("T");
        g.rule(e, rhs![t], text_of);
        g.rule(e, rhs![e, '+', t], text_of);
        g.rule(t, rhs!['i'], text_of);
        g.rule(t, rhs!['(', e, ')'], text_of);
        (g, e)
    }

    #[test]
    fn lr0_builds_deterministic_tables() {
        let (g, e) = lr0_grammar();
        let automaton = match build_with(&g, e, Strategy::Lr0) {
            Ok(a) => a,
            Err(e) => panic!("expected clean LR(0) build: {e}"),
        };
        assert!(automaton.states.len() > 5);
    }

    #[test]
    fn lr0_reports_reduce_reduce() {
        let mut g: Grammar<String> = Grammar::new();
        let p = g.symbol("P");
        g.rule(p, rhs!['a'], text_of);
        g.rule(p, rhs!['a'], text_of);
        let err = build_with(&g, p, Strategy::Lr0);
        assert!(matches!(
            err,
            Err(CompileError::ReduceReduceConflict { .. })
        ));
    }

    #[test]
    fn lr0_reports_shift_reduce() {
        let mut g: Grammar<String> = Grammar::new();
        let e = g.symbol("E");
        g.rule(e, rhs!['1'], text_of);
        g.rule(e, rhs!['1', e], text_of);
        let err = build_with(&g, e, Strategy::Lr0);
        assert!(matches!(err, Err(CompileError::ShiftReduceConflict { .. })));
    }

    #[test]
    fn slr_resolves_lr0_shift_reduce() {
        let mut g: Grammar<String> = Grammar::new();
        let e = g.symbol("E");
        g.rule(e, rhs!['1'], text_of);
        g.rule(e, rhs!['1', e], text_of);
        assert!(build_with(&g, e, Strategy::Slr).is_ok());
        assert!(build_with(&g, e, Strategy::Lalr).is_ok());
    }

    #[test]
    fn slr_still_reports_reduce_reduce() {
        let mut g: Grammar<String> = Grammar::new();
        let p = g.symbol("P");
        g.rule(p, rhs!['a'], text_of);
        g.rule(p, rhs!['a'], text_of);
        for strategy in [Strategy::Slr, Strategy::Lalr] {
            assert!(matches!(
                build_with(&g, p, strategy),
                Err(CompileError::ReduceReduceConflict { .. })
            ));
        }
    }

    /// S -> C C; C -> c C | d  — the textbook CLR(1) example.
    #[test]
    fn clr_builds_lookahead_states() {
        let mut g: Grammar<String> = Grammar::new();
        let s = g.symbol("S");
        let c = g.symbol("C");
        g.rule(s, rhs![c, c], text_of);
        g.rule(c, rhs!['c', c], text_of);
        g.rule(c, rhs!['d'], text_of);
        let automaton = match build_with(&g, s, Strategy::Clr) {
            Ok(a) => a,
            Err(e) => panic!("expected clean CLR build: {e}"),
        };
        // unmerged LR(1) keeps lookahead-distinguished copies of the C states
        assert!(automaton.states.len() > 8);
    }

    #[test]
    fn conflict_messages_render_rules() {
        let mut g: Grammar<String> = Grammar::new();
        let p = g.symbol("P");
        g.rule(p, rhs!['a'], text_of);
        g.rule(p, rhs!['a'], text_of);
        match build_with(&g, p, Strategy::Lr0) {
            Err(CompileError::ReduceReduceConflict { rule1, rule2 }) => {
                assert_eq!(rule1, "P -> a");
                assert_eq!(rule2, "P -> a");
            }
            other => panic!("expected reduce-reduce conflict, got {other:?}"),
        }
    }
}
