//! Symbolic automata over 4-bit input digits.
//!
//! Every automaton node is an immutable, structurally shared term. Stepping an
//! automaton by one digit ([`Automaton::next`]) produces the derivative
//! automaton for the remaining input. Smart constructors canonicalize as they
//! build (identity elimination, flattening, operand ordering), so automata
//! that accept via the same term structure compare equal and hash equal, which
//! is what makes subset construction over vectors of these terminate.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Number of distinct input digits: one 16-bit code unit is fed to the
/// automaton as four of these, most significant first.
pub(crate) const DIGITS: u8 = 16;

#[derive(Clone)]
pub(crate) struct Automaton {
    node: Rc<Node>,
}

struct Node {
    hash: u64,
    accepts: bool,
    empty: bool,
    kind: Kind,
}

#[derive(PartialEq, Eq)]
enum Kind {
    Reject,
    Empty,
    AnyDigit,
    Digit(u8),
    DigitRange(u8, u8),
    Seq(Automaton, Automaton),
    Union(Vec<Automaton>),
    Star(Automaton),
    Not(Automaton),
}

fn mix(tag: u64, parts: &[u64]) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325u64 ^ tag.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    for &p in parts {
        h = (h ^ p).wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

impl Automaton {
    fn make(kind: Kind) -> Automaton {
        let (accepts, empty, hash) = match &kind {
            Kind::Reject => (false, false, mix(1, &[])),
            Kind::Empty => (true, true, mix(2, &[])),
            Kind::AnyDigit => (false, false, mix(3, &[])),
            Kind::Digit(d) => (false, false, mix(4, &[*d as u64])),
            Kind::DigitRange(lo, hi) => (false, false, mix(5, &[*lo as u64, *hi as u64])),
            Kind::Seq(a, b) => (
                a.accepts() || (a.can_be_empty() && b.accepts()),
                a.can_be_empty() && b.can_be_empty(),
                mix(6, &[a.hash_value(), b.hash_value()]),
            ),
            Kind::Union(ops) => (
                ops.iter().any(Automaton::accepts),
                ops.iter().any(Automaton::can_be_empty),
                mix(7, &ops.iter().map(Automaton::hash_value).collect::<Vec<_>>()),
            ),
            Kind::Star(a) => (true, true, mix(8, &[a.hash_value()])),
            Kind::Not(a) => (!a.accepts(), false, mix(9, &[a.hash_value()])),
        };
        Automaton {
            node: Rc::new(Node { hash, accepts, empty, kind }),
        }
    }

    pub fn reject() -> Automaton {
        Automaton::make(Kind::Reject)
    }

    pub fn empty() -> Automaton {
        Automaton::make(Kind::Empty)
    }

    pub fn any_digit() -> Automaton {
        Automaton::make(Kind::AnyDigit)
    }

    pub fn digit(d: u8) -> Automaton {
        debug_assert!(d < DIGITS);
        Automaton::make(Kind::Digit(d))
    }

    /// Inclusive digit range; collapses to [`Automaton::digit`] or
    /// [`Automaton::any_digit`] where the bounds allow.
    pub fn digit_range(lo: u8, hi: u8) -> Automaton {
        debug_assert!(lo <= hi && hi < DIGITS);
        if lo == hi {
            Automaton::digit(lo)
        } else if lo == 0 && hi == DIGITS - 1 {
            Automaton::any_digit()
        } else {
            Automaton::make(Kind::DigitRange(lo, hi))
        }
    }

    /// Concatenation. Reject annihilates, Empty is the identity, and nested
    /// sequences are reassociated to the right so equal languages built in
    /// different association orders share one spelling.
    pub fn seq(a: Automaton, b: Automaton) -> Automaton {
        if a.is_reject() || b.is_empty_node() {
            return a;
        }
        if b.is_reject() || a.is_empty_node() {
            return b;
        }
        if let Kind::Seq(x, y) = &a.node.kind {
            let (x, y) = (x.clone(), y.clone());
            return Automaton::seq(x, Automaton::seq(y, b));
        }
        Automaton::make(Kind::Seq(a, b))
    }

    pub fn union(a: Automaton, b: Automaton) -> Automaton {
        Automaton::union_many(vec![a, b])
    }

    /// N-ary union. Nested unions are flattened, Reject operands dropped,
    /// duplicates removed, and the rest ordered by structural hash so operand
    /// order never distinguishes two equal unions.
    pub fn union_many(operands: Vec<Automaton>) -> Automaton {
        let mut flat: Vec<Automaton> = Vec::with_capacity(operands.len());
        let mut stack: Vec<Automaton> = operands.into_iter().rev().collect();
        while let Some(a) = stack.pop() {
            match &a.node.kind {
                Kind::Reject => {}
                Kind::Union(ops) => stack.extend(ops.iter().rev().cloned()),
                _ => flat.push(a),
            }
        }
        flat.sort_by_key(Automaton::hash_value);
        flat.dedup();
        match flat.len() {
            0 => Automaton::reject(),
            1 => flat.swap_remove(0),
            _ => Automaton::make(Kind::Union(flat)),
        }
    }

    /// Kleene closure. Starring Empty or an existing Star is a no-op; an
    /// Empty alternative inside a union operand is stripped since the star
    /// already accepts zero repetitions.
    pub fn star(a: Automaton) -> Automaton {
        match &a.node.kind {
            Kind::Empty | Kind::Star(_) => return a,
            Kind::Union(ops) if ops.iter().any(Automaton::is_empty_node) => {
                let kept: Vec<Automaton> =
                    ops.iter().filter(|o| !o.is_empty_node()).cloned().collect();
                return Automaton::star(Automaton::union_many(kept));
            }
            _ => {}
        }
        Automaton::make(Kind::Star(a))
    }

    /// Single-step complement: flips acceptance of the node it wraps.
    /// Double negation unwraps.
    pub fn not(a: Automaton) -> Automaton {
        if let Kind::Not(inner) = &a.node.kind {
            return inner.clone();
        }
        Automaton::make(Kind::Not(a))
    }

    pub fn accepts(&self) -> bool {
        self.node.accepts
    }

    pub fn can_be_empty(&self) -> bool {
        self.node.empty
    }

    pub fn is_reject(&self) -> bool {
        matches!(self.node.kind, Kind::Reject)
    }

    fn is_empty_node(&self) -> bool {
        matches!(self.node.kind, Kind::Empty)
    }

    pub(crate) fn hash_value(&self) -> u64 {
        self.node.hash
    }

    /// The derivative of this automaton with respect to one input digit.
    pub fn next(&self, d: u8) -> Automaton {
        debug_assert!(d < DIGITS);
        match &self.node.kind {
            Kind::Reject | Kind::Empty => Automaton::reject(),
            Kind::AnyDigit => Automaton::empty(),
            Kind::Digit(c) => {
                if *c == d {
                    Automaton::empty()
                } else {
                    Automaton::reject()
                }
            }
            Kind::DigitRange(lo, hi) => {
                if (*lo..=*hi).contains(&d) {
                    Automaton::empty()
                } else {
                    Automaton::reject()
                }
            }
            Kind::Seq(a, b) => {
                let tail = Automaton::seq(a.next(d), b.clone());
                if a.can_be_empty() {
                    Automaton::union(b.next(d), tail)
                } else {
                    tail
                }
            }
            Kind::Union(ops) => {
                Automaton::union_many(ops.iter().map(|o| o.next(d)).collect())
            }
            // One unrolling of the loop body; rebuilt per step rather than
            // cached on the node, which would create an Rc cycle.
            Kind::Star(a) => Automaton::seq(a.clone(), self.clone()).next(d),
            Kind::Not(a) => {
                let n = a.next(d);
                match &n.node.kind {
                    Kind::Empty => Automaton::reject(),
                    Kind::Reject => Automaton::empty(),
                    _ => Automaton::not(n),
                }
            }
        }
    }
}

impl PartialEq for Automaton {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        self.node.hash == other.node.hash && self.node.kind == other.node.kind
    }
}

impl Eq for Automaton {}

impl Hash for Automaton {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.node.hash);
    }
}

impl fmt::Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node.kind {
            Kind::Reject => write!(f, "Reject"),
            Kind::Empty => write!(f, "Empty"),
            Kind::AnyDigit => write!(f, "Any"),
            Kind::Digit(d) => write!(f, "{d:x}"),
            Kind::DigitRange(lo, hi) => write!(f, "[{lo:x}-{hi:x}]"),
            Kind::Seq(a, b) => write!(f, "({a:?} {b:?})"),
            Kind::Union(ops) => {
                write!(f, "(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{op:?}")?;
                }
                write!(f, ")")
            }
            Kind::Star(a) => write!(f, "{a:?}*"),
            Kind::Not(a) => write!(f, "!{a:?}"),
        }
    }
}
