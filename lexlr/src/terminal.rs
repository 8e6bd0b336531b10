//! Terminal patterns: the user-facing layer over the symbolic automata.
//!
//! A [`Terminal`] pairs an automaton with a diagnostic name. Characters are
//! encoded as UTF-16 code units and each unit is fed to the automaton as four
//! 4-bit digits, most significant first, so `char`, `string` and `range` all
//! compile down to digit-level automata.

use crate::automaton::Automaton;
use smartstring::alias::String;
use std::ops;
use std::ops::{Bound, RangeBounds};

/// A named lexical pattern. Combine with `|` (alternation), `+`
/// (concatenation), `!` (single-step complement), [`Terminal::repeat`] and
/// [`Terminal::one_of`]; rename with [`Terminal::named`].
///
/// Equality and hashing ignore the name: two terminals are equal when their
/// automata are structurally equal.
#[derive(Clone)]
pub struct Terminal {
    pub(crate) automaton: Automaton,
    pub(crate) name: String,
}

fn unit_automaton(unit: u16) -> Automaton {
    let mut a = Automaton::empty();
    for shift in [0u32, 4, 8, 12] {
        a = Automaton::seq(Automaton::digit(((unit >> shift) & 0xf) as u8), a);
    }
    a
}

fn char_automaton(ch: char) -> Automaton {
    let mut units = [0u16; 2];
    ch.encode_utf16(&mut units)
        .iter()
        .rev()
        .fold(Automaton::empty(), |acc, &u| {
            Automaton::seq(unit_automaton(u), acc)
        })
}

/// Automaton matching one code unit in `lo..=hi`, split digit by digit.
/// At each digit position the range contributes at most three branches: the
/// exact low digit followed by the constrained low tail, the exact high digit
/// followed by the constrained high tail, and a full digit range between them
/// followed by unconstrained tails.
fn range_automaton(lo: u16, hi: u16, shift: u32) -> Automaton {
    let a = ((lo >> shift) & 0xf) as u8;
    let b = ((hi >> shift) & 0xf) as u8;
    if shift == 0 {
        return Automaton::digit_range(a, b);
    }
    if a == b {
        return Automaton::seq(Automaton::digit(a), range_automaton(lo, hi, shift - 4));
    }
    let low = Automaton::seq(Automaton::digit(a), range_automaton(lo, 0xffff, shift - 4));
    let high = Automaton::seq(Automaton::digit(b), range_automaton(0, hi, shift - 4));
    let bounds = Automaton::union(low, high);
    if a + 1 == b {
        bounds
    } else {
        let mid = Automaton::seq(
            Automaton::digit_range(a + 1, b - 1),
            range_automaton(0, 0xffff, shift - 4),
        );
        Automaton::union(mid, bounds)
    }
}

impl Terminal {
    fn new(automaton: Automaton, name: impl Into<String>) -> Terminal {
        Terminal { automaton, name: name.into() }
    }

    /// Matches exactly one character.
    pub fn char(ch: char) -> Terminal {
        let mut name = String::new();
        name.push(ch);
        Terminal::new(char_automaton(ch), name)
    }

    /// Matches exactly the given string.
    pub fn string(s: &str) -> Terminal {
        let automaton = s
            .chars()
            .rev()
            .fold(Automaton::empty(), |acc, ch| {
                Automaton::seq(char_automaton(ch), acc)
            });
        Terminal::new(automaton, s)
    }

    /// Matches one character in `lo..=hi`. Both bounds must lie in the Basic
    /// Multilingual Plane (one UTF-16 code unit).
    ///
    /// # Panics
    ///
    /// Panics when `lo > hi` or either bound is a supplementary character.
    pub fn range(lo: char, hi: char) -> Terminal {
        assert!(lo <= hi, "empty character range");
        assert!(
            (lo as u32) <= 0xffff && (hi as u32) <= 0xffff,
            "character ranges are limited to single code units"
        );
        let name = std::format!("[{lo}-{hi}]");
        Terminal::new(range_automaton(lo as u16, hi as u16, 12), name.as_str())
    }

    /// Matches any single code unit.
    pub fn any_char() -> Terminal {
        let mut a = Automaton::empty();
        for _ in 0..4 {
            a = Automaton::seq(Automaton::any_digit(), a);
        }
        Terminal::new(a, "*")
    }

    /// The decimal digits `0-9`.
    pub fn digit() -> Terminal {
        Terminal::range('0', '9').named("digit")
    }

    /// ASCII letters, either case.
    pub fn alpha() -> Terminal {
        (Terminal::range('a', 'z') | Terminal::range('A', 'Z')).named("alpha")
    }

    /// The end-of-input terminal. Its automaton rejects everything; the
    /// grammar compiler resolves it to the synthetic EOF token instead of
    /// handing it to the tokenizer.
    pub fn eof() -> Terminal {
        Terminal::new(Automaton::reject(), "$")
    }

    /// Matches the empty string and nothing else.
    pub fn empty() -> Terminal {
        Terminal::new(Automaton::empty(), "epsilon")
    }

    /// Alternation over any number of convertible patterns.
    ///
    /// # Panics
    ///
    /// Panics when `items` is empty.
    pub fn one_of<T, I>(items: I) -> Terminal
    where
        T: Into<Terminal>,
        I: IntoIterator<Item = T>,
    {
        let mut result: Option<Terminal> = None;
        for item in items {
            let t = item.into();
            result = Some(match result {
                Some(r) => r | t,
                None => t,
            });
        }
        match result {
            Some(t) => t,
            None => panic!("one_of requires at least one alternative"),
        }
    }

    /// Repetition with the count constrained to `bounds`: `repeat(0..)` is
    /// Kleene star, `repeat(1..)` one-or-more, `repeat(0..=1)` optional,
    /// `repeat(2..=4)` between two and four copies.
    pub fn repeat<R: RangeBounds<usize>>(&self, bounds: R) -> Terminal {
        let min = match bounds.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let max = match bounds.end_bound() {
            Bound::Included(&n) => Some(n),
            Bound::Excluded(&n) => Some(n.saturating_sub(1)),
            Bound::Unbounded => None,
        };
        if let Some(max) = max {
            assert!(min <= max, "empty repetition range");
        }
        let mut a = Automaton::empty();
        for _ in 0..min {
            a = Automaton::seq(a, self.automaton.clone());
        }
        match max {
            None => a = Automaton::seq(a, Automaton::star(self.automaton.clone())),
            Some(max) => {
                let optional = Automaton::union(Automaton::empty(), self.automaton.clone());
                for _ in min..max {
                    a = Automaton::seq(a, optional.clone());
                }
            }
        }
        let name = std::format!("{}{{{min},}}", self.name);
        Terminal::new(a, name.as_str())
    }

    /// Single-step complement of this pattern. This flips acceptance one
    /// automaton step at a time; it is most useful repeated inside larger
    /// patterns, e.g. `quote + (!quote).repeat(0..) + quote` for a quoted
    /// literal.
    pub fn complement(&self) -> Terminal {
        let name = std::format!("!{}", self.name);
        Terminal::new(Automaton::not(self.automaton.clone()), name.as_str())
    }

    /// Replaces the diagnostic name.
    pub fn named(mut self, name: &str) -> Terminal {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Terminal {
    fn eq(&self, other: &Self) -> bool {
        self.automaton == other.automaton
    }
}

impl Eq for Terminal {}

impl std::hash::Hash for Terminal {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.automaton.hash(state);
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Terminal({})", self.name)
    }
}

impl From<char> for Terminal {
    fn from(ch: char) -> Terminal {
        Terminal::char(ch)
    }
}

impl From<&str> for Terminal {
    fn from(s: &str) -> Terminal {
        Terminal::string(s)
    }
}

impl ops::BitOr for Terminal {
    type Output = Terminal;

    fn bitor(self, rhs: Terminal) -> Terminal {
        let name = std::format!("{}|{}", self.name, rhs.name);
        Terminal::new(Automaton::union(self.automaton, rhs.automaton), name.as_str())
    }
}

impl ops::BitOr for &Terminal {
    type Output = Terminal;

    fn bitor(self, rhs: &Terminal) -> Terminal {
        self.clone() | rhs.clone()
    }
}

impl ops::Add for Terminal {
    type Output = Terminal;

    fn add(self, rhs: Terminal) -> Terminal {
        let name = std::format!("{}{}", self.name, rhs.name);
        Terminal::new(Automaton::seq(self.automaton, rhs.automaton), name.as_str())
    }
}

impl ops::Add for &Terminal {
    type Output = Terminal;

    fn add(self, rhs: &Terminal) -> Terminal {
        self.clone() + rhs.clone()
    }
}

impl ops::Add<char> for Terminal {
    type Output = Terminal;

    fn add(self, rhs: char) -> Terminal {
        self + Terminal::char(rhs)
    }
}

impl ops::Add<&str> for Terminal {
    type Output = Terminal;

    fn add(self, rhs: &str) -> Terminal {
        self + Terminal::string(rhs)
    }
}

impl ops::BitOr<char> for Terminal {
    type Output = Terminal;

    fn bitor(self, rhs: char) -> Terminal {
        self | Terminal::char(rhs)
    }
}

impl ops::BitOr<&str> for Terminal {
    type Output = Terminal;

    fn bitor(self, rhs: &str) -> Terminal {
        self | Terminal::string(rhs)
    }
}

impl ops::Not for Terminal {
    type Output = Terminal;

    fn not(self) -> Terminal {
        self.complement()
    }
}

impl ops::Not for &Terminal {
    type Output = Terminal;

    fn not(self) -> Terminal {
        self.complement()
    }
}
