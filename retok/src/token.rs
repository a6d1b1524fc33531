use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub offset: usize,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    SelfChar(u8),
    Concat,
    Pipe,
    Star,
    Dot,
    QMark,
    LParen,
    RParen,
    CharClass(ByteSet),
    Quantifier(Quantifier),
}

impl TokenKind {
    /// Binding strength used by the postfix converter, lowest first.
    ///
    /// Only `Pipe` and `Concat` ever meet on the operator stack; the other
    /// ranks keep the table total over the operator-like kinds.
    pub fn precedence(&self) -> Option<u8> {
        match self {
            TokenKind::Pipe => Some(1),
            TokenKind::Concat => Some(2),
            TokenKind::Star | TokenKind::QMark => Some(3),
            TokenKind::LParen | TokenKind::RParen | TokenKind::CharClass(_) => Some(4),
            TokenKind::Quantifier(_) => Some(5),
            TokenKind::SelfChar(_) | TokenKind::Dot => None,
        }
    }

    /// True for kinds that stand for something to match rather than an
    /// operator over other units.
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::SelfChar(_) | TokenKind::CharClass(_) | TokenKind::Quantifier(_)
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::SelfChar(b) if b.is_ascii_graphic() => write!(f, "{}", *b as char),
            TokenKind::SelfChar(b) => write!(f, "\\x{b:02x}"),
            TokenKind::Concat => f.write_str("ccat"),
            TokenKind::Pipe => f.write_str("|"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::QMark => f.write_str("?"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::CharClass(set) => write!(f, "{set}"),
            TokenKind::Quantifier(q) => write!(f, "{q}"),
        }
    }
}

/// Repetition bound attached to a `Quantifier` token.
///
/// `{n}` and `{n,}` are different bounds and stay different here. Equal
/// bounds are canonically `Exactly`; use [`Quantifier::same_bounds`] to
/// compare values that may have been built as `Range(n, n)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Range(usize, usize),
}

impl Quantifier {
    /// Builds a bound from the `(low, high)` view. `None` when neither side is
    /// present, since a quantifier needs at least one.
    pub fn from_bounds(low: Option<usize>, high: Option<usize>) -> Option<Self> {
        match (low, high) {
            (Some(lo), Some(hi)) if lo == hi => Some(Quantifier::Exactly(lo)),
            (Some(lo), Some(hi)) => Some(Quantifier::Range(lo, hi)),
            (Some(lo), None) => Some(Quantifier::AtLeast(lo)),
            (None, Some(hi)) => Some(Quantifier::AtMost(hi)),
            (None, None) => None,
        }
    }

    pub fn low(&self) -> Option<usize> {
        match *self {
            Quantifier::Exactly(n) | Quantifier::AtLeast(n) | Quantifier::Range(n, _) => Some(n),
            Quantifier::AtMost(_) => None,
        }
    }

    /// `None` means unbounded.
    pub fn high(&self) -> Option<usize> {
        match *self {
            Quantifier::Exactly(n) | Quantifier::AtMost(n) | Quantifier::Range(_, n) => Some(n),
            Quantifier::AtLeast(_) => None,
        }
    }

    pub fn same_bounds(&self, other: &Quantifier) -> bool {
        self.low() == other.low() && self.high() == other.high()
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Exactly(n) => write!(f, "{{{n}}}"),
            Quantifier::AtLeast(n) => write!(f, "{{{n},}}"),
            Quantifier::AtMost(n) => write!(f, "{{,{n}}}"),
            Quantifier::Range(lo, hi) => write!(f, "{{{lo},{hi}}}"),
        }
    }
}

/// Set of byte values, one bit per value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    pub const fn new() -> Self {
        Self { bits: [0; 4] }
    }

    pub fn insert(&mut self, byte: u8) {
        self.bits[usize::from(byte >> 6)] |= 1 << (byte & 63);
    }

    /// Inserts every byte between `a` and `b` inclusive, in whichever order
    /// they are given.
    pub fn insert_range(&mut self, a: u8, b: u8) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        for byte in lo..=hi {
            self.insert(byte);
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.bits[usize::from(byte >> 6)] & (1 << (byte & 63)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }

    /// Every byte value not in `self`.
    pub fn complement(&self) -> Self {
        Self {
            bits: self.bits.map(|word| !word),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |&byte| self.contains(byte))
    }
}

impl FromIterator<u8> for ByteSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = ByteSet::new();
        for byte in iter {
            set.insert(byte);
        }
        set
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for byte in self.iter() {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn byte_set_membership() {
        let mut set = ByteSet::new();
        assert!(set.is_empty());
        set.insert(b'a');
        set.insert(0);
        set.insert(255);
        set.insert(b'a');
        assert_eq!(set.len(), 3);
        assert!(set.contains(b'a'));
        assert!(set.contains(0));
        assert!(set.contains(255));
        assert!(!set.contains(b'b'));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, b'a', 255]);
    }

    #[test_case(b'a', b'c'; "ascending")]
    #[test_case(b'c', b'a'; "descending")]
    fn byte_set_range(a: u8, b: u8) {
        let mut set = ByteSet::new();
        set.insert_range(a, b);
        assert_eq!(set, ByteSet::from_iter(*b"abc"));
    }

    #[test]
    fn byte_set_full_range_and_complement() {
        let mut set = ByteSet::new();
        set.insert_range(0, 255);
        assert_eq!(set.len(), 256);
        assert!(set.complement().is_empty());

        let abc = ByteSet::from_iter(*b"abc");
        let inverted = abc.complement();
        assert_eq!(inverted.len(), 253);
        assert!(!inverted.contains(b'b'));
        assert!(inverted.contains(b'z'));
    }

    #[test_case(Some(2), Some(2), Some(Quantifier::Exactly(2)); "equal bounds")]
    #[test_case(Some(1), Some(3), Some(Quantifier::Range(1, 3)); "range")]
    #[test_case(Some(4), None, Some(Quantifier::AtLeast(4)); "at least")]
    #[test_case(None, Some(5), Some(Quantifier::AtMost(5)); "at most")]
    #[test_case(None, None, None; "no bounds")]
    fn quantifier_from_bounds(low: Option<usize>, high: Option<usize>, expected: Option<Quantifier>) {
        assert_eq!(Quantifier::from_bounds(low, high), expected);
    }

    #[test_case(Quantifier::Exactly(3), Some(3), Some(3); "exactly")]
    #[test_case(Quantifier::AtLeast(3), Some(3), None; "at least")]
    #[test_case(Quantifier::AtMost(3), None, Some(3); "at most")]
    #[test_case(Quantifier::Range(1, 3), Some(1), Some(3); "range")]
    fn quantifier_bounds(q: Quantifier, low: Option<usize>, high: Option<usize>) {
        assert_eq!(q.low(), low);
        assert_eq!(q.high(), high);
    }

    #[test_case(Quantifier::Exactly(2); "exactly")]
    #[test_case(Quantifier::Range(2, 2); "degenerate range")]
    #[test_case(Quantifier::Range(1, 3); "range")]
    #[test_case(Quantifier::AtLeast(2); "at least")]
    #[test_case(Quantifier::AtMost(2); "at most")]
    fn quantifier_bounds_round_trip(q: Quantifier) {
        let rebuilt = Quantifier::from_bounds(q.low(), q.high()).unwrap();
        assert!(rebuilt.same_bounds(&q));
        assert_eq!(Quantifier::from_bounds(rebuilt.low(), rebuilt.high()), Some(rebuilt));
    }

    #[test]
    fn same_bounds_keeps_exact_and_at_least_apart() {
        assert!(Quantifier::Exactly(2).same_bounds(&Quantifier::Range(2, 2)));
        assert!(!Quantifier::Exactly(2).same_bounds(&Quantifier::AtLeast(2)));
        assert!(!Quantifier::AtMost(2).same_bounds(&Quantifier::Range(0, 2)));
    }

    #[test]
    fn precedence_order() {
        let pipe = TokenKind::Pipe.precedence();
        let concat = TokenKind::Concat.precedence();
        let star = TokenKind::Star.precedence();
        let paren = TokenKind::LParen.precedence();
        let quant = TokenKind::Quantifier(Quantifier::AtLeast(1)).precedence();
        assert!(pipe < concat);
        assert!(concat < star);
        assert!(star < paren);
        assert!(paren < quant);
        assert_eq!(TokenKind::QMark.precedence(), star);
        assert_eq!(TokenKind::SelfChar(b'a').precedence(), None);
    }

    #[test]
    fn display() {
        assert_eq!(TokenKind::SelfChar(b'a').to_string(), "a");
        assert_eq!(TokenKind::SelfChar(b'\n').to_string(), "\\x0a");
        assert_eq!(TokenKind::Concat.to_string(), "ccat");
        assert_eq!(
            TokenKind::CharClass(ByteSet::from_iter(*b"ca")).to_string(),
            "[ac]"
        );
        assert_eq!(TokenKind::Quantifier(Quantifier::AtMost(3)).to_string(), "{,3}");
        assert_eq!(TokenKind::Quantifier(Quantifier::Exactly(3)).to_string(), "{3}");
    }
}
