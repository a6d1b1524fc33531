use crate::alloc::Allocator;
use crate::error::Error;
use crate::error::SyntaxError;
use crate::error::SyntaxErrorKind;
use crate::stream::TokenStream;
use crate::token::ByteSet;
use crate::token::Quantifier;
use crate::token::Token;
use crate::token::TokenKind;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

/// Scans `bytes[start..start + length]` into an infix token stream.
///
/// Error offsets are indices into `bytes`, not into the scanned window. On
/// failure nothing allocated by the scan is left charged to `allocator`.
#[instrument(skip_all, fields(start = start, length = length))]
pub fn scan<'a>(
    allocator: &'a dyn Allocator,
    bytes: &[u8],
    start: usize,
    length: usize,
) -> Result<TokenStream<'a>, Error> {
    let end = match start.checked_add(length) {
        Some(end) if end <= bytes.len() => end,
        _ => {
            return Err(Error::InputRange {
                start,
                length,
                len: bytes.len(),
            })
        }
    };
    let stream = Lexer::new(allocator, bytes, start, end).run()?;
    debug!(tokens = stream.len(), "scanned pattern");
    Ok(stream)
}

/// Scans the whole of `bytes`.
pub fn scan_all<'a>(allocator: &'a dyn Allocator, bytes: &[u8]) -> Result<TokenStream<'a>, Error> {
    scan(allocator, bytes, 0, bytes.len())
}

pub(crate) struct Lexer<'s, 'a> {
    whole: &'s [u8],
    byte: usize,
    end: usize,
    stream: TokenStream<'a>,
}

#[derive(Debug, Clone, Copy)]
enum ClassState {
    Empty,
    Pending(u8),
    RangeStarted(u8),
}

#[derive(Debug, Clone, Copy)]
enum ClassItem {
    Literal(u8),
    Dash,
    Close,
}

impl<'s, 'a> Lexer<'s, 'a> {
    pub fn new(allocator: &'a dyn Allocator, whole: &'s [u8], start: usize, end: usize) -> Self {
        Self {
            whole,
            byte: start,
            end,
            stream: TokenStream::new(allocator),
        }
    }

    pub fn run(mut self) -> Result<TokenStream<'a>, Error> {
        while let Some((at, byte)) = self.bump() {
            match byte {
                b'\\' => {
                    let Some((_, escaped)) = self.bump() else {
                        return Err(self.syntax_error(at, SyntaxErrorKind::UnterminatedEscape));
                    };
                    self.emit_unit(TokenKind::SelfChar(escaped), at)?;
                }
                b'*' => self.emit(TokenKind::Star, at)?,
                b'|' => self.emit(TokenKind::Pipe, at)?,
                b'(' => self.emit_unit(TokenKind::LParen, at)?,
                b')' => self.emit(TokenKind::RParen, at)?,
                b'[' => self.char_class(at)?,
                b'{' => self.quantifier(at)?,
                c => self.emit_unit(TokenKind::SelfChar(c), at)?,
            }
        }
        Ok(self.stream)
    }

    fn peek(&self) -> Option<(usize, u8)> {
        if self.byte < self.end {
            Some((self.byte, self.whole[self.byte]))
        } else {
            None
        }
    }

    fn bump(&mut self) -> Option<(usize, u8)> {
        let next = self.peek()?;
        self.byte += 1;
        Some(next)
    }

    fn skip_blanks(&mut self) {
        while let Some((_, b' ' | b'\t')) = self.peek() {
            self.byte += 1;
        }
    }

    fn syntax_error(&self, offset: usize, kind: SyntaxErrorKind) -> Error {
        debug!(offset, ?kind, "syntax error");
        Error::Syntax(SyntaxError::new(offset, kind))
    }

    fn emit(&mut self, kind: TokenKind, offset: usize) -> Result<(), Error> {
        trace!(offset, %kind, "token");
        self.stream.push(Token { offset, kind })?;
        Ok(())
    }

    /// Emits the start of a new matchable unit, joining it to a preceding
    /// char or group with an implicit `Concat`.
    fn emit_unit(&mut self, kind: TokenKind, offset: usize) -> Result<(), Error> {
        self.maybe_concat(offset)?;
        self.emit(kind, offset)
    }

    fn maybe_concat(&mut self, offset: usize) -> Result<(), Error> {
        let joins = matches!(
            self.stream.last().map(|token| token.kind),
            Some(TokenKind::SelfChar(_) | TokenKind::RParen)
        );
        if joins {
            self.emit(TokenKind::Concat, offset)?;
        }
        Ok(())
    }

    fn char_class(&mut self, open: usize) -> Result<(), Error> {
        // Charged up front so a refusal here unwinds like any other.
        let payload = self.stream.alloc_class_set()?;
        let mut set = ByteSet::new();
        let inverted = matches!(self.peek(), Some((_, b'^')));
        if inverted {
            self.byte += 1;
        }

        let mut state = ClassState::Empty;
        loop {
            let Some((_, byte)) = self.bump() else {
                return Err(self.syntax_error(open, SyntaxErrorKind::UnterminatedCharClass));
            };
            let item = match byte {
                b'\\' => match self.bump() {
                    Some((_, escaped)) => ClassItem::Literal(escaped),
                    None => {
                        return Err(
                            self.syntax_error(open, SyntaxErrorKind::UnterminatedCharClass)
                        )
                    }
                },
                b']' => ClassItem::Close,
                b'-' => ClassItem::Dash,
                b => ClassItem::Literal(b),
            };

            state = match (state, item) {
                (ClassState::Empty, ClassItem::Close) => break,
                (ClassState::Pending(prev), ClassItem::Close) => {
                    set.insert(prev);
                    break;
                }
                (ClassState::RangeStarted(prev), ClassItem::Close) => {
                    set.insert(prev);
                    set.insert(b'-');
                    break;
                }
                (ClassState::Empty, ClassItem::Dash) => {
                    set.insert(b'-');
                    ClassState::Empty
                }
                (ClassState::Empty, ClassItem::Literal(c)) => ClassState::Pending(c),
                (ClassState::Pending(prev), ClassItem::Dash) => ClassState::RangeStarted(prev),
                (ClassState::Pending(prev), ClassItem::Literal(c)) => {
                    set.insert(prev);
                    ClassState::Pending(c)
                }
                (ClassState::RangeStarted(prev), ClassItem::Literal(c)) => {
                    set.insert_range(prev, c);
                    ClassState::Empty
                }
                (ClassState::RangeStarted(prev), ClassItem::Dash) => {
                    set.insert_range(prev, b'-');
                    ClassState::Empty
                }
            };
        }

        if inverted {
            set = set.complement();
        }

        self.maybe_concat(open)?;
        trace!(offset = open, members = set.len(), inverted, "char class");
        let id = self.stream.alloc_class(open, set, payload)?;
        self.stream.link(id)?;
        Ok(())
    }

    fn quantifier(&mut self, open: usize) -> Result<(), Error> {
        self.skip_blanks();
        let low = self.digits()?;
        self.skip_blanks();

        let Some((at, byte)) = self.bump() else {
            return Err(self.syntax_error(open, SyntaxErrorKind::UnterminatedQuantifier));
        };
        let quantifier = match (byte, low) {
            (b'}', Some((_, n))) => Quantifier::Exactly(n),
            (b',', _) => {
                self.skip_blanks();
                let high = self.digits()?;
                self.skip_blanks();
                let Some((at, byte)) = self.bump() else {
                    return Err(self.syntax_error(open, SyntaxErrorKind::UnterminatedQuantifier));
                };
                if byte != b'}' {
                    return Err(self.syntax_error(at, SyntaxErrorKind::MalformedQuantifier));
                }
                if let (Some((_, lo)), Some((hi_at, hi))) = (low, high) {
                    if hi < lo {
                        return Err(
                            self.syntax_error(hi_at, SyntaxErrorKind::InvertedQuantifierRange)
                        );
                    }
                }
                let bounds = Quantifier::from_bounds(low.map(|(_, n)| n), high.map(|(_, n)| n));
                match bounds {
                    Some(quantifier) => quantifier,
                    None => {
                        return Err(self.syntax_error(at, SyntaxErrorKind::MalformedQuantifier))
                    }
                }
            }
            _ => return Err(self.syntax_error(at, SyntaxErrorKind::MalformedQuantifier)),
        };

        self.emit_unit(TokenKind::Quantifier(quantifier), open)
    }

    /// Reads a run of decimal digits, returning the offset of its first digit
    /// and its value.
    fn digits(&mut self) -> Result<Option<(usize, usize)>, Error> {
        let first = match self.peek() {
            Some((at, byte)) if byte.is_ascii_digit() => at,
            _ => return Ok(None),
        };
        let mut value: usize = 0;
        while let Some((at, byte)) = self.peek() {
            if !byte.is_ascii_digit() {
                break;
            }
            value = match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(byte - b'0')))
            {
                Some(value) => value,
                None => return Err(self.syntax_error(at, SyntaxErrorKind::QuantifierOverflow)),
            };
            self.byte += 1;
        }
        Ok(Some((first, value)))
    }
}
