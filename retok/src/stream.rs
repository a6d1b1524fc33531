use crate::alloc::AllocError;
use crate::alloc::Allocator;
use crate::alloc::Block;
use crate::alloc::ChargedVec;
use crate::token::ByteSet;
use crate::token::Quantifier;
use crate::token::Token;
use crate::token::TokenKind;
use std::fmt;

/// Handle to a token inside the arena of the stream that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenId(usize);

struct Node<'a> {
    token: Token,
    _block: Block<'a>,
    _payload: Option<Block<'a>>,
}

struct Slot<'a> {
    id: TokenId,
    _block: Block<'a>,
}

/// Ordered tokens produced by one scan or one conversion.
///
/// The stream is an arena: `nodes` holds every token it ever allocated, in
/// allocation order, whether or not the token made it into the visible
/// `order`. Each node carries the blocks that were charged for it, and both
/// buffers are charged as they grow, so dropping the stream (including a
/// half-built one on an error path) hands every block back exactly once.
pub struct TokenStream<'a> {
    allocator: &'a dyn Allocator,
    nodes: ChargedVec<'a, Node<'a>>,
    order: ChargedVec<'a, Slot<'a>>,
}

impl<'a> TokenStream<'a> {
    pub(crate) fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            nodes: ChargedVec::new(allocator),
            order: ChargedVec::new(allocator),
        }
    }

    /// Charges a class payload block. The block is owned by the caller until
    /// it is handed to [`Self::alloc_class`].
    pub(crate) fn alloc_class_set(&self) -> Result<Block<'a>, AllocError> {
        Block::of::<ByteSet>(self.allocator)
    }

    /// Allocates a token into the arena without linking it into the sequence.
    pub(crate) fn alloc(&mut self, token: Token) -> Result<TokenId, AllocError> {
        debug_assert!(
            !matches!(token.kind, TokenKind::CharClass(_)),
            "class tokens carry a payload block"
        );
        let block = Block::of::<Token>(self.allocator)?;
        self.track(token, block, None)
    }

    /// Allocates a class token that takes ownership of its payload block.
    pub(crate) fn alloc_class(
        &mut self,
        offset: usize,
        set: ByteSet,
        payload: Block<'a>,
    ) -> Result<TokenId, AllocError> {
        let block = Block::of::<Token>(self.allocator)?;
        let token = Token {
            offset,
            kind: TokenKind::CharClass(set),
        };
        self.track(token, block, Some(payload))
    }

    fn track(
        &mut self,
        token: Token,
        block: Block<'a>,
        payload: Option<Block<'a>>,
    ) -> Result<TokenId, AllocError> {
        let id = TokenId(self.nodes.len());
        self.nodes.try_push(Node {
            token,
            _block: block,
            _payload: payload,
        })?;
        Ok(id)
    }

    /// Appends an allocated token to the visible sequence.
    pub(crate) fn link(&mut self, id: TokenId) -> Result<(), AllocError> {
        let block = Block::of::<TokenId>(self.allocator)?;
        self.order.try_push(Slot { id, _block: block })
    }

    pub(crate) fn push(&mut self, token: Token) -> Result<(), AllocError> {
        let id = self.alloc(token)?;
        self.link(id)
    }

    /// Copies `token` into this stream, charging a fresh payload for classes.
    pub(crate) fn push_copy(&mut self, token: &Token) -> Result<(), AllocError> {
        let id = match token.kind {
            TokenKind::CharClass(set) => {
                let payload = self.alloc_class_set()?;
                self.alloc_class(token.offset, set, payload)?
            }
            _ => self.alloc(*token)?,
        };
        self.link(id)
    }

    pub(crate) fn last(&self) -> Option<&Token> {
        self.order.last().map(|slot| &self.nodes[slot.id.0].token)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.order
            .get(index)
            .map(|slot| &self.nodes[slot.id.0].token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> + '_ {
        self.order.iter().map(|slot| &self.nodes[slot.id.0].token)
    }

    pub fn kinds(&self) -> Vec<TokenKind> {
        self.iter().map(|token| token.kind).collect()
    }

    /// A fresh cursor positioned at the first token.
    pub fn cursor(&self) -> Cursor<'_, 'a> {
        Cursor {
            stream: self,
            position: 0,
        }
    }
}

impl fmt::Display for TokenStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token.kind)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TokenStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Sequential reader over a finished stream.
///
/// The `next_is*` methods compare the token under the cursor with an
/// expectation and move past it, which is all a downstream builder or a test
/// needs to walk a stream in order.
#[derive(Debug, Clone)]
pub struct Cursor<'s, 'a> {
    stream: &'s TokenStream<'a>,
    position: usize,
}

impl<'s> Cursor<'s, '_> {
    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn peek(&self) -> Option<&'s Token> {
        self.stream.get(self.position)
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.stream.len()
    }

    /// Compares the current token's kind (and byte or payload) with
    /// `expected`. Advances whenever a token was present.
    pub fn next_is(&mut self, expected: &TokenKind) -> bool {
        self.next().is_some_and(|token| token.kind == *expected)
    }

    /// Checks that the current token is a class containing every byte of
    /// `members` and, when given, exactly `len` bytes. Advances only past a
    /// class token.
    pub fn next_is_class(&mut self, members: &[u8], len: Option<usize>) -> bool {
        let Some(set) = self.current_class() else {
            return false;
        };
        self.position += 1;
        members.iter().all(|&byte| set.contains(byte)) && len.map_or(true, |n| set.len() == n)
    }

    /// Checks the current token's low and high bounds against `expected`, so
    /// `Range(n, n)` and `Exactly(n)` match each other. Advances only past a
    /// quantifier token.
    pub fn next_is_quantifier(&mut self, expected: Quantifier) -> bool {
        match self.peek().map(|token| token.kind) {
            Some(TokenKind::Quantifier(actual)) => {
                self.position += 1;
                actual.same_bounds(&expected)
            }
            _ => false,
        }
    }

    /// Size of the class under the cursor, without advancing.
    pub fn class_len(&self) -> Option<usize> {
        self.current_class().map(|set| set.len())
    }

    /// Membership test on the class under the cursor, without advancing.
    pub fn class_contains(&self, byte: u8) -> bool {
        self.current_class().is_some_and(|set| set.contains(byte))
    }

    fn current_class(&self) -> Option<ByteSet> {
        match self.peek()?.kind {
            TokenKind::CharClass(set) => Some(set),
            _ => None,
        }
    }
}

impl<'s> Iterator for Cursor<'s, '_> {
    type Item = &'s Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::TrackingAllocator;

    fn token(offset: usize, kind: TokenKind) -> Token {
        Token { offset, kind }
    }

    #[test]
    fn push_and_read_back() {
        let alloc = TrackingAllocator::new();
        let mut stream = TokenStream::new(&alloc);
        stream.push(token(0, TokenKind::SelfChar(b'a'))).unwrap();
        stream.push(token(1, TokenKind::Star)).unwrap();

        assert_eq!(stream.len(), 2);
        assert_eq!(stream.get(1), Some(&token(1, TokenKind::Star)));
        assert_eq!(stream.last().map(|t| t.kind), Some(TokenKind::Star));
        assert_eq!(stream.to_string(), "a *");
        // Two nodes, two slots and one buffer behind each.
        assert_eq!(alloc.outstanding_blocks(), 6);
    }

    #[test]
    fn unlinked_tokens_are_released() {
        let alloc = TrackingAllocator::new();
        {
            let mut stream = TokenStream::new(&alloc);
            stream.alloc(token(0, TokenKind::Concat)).unwrap();
            let payload = stream.alloc_class_set().unwrap();
            stream
                .alloc_class(1, ByteSet::from_iter(*b"xy"), payload)
                .unwrap();
            assert!(stream.is_empty());
            assert_eq!(alloc.outstanding_blocks(), 4);
        }
        assert_eq!(alloc.outstanding_blocks(), 0);
        assert_eq!(alloc.outstanding_bytes(), 0);
    }

    #[test]
    fn class_payload_released_when_node_refused() {
        let alloc = TrackingAllocator::new().with_fail_at(1);
        let mut stream = TokenStream::new(&alloc);
        let payload = stream.alloc_class_set().unwrap();
        let result = stream.alloc_class(0, ByteSet::new(), payload);
        assert!(result.is_err());
        assert_eq!(alloc.outstanding_blocks(), 0);
    }

    #[test]
    fn refused_buffer_growth_releases_node() {
        let alloc = TrackingAllocator::new().with_fail_at(1);
        let mut stream = TokenStream::new(&alloc);
        assert!(stream.alloc(token(0, TokenKind::Pipe)).is_err());
        assert_eq!(alloc.outstanding_blocks(), 0);
        assert_eq!(alloc.double_frees(), 0);
    }

    #[test]
    fn cursor_walk() {
        let alloc = TrackingAllocator::new();
        let mut stream = TokenStream::new(&alloc);
        stream.push(token(0, TokenKind::SelfChar(b'a'))).unwrap();
        let payload = stream.alloc_class_set().unwrap();
        let id = stream
            .alloc_class(1, ByteSet::from_iter(*b"abc"), payload)
            .unwrap();
        stream.link(id).unwrap();
        stream
            .push(token(6, TokenKind::Quantifier(Quantifier::Range(1, 2))))
            .unwrap();

        let mut cursor = stream.cursor();
        assert!(!cursor.next_is_class(b"a", None));
        assert_eq!(cursor.position(), 0);
        assert!(cursor.next_is(&TokenKind::SelfChar(b'a')));
        assert_eq!(cursor.class_len(), Some(3));
        assert!(cursor.class_contains(b'b'));
        assert!(!cursor.class_contains(b'd'));
        assert!(cursor.next_is_class(b"cab", Some(3)));
        assert!(!cursor.next_is_quantifier(Quantifier::AtLeast(1)));
        assert!(cursor.at_end());
        assert!(!cursor.next_is(&TokenKind::Pipe));

        cursor.reset();
        assert!(!cursor.next_is(&TokenKind::SelfChar(b'b')));
        assert!(!cursor.next_is_class(b"abcd", None));
        assert!(cursor.next_is_quantifier(Quantifier::Range(1, 2)));
        assert!(cursor.at_end());
    }

    #[test]
    fn push_copy_charges_new_payload() {
        let alloc = TrackingAllocator::new();
        let mut source = TokenStream::new(&alloc);
        let payload = source.alloc_class_set().unwrap();
        let id = source
            .alloc_class(0, ByteSet::from_iter(*b"q"), payload)
            .unwrap();
        source.link(id).unwrap();
        let before = alloc.outstanding_blocks();

        let mut copy = TokenStream::new(&alloc);
        copy.push_copy(source.get(0).unwrap()).unwrap();
        assert_eq!(alloc.outstanding_blocks(), before * 2);

        drop(source);
        assert_eq!(copy.kinds(), vec![TokenKind::CharClass(ByteSet::from_iter(*b"q"))]);
        drop(copy);
        assert_eq!(alloc.outstanding_blocks(), 0);
    }
}
