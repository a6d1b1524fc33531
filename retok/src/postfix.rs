use crate::alloc::AllocError;
use crate::alloc::Allocator;
use crate::alloc::Block;
use crate::alloc::ChargedVec;
use crate::error::Error;
use crate::error::SyntaxError;
use crate::error::SyntaxErrorKind;
use crate::stream::TokenStream;
use crate::token::Token;
use crate::token::TokenKind;
use tracing::debug;
use tracing::instrument;
use tracing::trace;

/// Rewrites an infix stream into postfix order (shunting-yard).
///
/// The result is a new stream charged to `allocator`; `infix` is only read.
/// `Star`, `QMark` and `Dot` are passed over without output.
#[instrument(skip_all, fields(tokens = infix.len()))]
pub fn convert<'a>(allocator: &'a dyn Allocator, infix: &TokenStream<'_>) -> Result<TokenStream<'a>, Error> {
    let postfix = Converter::new(allocator).run(infix)?;
    debug!(tokens = postfix.len(), "converted to postfix");
    Ok(postfix)
}

struct Operator<'a> {
    token: Token,
    _block: Block<'a>,
}

struct Converter<'a> {
    allocator: &'a dyn Allocator,
    output: TokenStream<'a>,
    operators: ChargedVec<'a, Operator<'a>>,
}

impl<'a> Converter<'a> {
    fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            output: TokenStream::new(allocator),
            operators: ChargedVec::new(allocator),
        }
    }

    fn run(mut self, infix: &TokenStream<'_>) -> Result<TokenStream<'a>, Error> {
        for token in infix.iter() {
            match token.kind {
                TokenKind::SelfChar(_) | TokenKind::CharClass(_) | TokenKind::Quantifier(_) => {
                    self.emit(token)?;
                }
                TokenKind::LParen => self.push_operator(*token)?,
                TokenKind::RParen => self.close_group()?,
                TokenKind::Concat | TokenKind::Pipe => {
                    while self.top_binds_at_least(&token.kind) {
                        self.pop_to_output()?;
                    }
                    self.push_operator(*token)?;
                }
                TokenKind::Star | TokenKind::QMark | TokenKind::Dot => {
                    trace!(offset = token.offset, kind = %token.kind, "passed over");
                }
            }
        }

        while let Some(operator) = self.operators.pop() {
            if operator.token.kind == TokenKind::LParen {
                return Err(unbalanced());
            }
            self.emit(&operator.token)?;
        }
        Ok(self.output)
    }

    fn emit(&mut self, token: &Token) -> Result<(), AllocError> {
        trace!(offset = token.offset, kind = %token.kind, "output");
        self.output.push_copy(token)
    }

    fn push_operator(&mut self, token: Token) -> Result<(), AllocError> {
        let block = Block::of::<Token>(self.allocator)?;
        self.operators.try_push(Operator {
            token,
            _block: block,
        })
    }

    fn pop_to_output(&mut self) -> Result<(), AllocError> {
        match self.operators.pop() {
            Some(operator) => self.emit(&operator.token),
            None => Ok(()),
        }
    }

    /// Whether the stacked operator must be emitted before `incoming` is
    /// pushed. Never crosses an open group.
    fn top_binds_at_least(&self, incoming: &TokenKind) -> bool {
        match self.operators.last() {
            Some(top) if top.token.kind != TokenKind::LParen => {
                top.token.kind.precedence() >= incoming.precedence()
            }
            _ => false,
        }
    }

    fn close_group(&mut self) -> Result<(), Error> {
        loop {
            match self.operators.pop() {
                Some(operator) if operator.token.kind == TokenKind::LParen => return Ok(()),
                Some(operator) => self.emit(&operator.token)?,
                None => return Err(unbalanced()),
            }
        }
    }
}

fn unbalanced() -> Error {
    debug!("unbalanced parenthesis");
    Error::Syntax(SyntaxError::new(0, SyntaxErrorKind::UnbalancedParenthesis))
}
