//! Regex front end: scans a byte pattern into infix tokens and rewrites them
//! into postfix order for an automaton builder.
//!
//! ```
//! use retok::{convert, scan_all, SystemAllocator};
//!
//! let infix = scan_all(&SystemAllocator, b"a(b|c)d").unwrap();
//! assert_eq!(infix.to_string(), "a ccat ( b | c ) ccat d");
//!
//! let postfix = convert(&SystemAllocator, &infix).unwrap();
//! assert_eq!(postfix.to_string(), "a b c | ccat d ccat");
//! ```

mod alloc;
mod diagnostic;
mod error;
mod lexer;
mod postfix;
mod stream;
mod token;


pub use alloc::AllocError;
pub use alloc::Allocator;
pub use alloc::Block;
pub use alloc::SystemAllocator;
pub use alloc::TrackingAllocator;
pub use error::Error;
pub use error::SyntaxError;
pub use error::SyntaxErrorKind;
pub use lexer::scan;
pub use lexer::scan_all;
pub use postfix::convert;
pub use stream::Cursor;
pub use stream::TokenStream;
pub use token::ByteSet;
pub use token::Quantifier;
pub use token::Token;
pub use token::TokenKind;
