//! Pull-based token source shared by the statement parser and the
//! expression analyzer.
//!
//! Both consumers read through the same cursor, so "which tokens have been
//! consumed" is decided in exactly one place: a token is consumed by
//! [`TokenCursor::next`] and returned to the stream with
//! [`TokenCursor::pushback`]. At most one token may be pushed back at a time.

use crate::error::{CompileError, Result};
use crate::token::{Token, TokenType};
use log::debug;

pub struct TokenCursor<'a, I>
where
    I: Iterator<Item = Result<Token<'a>>>,
{
    tokens: I,
    pushed: Option<Token<'a>>,
    last_line: usize,
}

impl<'a, I> TokenCursor<'a, I>
where
    I: Iterator<Item = Result<Token<'a>>>,
{
    pub fn new(tokens: I) -> Self {
        Self {
            tokens,
            pushed: None,
            last_line: 1,
        }
    }

    /// Consume one token. Once the underlying stream is exhausted every call
    /// yields `EOF`.
    pub fn next(&mut self) -> Result<Token<'a>> {
        if let Some(token) = self.pushed.take() {
            debug!("Re-reading pushed back token {:?}", token.token_type);
            return Ok(token);
        }

        match self.tokens.next() {
            Some(Ok(token)) => {
                self.last_line = token.line;
                Ok(token)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Token::new(TokenType::EOF, "", self.last_line)),
        }
    }

    /// Make the next [`next`](Self::next) call return `token` again.
    pub fn pushback(&mut self, token: Token<'a>) -> Result<()> {
        if let Some(held) = &self.pushed {
            return Err(CompileError::internal(format!(
                "pushback of {:?} while {:?} is still pending",
                token.token_type, held.token_type
            )));
        }

        debug!("Pushing back token {:?}", token.token_type);
        self.pushed = Some(token);

        Ok(())
    }

    /// Line of the most recently produced token, for diagnostics.
    pub fn line(&self) -> usize {
        self.pushed.as_ref().map_or(self.last_line, |t| t.line)
    }
}
