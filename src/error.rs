//! Centralised error hierarchy for the **lunac** front end.
//!
//! Every subsystem (scanner, token cursor, expression analyzer, statement
//! parser, symbol tables) reports failure through one of the variants defined
//! here.  The pass stops at the first error, so a single value is all a caller
//! ever sees; [`CompileError::exit_code`] turns it into the process status the
//! driver surfaces verbatim.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the compiler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Lexical error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Unexpected token.
    #[error("[line {line}] Syntax error: {message}")]
    Syntax { message: String, line: usize },

    /// Unknown identifier or function, redefinition, or a local/global
    /// name collision.
    #[error("[line {line}] Semantic error: {message}")]
    Undefined { message: String, line: usize },

    /// Initializer or assignment type incompatible with its target.
    #[error("[line {line}] Assignment type error: {message}")]
    Assign { message: String, line: usize },

    /// Parameter/return count or per-position type mismatch.
    #[error("[line {line}] Parameter error: {message}")]
    Params { message: String, line: usize },

    /// Operand type invalid for its operator.
    #[error("[line {line}] Type error: {message}")]
    Type { message: String, line: usize },

    /// `nil` used where an ordered value is required.
    #[error("[line {line}] Nil error: {message}")]
    Nil { message: String, line: usize },

    /// Broken internal invariant (e.g. double pushback).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CompileError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        CompileError::Lex { message, line }
    }

    pub fn syntax<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Syntax error: line={}, msg={}", line, message);

        CompileError::Syntax { message, line }
    }

    pub fn undefined<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Undefined error: line={}, msg={}", line, message);

        CompileError::Undefined { message, line }
    }

    pub fn assign<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Assign error: line={}, msg={}", line, message);

        CompileError::Assign { message, line }
    }

    pub fn params<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Params error: line={}, msg={}", line, message);

        CompileError::Params { message, line }
    }

    pub fn type_mismatch<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Type error: line={}, msg={}", line, message);

        CompileError::Type { message, line }
    }

    pub fn nil<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Nil error: line={}, msg={}", line, message);

        CompileError::Nil { message, line }
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Internal error: msg={}", message);

        CompileError::Internal(message)
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Lex { .. } => 1,
            CompileError::Syntax { .. } => 2,
            CompileError::Undefined { .. } => 3,
            CompileError::Assign { .. } => 4,
            CompileError::Params { .. } => 5,
            CompileError::Type { .. } => 6,
            CompileError::Nil { .. } => 8,
            CompileError::Internal(_) | CompileError::Io(_) => 99,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, CompileError>;
