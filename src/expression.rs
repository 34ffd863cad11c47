//! Operator‑precedence expression analyzer with integrated type inference.
//!
//! The analyzer reads tokens from the shared [`TokenCursor`] until the incoming
//! token cannot continue the expression, then pushes that token back so the
//! statement parser sees it next. No tree is built: every shift of an operand and
//! every reduction of an operator is reported to the [`Backend`] immediately, so
//! evaluation code is produced in analysis order.
//!
//! Precedence table
//! ----------------
//!
//! Rows are the topmost *terminal* on the stack, columns the incoming symbol.
//! `<` shift (push a handle, then the symbol), `>` reduce, `=` push without a
//! handle, `A` accept, `.` error.
//!
//! ```text
//!           #   */  +-  ..  rel  (   )   id  $
//!     #     <   >   >   >   >    <   >   <   >
//!     */    <   >   >   >   >    <   >   <   >
//!     +-    <   <   >   >   >    <   >   <   >
//!     ..    <   <   <   <   >    <   >   <   >
//!     rel   <   <   <   <   >    <   >   <   >
//!     (     <   <   <   <   <    <   =   <   .
//!     )     .   >   >   >   >    .   >   .   >
//!     id    .   >   >   >   >    .   >   .   >
//!     $     <   <   <   <   <    <   .   <   A
//! ```
//!
//! `..` is right associative, everything else left associative.
//!
//! End of expression
//! -----------------
//!
//! Statements carry no separators, so the end of an expression is decided by
//! context: an operand or `(` arriving right after a complete operand, a `)`
//! that has no matching `(`, and every non-expression token all classify as
//! the end marker `$`.
//!
//! Deferred calls
//! --------------
//!
//! Calls are not operands. When the very first token of an expression names a
//! global function, the analyzer pushes that identifier back and returns
//! [`ExprOutcome::DeferredCall`] so the statement parser can take the call over.
//! A function name anywhere later in the expression is a syntax error.

use crate::backend::{Backend, Comparison, Event, Operand, Operator, VarRef};
use crate::cursor::TokenCursor;
use crate::error::{CompileError, Result};
use crate::symtable::SymbolTable;
use crate::token::{Token, TokenType};
use crate::types::{ExprType, Type};

use log::{debug, info};

/// Every symbol class the analyzer distinguishes, including the synthetic
/// handle and non-terminal markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Len,
    Mul,
    Div,
    IntDiv,
    Plus,
    Minus,
    Concat,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LeftParen,
    RightParen,
    Id,
    Int,
    Num,
    Str,
    Nil,
    Dollar,
    Handle,
    NonTerm,
}

/// Precedence table index classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Index {
    Len = 0,
    MulDiv,
    PlusMinus,
    Concat,
    Relation,
    LeftParen,
    RightParen,
    Operand,
    Dollar,
}

impl Symbol {
    fn index(self) -> Option<Index> {
        match self {
            Symbol::Len => Some(Index::Len),
            Symbol::Mul | Symbol::Div | Symbol::IntDiv => Some(Index::MulDiv),
            Symbol::Plus | Symbol::Minus => Some(Index::PlusMinus),
            Symbol::Concat => Some(Index::Concat),
            Symbol::Eq
            | Symbol::NotEq
            | Symbol::Less
            | Symbol::LessEq
            | Symbol::Greater
            | Symbol::GreaterEq => Some(Index::Relation),
            Symbol::LeftParen => Some(Index::LeftParen),
            Symbol::RightParen => Some(Index::RightParen),
            Symbol::Id | Symbol::Int | Symbol::Num | Symbol::Str | Symbol::Nil => {
                Some(Index::Operand)
            }
            Symbol::Dollar => Some(Index::Dollar),
            Symbol::Handle | Symbol::NonTerm => None,
        }
    }

    fn is_operand(self) -> bool {
        matches!(self.index(), Some(Index::Operand))
    }

    fn is_binary_operator(self) -> bool {
        matches!(
            self.index(),
            Some(Index::MulDiv | Index::PlusMinus | Index::Concat | Index::Relation)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Shift,
    Equal,
    Reduce,
    Accept,
    Error,
}

use Action::{Accept as A, Equal as Q, Error as X, Reduce as R, Shift as S};

const TABLE: [[Action; 9]; 9] = [
    //  #  */ +-  ..  rel  (  )  id  $
    [S, R, R, R, R, S, R, S, R], // #
    [S, R, R, R, R, S, R, S, R], // * / //
    [S, S, R, R, R, S, R, S, R], // + -
    [S, S, S, S, R, S, R, S, R], // ..
    [S, S, S, S, R, S, R, S, R], // relational
    [S, S, S, S, S, S, Q, S, X], // (
    [X, R, R, R, R, X, R, X, R], // )
    [X, R, R, R, R, X, R, X, R], // operand
    [S, S, S, S, S, S, X, S, A], // $
];

fn action(top: Symbol, incoming: Symbol) -> Action {
    match (top.index(), incoming.index()) {
        (Some(row), Some(col)) => TABLE[row as usize][col as usize],
        _ => Action::Error,
    }
}

/// Result of analyzing one expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOutcome {
    Typed(ExprType),
    /// The expression position holds a function call; its name has been
    /// pushed back onto the cursor.
    DeferredCall,
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Terminal {
        symbol: Symbol,
        /// Inferred type of an operand terminal.
        ty: Option<Type>,
    },
    Handle,
    NonTerm(ExprType),
}

impl Item {
    fn terminal(symbol: Symbol) -> Self {
        Item::Terminal { symbol, ty: None }
    }
}

/// Type computed for a reduction, plus the evaluation-stack depths whose
/// Integer value must be widened before the operator runs.
struct Reduction {
    result: ExprType,
    widen: Vec<usize>,
}

impl Reduction {
    fn plain(result: ExprType) -> Self {
        Self {
            result,
            widen: Vec::new(),
        }
    }
}

pub struct ExpressionAnalyzer<'c, 'a, I, B>
where
    I: Iterator<Item = Result<Token<'a>>>,
    B: Backend,
{
    cursor: &'c mut TokenCursor<'a, I>,
    symbols: &'c SymbolTable,
    backend: &'c mut B,
    stack: Vec<Item>,
    expect_operand: bool,
    paren_depth: usize,
}

impl<'c, 'a, I, B> ExpressionAnalyzer<'c, 'a, I, B>
where
    I: Iterator<Item = Result<Token<'a>>>,
    B: Backend,
{
    pub fn new(
        cursor: &'c mut TokenCursor<'a, I>,
        symbols: &'c SymbolTable,
        backend: &'c mut B,
    ) -> Self {
        Self {
            cursor,
            symbols,
            backend,
            stack: vec![Item::terminal(Symbol::Dollar)],
            expect_operand: true,
            paren_depth: 0,
        }
    }

    /// Analyze one expression starting at the cursor.
    pub fn analyze(mut self) -> Result<ExprOutcome> {
        let mut token: Token<'a> = self.cursor.next()?;
        let mut symbol: Symbol = self.classify(&token);

        loop {
            let top: Symbol = self.top_terminal();

            match action(top, symbol) {
                Action::Shift => {
                    if symbol == Symbol::Id && self.names_function(&token) {
                        return self.defer_call(token);
                    }

                    let item = self.shift_item(&token, symbol)?;
                    let at = self.top_terminal_position() + 1;
                    self.stack.insert(at, Item::Handle);
                    self.stack.push(item);
                    self.advance_state(symbol);

                    token = self.cursor.next()?;
                    symbol = self.classify(&token);
                }

                Action::Equal => {
                    self.stack.push(Item::terminal(symbol));
                    self.advance_state(symbol);

                    token = self.cursor.next()?;
                    symbol = self.classify(&token);
                }

                Action::Reduce => self.reduce(token.line)?,

                Action::Accept => return self.accept(token),

                Action::Error => {
                    return Err(CompileError::syntax(
                        token.line,
                        format!("Unexpected '{}' in expression", token.lexeme),
                    ));
                }
            }
        }
    }

    // ───────────────────────── classification ─────────────────────────

    fn classify(&self, token: &Token<'a>) -> Symbol {
        let symbol = match token.token_type {
            TokenType::HASH => Symbol::Len,
            TokenType::STAR => Symbol::Mul,
            TokenType::SLASH => Symbol::Div,
            TokenType::SLASH_SLASH => Symbol::IntDiv,
            TokenType::PLUS => Symbol::Plus,
            TokenType::MINUS => Symbol::Minus,
            TokenType::DOT_DOT => Symbol::Concat,
            TokenType::EQUAL_EQUAL => Symbol::Eq,
            TokenType::TILDE_EQUAL => Symbol::NotEq,
            TokenType::LESS => Symbol::Less,
            TokenType::LESS_EQUAL => Symbol::LessEq,
            TokenType::GREATER => Symbol::Greater,
            TokenType::GREATER_EQUAL => Symbol::GreaterEq,
            TokenType::LEFT_PAREN => Symbol::LeftParen,
            TokenType::RIGHT_PAREN => Symbol::RightParen,
            TokenType::IDENTIFIER => Symbol::Id,
            TokenType::INTEGER(_) => Symbol::Int,
            TokenType::NUMBER(_) => Symbol::Num,
            TokenType::STRING(_) => Symbol::Str,
            TokenType::NIL => Symbol::Nil,
            _ => Symbol::Dollar,
        };

        // An operand (or an opening parenthesis) right after a complete
        // operand starts the next statement.
        if !self.expect_operand && (symbol.is_operand() || symbol == Symbol::LeftParen) {
            return Symbol::Dollar;
        }

        if symbol == Symbol::RightParen && self.paren_depth == 0 {
            return Symbol::Dollar;
        }

        symbol
    }

    fn advance_state(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::LeftParen => {
                self.paren_depth += 1;
                self.expect_operand = true;
            }
            Symbol::RightParen => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                self.expect_operand = false;
            }
            s if s.is_operand() => self.expect_operand = false,
            _ => self.expect_operand = true,
        }
    }

    // ───────────────────────── stack helpers ─────────────────────────

    fn top_terminal_position(&self) -> usize {
        self.stack
            .iter()
            .rposition(|item| matches!(item, Item::Terminal { .. }))
            .unwrap_or(0)
    }

    fn top_terminal(&self) -> Symbol {
        match self.stack[self.top_terminal_position()] {
            Item::Terminal { symbol, .. } => symbol,
            _ => Symbol::Dollar,
        }
    }

    fn names_function(&self, token: &Token<'a>) -> bool {
        self.symbols.local_find(token.lexeme).is_none()
            && self.symbols.global_find(token.lexeme).is_some()
    }

    fn defer_call(&mut self, token: Token<'a>) -> Result<ExprOutcome> {
        if self.stack.len() > 1 {
            return Err(CompileError::syntax(
                token.line,
                format!("Call of '{}' is not allowed inside an expression", token.lexeme),
            ));
        }

        debug!("Deferring call of '{}' to the statement parser", token.lexeme);
        self.cursor.pushback(token)?;

        Ok(ExprOutcome::DeferredCall)
    }

    /// Build the stack item for a shifted symbol, reporting operands to the
    /// backend as they are recognised.
    fn shift_item(&mut self, token: &Token<'a>, symbol: Symbol) -> Result<Item> {
        if !symbol.is_operand() {
            return Ok(Item::terminal(symbol));
        }

        let (operand, ty): (Operand, Type) = match &token.token_type {
            TokenType::IDENTIFIER => {
                let Some(var) = self.symbols.local_find(token.lexeme) else {
                    return Err(CompileError::undefined(
                        token.line,
                        format!("Undefined variable '{}'", token.lexeme),
                    ));
                };

                (
                    Operand::Variable(VarRef {
                        name: var.name.clone(),
                        frame: var.frame,
                    }),
                    var.ty,
                )
            }
            TokenType::INTEGER(n) => (Operand::Integer(*n), Type::Integer),
            TokenType::NUMBER(n) => (Operand::Number(*n), Type::Number),
            TokenType::STRING(s) => (Operand::Str(s.clone()), Type::String),
            _ => (Operand::Nil, Type::Nil),
        };

        debug!("Shift operand {} : {}", operand, ty);
        self.backend.emit(Event::PushOperand(operand));

        Ok(Item::Terminal {
            symbol,
            ty: Some(ty),
        })
    }

    // ───────────────────────── reduction ─────────────────────────

    fn reduce(&mut self, line: usize) -> Result<()> {
        let handle = self
            .stack
            .iter()
            .rposition(|item| *item == Item::Handle)
            .ok_or_else(|| CompileError::syntax(line, "Malformed expression"))?;

        let window: Vec<Item> = self.stack.split_off(handle + 1);
        self.stack.pop(); // the handle itself

        let result: ExprType = match window.as_slice() {
            // E → operand
            [Item::Terminal {
                symbol,
                ty: Some(ty),
            }] if symbol.is_operand() => ExprType::Value(*ty),

            // E → ( E )
            [Item::Terminal {
                symbol: Symbol::LeftParen,
                ..
            }, Item::NonTerm(inner), Item::Terminal {
                symbol: Symbol::RightParen,
                ..
            }] => *inner,

            // E → # E
            [Item::Terminal {
                symbol: Symbol::Len,
                ..
            }, Item::NonTerm(operand)] => {
                let result = length_of(*operand, line)?;
                self.backend.emit(Event::PushOperator {
                    op: Operator::Len,
                    result: Type::Integer,
                });
                result
            }

            // E → E op E
            [Item::NonTerm(left), Item::Terminal { symbol: op, .. }, Item::NonTerm(right)]
                if op.is_binary_operator() =>
            {
                let reduction = binary(*op, *left, *right, line)?;

                for depth in &reduction.widen {
                    self.backend.emit(Event::IntToNumber { depth: *depth });
                }

                self.emit_operator(*op, reduction.result);
                reduction.result
            }

            _ => return Err(CompileError::syntax(line, "Malformed expression")),
        };

        debug!("Reduced to {}", result);
        self.stack.push(Item::NonTerm(result));

        Ok(())
    }

    fn emit_operator(&mut self, op: Symbol, result: ExprType) {
        let event = match (comparison_of(op), result) {
            (Some(cmp), _) => Event::PushCompare(cmp),
            (None, ExprType::Value(result)) => match operator_of(op) {
                Some(op) => Event::PushOperator { op, result },
                None => return,
            },
            (None, ExprType::Condition) => return,
        };

        self.backend.emit(event);
    }

    fn accept(&mut self, token: Token<'a>) -> Result<ExprOutcome> {
        let outcome = match self.stack.as_slice() {
            [_, Item::NonTerm(ty)] => *ty,
            _ => {
                return Err(CompileError::syntax(
                    token.line,
                    format!("Expected expression, found '{}'", token.lexeme),
                ));
            }
        };

        info!("Expression analyzed: {}", outcome);
        self.cursor.pushback(token)?;

        Ok(ExprOutcome::Typed(outcome))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Semantic rules
// ─────────────────────────────────────────────────────────────────────────────

fn operator_of(symbol: Symbol) -> Option<Operator> {
    match symbol {
        Symbol::Mul => Some(Operator::Mul),
        Symbol::Div => Some(Operator::Div),
        Symbol::IntDiv => Some(Operator::IntDiv),
        Symbol::Plus => Some(Operator::Add),
        Symbol::Minus => Some(Operator::Sub),
        Symbol::Concat => Some(Operator::Concat),
        _ => None,
    }
}

fn comparison_of(symbol: Symbol) -> Option<Comparison> {
    match symbol {
        Symbol::Eq => Some(Comparison::Eq),
        Symbol::NotEq => Some(Comparison::NotEq),
        Symbol::Less => Some(Comparison::Less),
        Symbol::LessEq => Some(Comparison::LessEq),
        Symbol::Greater => Some(Comparison::Greater),
        Symbol::GreaterEq => Some(Comparison::GreaterEq),
        _ => None,
    }
}

fn length_of(operand: ExprType, line: usize) -> Result<ExprType> {
    match operand {
        ExprType::Value(Type::String) => Ok(ExprType::Value(Type::Integer)),
        other => Err(CompileError::type_mismatch(
            line,
            format!("'#' needs a string operand, found {}", other),
        )),
    }
}

/// Widening needed to bring a numeric pair to a common type; `left` sits
/// below `right` on the evaluation stack.
fn widen_pair(left: Type, right: Type) -> Vec<usize> {
    match (left, right) {
        (Type::Integer, Type::Number) => vec![1],
        (Type::Number, Type::Integer) => vec![0],
        _ => Vec::new(),
    }
}

fn binary(op: Symbol, left: ExprType, right: ExprType, line: usize) -> Result<Reduction> {
    let (ExprType::Value(l), ExprType::Value(r)) = (left, right) else {
        return Err(CompileError::type_mismatch(
            line,
            "Result of a comparison cannot be an operand",
        ));
    };

    match op {
        Symbol::Plus | Symbol::Minus | Symbol::Mul | Symbol::IntDiv | Symbol::Div => {
            if l == Type::Nil || r == Type::Nil {
                return Err(CompileError::type_mismatch(
                    line,
                    "nil operand in arithmetic expression",
                ));
            }

            if !l.is_numeric() || !r.is_numeric() {
                return Err(CompileError::type_mismatch(
                    line,
                    format!("Arithmetic on {} and {}", l, r),
                ));
            }

            let result = if op == Symbol::Div || l == Type::Number || r == Type::Number {
                Type::Number
            } else {
                Type::Integer
            };

            Ok(Reduction {
                result: ExprType::Value(result),
                widen: widen_pair(l, r),
            })
        }

        Symbol::Concat => match (l, r) {
            (Type::String, Type::String) => Ok(Reduction::plain(ExprType::Value(Type::String))),
            _ => Err(CompileError::type_mismatch(
                line,
                format!("Concatenation of {} and {}", l, r),
            )),
        },

        Symbol::Eq | Symbol::NotEq => {
            if l == Type::Nil || r == Type::Nil || l == r {
                Ok(Reduction::plain(ExprType::Condition))
            } else if l.is_numeric() && r.is_numeric() {
                Ok(Reduction {
                    result: ExprType::Condition,
                    widen: widen_pair(l, r),
                })
            } else {
                Err(CompileError::type_mismatch(
                    line,
                    format!("Comparison of {} and {}", l, r),
                ))
            }
        }

        Symbol::Less | Symbol::LessEq | Symbol::Greater | Symbol::GreaterEq => {
            if l == Type::Nil || r == Type::Nil {
                return Err(CompileError::nil(line, "nil in ordering comparison"));
            }

            if l.is_numeric() && r.is_numeric() {
                Ok(Reduction {
                    result: ExprType::Condition,
                    widen: widen_pair(l, r),
                })
            } else if l == Type::String && r == Type::String {
                Ok(Reduction::plain(ExprType::Condition))
            } else {
                Err(CompileError::type_mismatch(
                    line,
                    format!("Comparison of {} and {}", l, r),
                ))
            }
        }

        _ => Err(CompileError::syntax(line, "Malformed expression")),
    }
}
