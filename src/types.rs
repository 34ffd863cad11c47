//! Language-level types and the compact signature strings used to compare
//! parameter and return lists.

use serde::Serialize;
use std::fmt;

use crate::token::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Integer,
    Number,
    String,
    Nil,
}

impl Type {
    /// Type named by a type keyword token, if it is one.
    pub fn from_keyword(ttype: &TokenType) -> Option<Type> {
        match ttype {
            TokenType::TYPE_INTEGER => Some(Type::Integer),
            TokenType::TYPE_NUMBER => Some(Type::Number),
            TokenType::TYPE_STRING => Some(Type::String),
            TokenType::NIL => Some(Type::Nil),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Type::Integer => 'i',
            Type::Number => 'n',
            Type::String => 's',
            Type::Nil => 'x',
        }
    }

    pub fn from_code(c: char) -> Option<Type> {
        match c {
            'i' => Some(Type::Integer),
            'n' => Some(Type::Number),
            's' => Some(Type::String),
            'x' => Some(Type::Nil),
            _ => None,
        }
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Number)
    }

    /// How a value of type `self` may be stored in a slot of type `target`.
    pub fn storable_in(self, target: Type) -> Storage {
        if self == target {
            Storage::Direct
        } else if self == Type::Integer && target == Type::Number {
            Storage::Widened
        } else {
            Storage::Incompatible
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Integer => "integer",
            Type::Number => "number",
            Type::String => "string",
            Type::Nil => "nil",
        };
        f.write_str(name)
    }
}

/// Outcome of [`Type::storable_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Direct,
    /// Integer into a Number slot; needs a conversion event.
    Widened,
    Incompatible,
}

/// Type of a fully analyzed expression. Relational results carry no
/// language type and are only usable as branch conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Value(Type),
    Condition,
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Value(t) => t.fmt(f),
            ExprType::Condition => f.write_str("condition"),
        }
    }
}

/// One character per type, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSignature(String);

impl TypeSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ty: Type) {
        self.0.push(ty.code());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Type> {
        self.0.as_bytes().get(index).and_then(|&b| Type::from_code(b as char))
    }

    pub fn types(&self) -> impl Iterator<Item = Type> + '_ {
        self.0.chars().filter_map(Type::from_code)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<&str> for TypeSignature {
    fn from(codes: &str) -> Self {
        Self(codes.to_owned())
    }
}

impl FromIterator<Type> for TypeSignature {
    fn from_iter<T: IntoIterator<Item = Type>>(iter: T) -> Self {
        Self(iter.into_iter().map(Type::code).collect())
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.types().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}
