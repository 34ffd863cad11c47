//! Semantic events handed to the code-emission backend.
//!
//! The analyzer never produces instruction text. It reports *what* was
//! recognised, in recognition order, and the backend decides how to lower it.
//! Order is significant: expression events precede the assignment/call that
//! consumes them, while `WhileStart` precedes the condition events of the
//! first iteration.

use serde::Serialize;
use std::fmt;

use crate::types::Type;

/// A local variable as seen by the backend. `frame` is the arena index of
/// the owning scope frame, which disambiguates shadowed names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarRef {
    pub name: String,
    pub frame: usize,
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.frame)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    Variable(VarRef),
    Integer(i64),
    Number(f64),
    Str(String),
    Nil,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Variable(v) => v.fmt(f),
            Operand::Integer(n) => write!(f, "int@{}", n),
            Operand::Number(n) => write!(f, "float@{}", n),
            Operand::Str(s) => write!(f, "string@{:?}", s),
            Operand::Nil => f.write_str("nil@nil"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Len,
    Mul,
    Div,
    IntDiv,
    Add,
    Sub,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    ProgramStart,
    /// First top-level call; main code begins here.
    Entry,
    FunctionStart {
        name: String,
        params: Vec<VarRef>,
        returns: Vec<Type>,
    },
    /// Main code is already running: jump over the function that follows.
    FunctionSkip {
        name: String,
    },
    /// Target of the matching [`Event::FunctionSkip`].
    FunctionSkipEnd {
        name: String,
    },
    /// `return` statement: leave the current function.
    FunctionReturn,
    FunctionEnd {
        name: String,
    },
    DeclareLocal {
        var: VarRef,
        /// Declared inside a loop body; the definition belongs before the loop.
        hoisted: bool,
    },
    PushOperand(Operand),
    PushOperator {
        op: Operator,
        result: Type,
    },
    PushCompare(Comparison),
    /// Convert an Integer on the evaluation stack to Number; `depth` 0 is the
    /// top of the stack, 1 the value below it.
    IntToNumber {
        depth: usize,
    },
    /// Pop the evaluation stack into `target`.
    Assign {
        target: VarRef,
    },
    CallPrepare {
        function: String,
    },
    CallParam {
        index: usize,
        operand: Operand,
    },
    /// Convert call argument `index` from Integer to Number.
    NumConversion {
        index: usize,
    },
    Call {
        function: String,
    },
    /// Convert return value `index` of the last call from Integer to Number.
    ResultToNumber {
        index: usize,
    },
    /// Store the last call's return values into `targets`, position by position.
    AssignCall {
        targets: Vec<VarRef>,
    },
    /// Pop the evaluation stack into return slot `index`.
    ReturnValue {
        index: usize,
    },
    /// Forward the last call's return values as the current function's.
    ReturnCall {
        function: String,
    },
    Write(Operand),
    /// Condition is on the stack; jump to the else branch when false.
    IfStart,
    Else,
    IfEnd,
    WhileStart,
    /// Condition is on the stack; leave the loop when false.
    WhileSkip,
    WhileEnd,
    ProgramEnd,
    Builtins(Vec<String>),
    DivByZeroTrap,
    NilOperandTrap,
    WriteNilTrap,
    Exit,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::ProgramStart => f.write_str("program-start"),
            Event::Entry => f.write_str("entry"),
            Event::FunctionStart {
                name,
                params,
                returns,
            } => {
                write!(f, "function {}(", name)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                f.write_str(")")?;
                for (i, r) in returns.iter().enumerate() {
                    f.write_str(if i == 0 { " : " } else { ", " })?;
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
            Event::FunctionSkip { name } => write!(f, "skip-function {}", name),
            Event::FunctionSkipEnd { name } => write!(f, "end-skip {}", name),
            Event::FunctionReturn => f.write_str("return"),
            Event::FunctionEnd { name } => write!(f, "end-function {}", name),
            Event::DeclareLocal { var, hoisted } => {
                write!(f, "local {}{}", var, if *hoisted { " (hoisted)" } else { "" })
            }
            Event::PushOperand(op) => write!(f, "push {}", op),
            Event::PushOperator { op, result } => write!(f, "op {:?} -> {}", op, result),
            Event::PushCompare(cmp) => write!(f, "cmp {:?}", cmp),
            Event::IntToNumber { depth } => write!(f, "int2num stack[{}]", depth),
            Event::Assign { target } => write!(f, "assign {}", target),
            Event::CallPrepare { function } => write!(f, "prepare {}", function),
            Event::CallParam { index, operand } => write!(f, "param {} = {}", index, operand),
            Event::NumConversion { index } => write!(f, "int2num param {}", index),
            Event::Call { function } => write!(f, "call {}", function),
            Event::ResultToNumber { index } => write!(f, "int2num result {}", index),
            Event::AssignCall { targets } => {
                f.write_str("assign-results")?;
                for t in targets {
                    write!(f, " {}", t)?;
                }
                Ok(())
            }
            Event::ReturnValue { index } => write!(f, "retval {}", index),
            Event::ReturnCall { function } => write!(f, "return-results {}", function),
            Event::Write(op) => write!(f, "write {}", op),
            Event::IfStart => f.write_str("if"),
            Event::Else => f.write_str("else"),
            Event::IfEnd => f.write_str("end-if"),
            Event::WhileStart => f.write_str("while"),
            Event::WhileSkip => f.write_str("while-skip"),
            Event::WhileEnd => f.write_str("end-while"),
            Event::ProgramEnd => f.write_str("program-end"),
            Event::Builtins(names) => write!(f, "builtins [{}]", names.join(", ")),
            Event::DivByZeroTrap => f.write_str("trap div-by-zero"),
            Event::NilOperandTrap => f.write_str("trap nil-operand"),
            Event::WriteNilTrap => f.write_str("trap write-nil"),
            Event::Exit => f.write_str("exit"),
        }
    }
}

/// Receiver of semantic events.
pub trait Backend {
    fn emit(&mut self, event: Event);
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn emit(&mut self, event: Event) {
        (**self).emit(event);
    }
}

/// Backend that records every event in order.
#[derive(Debug, Default, Serialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }
}

impl Backend for EventLog {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

impl fmt::Display for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            writeln!(f, "{}", event)?;
        }
        Ok(())
    }
}

