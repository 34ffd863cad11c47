//! Transient per-statement state threaded through the statement parser.

use log::debug;

use crate::backend::VarRef;
use crate::types::{Type, TypeSignature};

/// Open `if`/`while` construct; the top marker decides what `end` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    IfBlock,
    /// `if` whose `else` has been seen.
    ElseBlock,
    WhileBlock,
}

/// A pre-validated assignment target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub var: VarRef,
    pub ty: Type,
}

#[derive(Debug, Default)]
pub struct ParseContext {
    /// Identifiers on the left-hand side, in encounter order.
    pub targets: Vec<Target>,
    /// Function whose signature is currently being matched.
    pub callee: Option<String>,
    /// Return/assignment slots consumed so far.
    pub slots: usize,
    /// Signature a definition or call must match.
    pub declared_signature: TypeSignature,
    /// Signature accumulated from the tokens actually parsed.
    pub pending_signature: TypeSignature,
    blocks: Vec<BlockKind>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement boundary: forget everything except open blocks.
    pub fn reset(&mut self) {
        self.targets.clear();
        self.callee = None;
        self.slots = 0;
        self.declared_signature.clear();
        self.pending_signature.clear();
    }

    pub fn open_block(&mut self, kind: BlockKind) {
        debug!("Opening {:?} (nesting {})", kind, self.blocks.len() + 1);
        self.blocks.push(kind);
    }

    pub fn close_block(&mut self) -> Option<BlockKind> {
        let kind = self.blocks.pop();
        debug!("Closing {:?}", kind);
        kind
    }

    /// Mark the innermost `if` as having entered its `else` branch.
    pub fn enter_else(&mut self) -> bool {
        match self.blocks.last_mut() {
            Some(kind @ BlockKind::IfBlock) => {
                *kind = BlockKind::ElseBlock;
                true
            }
            _ => false,
        }
    }

    /// Inside at least one `while` body.
    pub fn in_loop(&self) -> bool {
        self.blocks.contains(&BlockKind::WhileBlock)
    }
}
