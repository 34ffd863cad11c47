//! Symbol tables consulted and updated during the single analysis pass.
//!
//! * [`GlobalTable`] – every function known to the program (builtins,
//!   forward declarations, definitions). Lives for the whole compilation.
//! * [`LocalTable`] – variables of the function currently being parsed,
//!   organised as an **arena of scope frames** plus an explicit stack of frame
//!   indices describing the current scope path. Popping a scope only shortens
//!   the path; the frame stays in the arena so its index remains a stable
//!   identity for the backend.
//!
//! [`SymbolTable`] bundles both and enforces the cross-table rule that a local
//! may not share its name with a global function.

use crate::builtins;
use crate::error::{CompileError, Result};
use crate::types::{Type, TypeSignature};
use log::{debug, info};
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// Global functions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEntry {
    pub name: String,
    pub params: TypeSignature,
    pub returns: TypeSignature,
    /// A body has been supplied (always true for builtins).
    pub defined: bool,
    pub variadic: bool,
}

impl GlobalEntry {
    fn undefined(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            params: TypeSignature::new(),
            returns: TypeSignature::new(),
            defined: false,
            variadic: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct GlobalTable {
    entries: HashMap<String, GlobalEntry>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the builtin registry.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();

        for (name, builtin) in builtins::all() {
            let entry = table.add(name);
            entry.params = TypeSignature::from(builtin.params);
            entry.returns = TypeSignature::from(builtin.returns);
            entry.variadic = builtin.variadic;
            entry.defined = true;
        }

        info!("Global table seeded with {} builtins", table.entries.len());

        table
    }

    pub fn find(&self, name: &str) -> Option<&GlobalEntry> {
        self.entries.get(name)
    }

    /// Fetch `name`, inserting an undefined entry with empty signatures if it
    /// is not present yet.
    pub fn add(&mut self, name: &str) -> &mut GlobalEntry {
        debug!("Adding global '{}'", name);

        self.entries
            .entry(name.to_owned())
            .or_insert_with(|| GlobalEntry::undefined(name))
    }

    /// Alphabetically first function that was declared but never defined.
    pub fn first_undefined(&self) -> Option<&GlobalEntry> {
        self.entries
            .values()
            .filter(|e| !e.defined)
            .min_by(|a, b| a.name.cmp(&b.name))
    }

    pub fn check_all_defined(&self) -> bool {
        self.first_undefined().is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local variables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub ty: Type,
    pub initialized: bool,
    pub is_param: bool,
    /// Arena index of the owning frame.
    pub frame: usize,
}

#[derive(Debug)]
struct Frame {
    depth: usize,
    vars: HashMap<String, LocalEntry>,
}

#[derive(Debug)]
pub struct LocalTable {
    function: String,
    frames: Vec<Frame>,
    path: Vec<usize>,
}

impl LocalTable {
    pub fn new(function: &str) -> Self {
        info!("Local table created for '{}'", function);

        Self {
            function: function.to_owned(),
            frames: vec![Frame {
                depth: 0,
                vars: HashMap::new(),
            }],
            path: vec![0],
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Arena index of the innermost open frame.
    pub fn current_frame(&self) -> usize {
        self.path[self.path.len() - 1]
    }

    /// Open a nested frame and make it current; returns its arena index.
    pub fn new_scope(&mut self) -> usize {
        let index = self.frames.len();
        let depth = self.path.len();

        self.frames.push(Frame {
            depth,
            vars: HashMap::new(),
        });
        self.path.push(index);

        debug!("Opened frame {} at depth {} in '{}'", index, depth, self.function);

        index
    }

    /// Close the innermost frame. The function frame itself cannot be popped.
    pub fn pop_scope(&mut self) -> Result<()> {
        if self.path.len() <= 1 {
            return Err(CompileError::internal(format!(
                "attempt to pop the top frame of '{}'",
                self.function
            )));
        }

        let index = self.path.pop().unwrap_or_default();
        debug!(
            "Closed frame {} (depth {}) in '{}'",
            index, self.frames[index].depth, self.function
        );

        Ok(())
    }

    /// Declare `name` in the current frame; it may shadow outer frames but
    /// not repeat within the same one.
    pub fn add(&mut self, name: &str, ty: Type, is_param: bool, line: usize) -> Result<&mut LocalEntry> {
        let frame = self.current_frame();
        let vars = &mut self.frames[frame].vars;

        if vars.contains_key(name) {
            return Err(CompileError::undefined(
                line,
                format!("Variable '{}' already declared in this scope", name),
            ));
        }

        debug!("Declared local '{}': {} in frame {}", name, ty, frame);

        Ok(vars.entry(name.to_owned()).or_insert(LocalEntry {
            name: name.to_owned(),
            ty,
            initialized: is_param,
            is_param,
            frame,
        }))
    }

    /// Innermost-to-outermost lookup along the current scope path.
    pub fn find(&self, name: &str) -> Option<&LocalEntry> {
        self.path
            .iter()
            .rev()
            .find_map(|&index| self.frames[index].vars.get(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut LocalEntry> {
        let index = self
            .path
            .iter()
            .rev()
            .copied()
            .find(|&index| self.frames[index].vars.contains_key(name))?;

        self.frames[index].vars.get_mut(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined view used by the parser
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SymbolTable {
    globals: GlobalTable,
    local: Option<LocalTable>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            globals: GlobalTable::with_builtins(),
            local: None,
        }
    }

    pub fn globals(&self) -> &GlobalTable {
        &self.globals
    }

    pub fn global_find(&self, name: &str) -> Option<&GlobalEntry> {
        self.globals.find(name)
    }

    pub fn global_add(&mut self, name: &str) -> &mut GlobalEntry {
        self.globals.add(name)
    }

    pub fn global_check_all_defined(&self) -> bool {
        self.globals.check_all_defined()
    }

    pub fn local_create(&mut self, function: &str) -> Result<()> {
        if let Some(open) = &self.local {
            return Err(CompileError::internal(format!(
                "local table for '{}' still open while creating '{}'",
                open.function(),
                function
            )));
        }

        self.local = Some(LocalTable::new(function));

        Ok(())
    }

    pub fn local_destroy(&mut self) -> Option<LocalTable> {
        let table = self.local.take();

        if let Some(t) = &table {
            info!("Local table for '{}' destroyed", t.function());
        }

        table
    }

    pub fn local(&self) -> Option<&LocalTable> {
        self.local.as_ref()
    }

    fn local_mut(&mut self) -> Result<&mut LocalTable> {
        self.local
            .as_mut()
            .ok_or_else(|| CompileError::internal("no function is being parsed"))
    }

    pub fn local_new_scope(&mut self) -> Result<usize> {
        Ok(self.local_mut()?.new_scope())
    }

    pub fn local_pop_scope(&mut self) -> Result<()> {
        self.local_mut()?.pop_scope()
    }

    /// Declare a local in the current frame. Fails if the name repeats within
    /// the frame or names a global function.
    pub fn local_add(&mut self, name: &str, ty: Type, is_param: bool, line: usize) -> Result<&mut LocalEntry> {
        if self.globals.find(name).is_some() {
            return Err(CompileError::undefined(
                line,
                format!("Variable '{}' collides with a function name", name),
            ));
        }

        self.local_mut()?.add(name, ty, is_param, line)
    }

    pub fn local_find(&self, name: &str) -> Option<&LocalEntry> {
        self.local.as_ref().and_then(|t| t.find(name))
    }

    pub fn local_find_mut(&mut self, name: &str) -> Option<&mut LocalEntry> {
        self.local.as_mut().and_then(|t| t.find_mut(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowed_local_is_restored_after_pop() {
        let mut table = LocalTable::new("main");
        table.add("x", Type::Integer, false, 1).unwrap();

        table.new_scope();
        table.add("x", Type::String, false, 2).unwrap();
        assert_eq!(table.find("x").unwrap().ty, Type::String);

        table.pop_scope().unwrap();
        let outer = table.find("x").unwrap();
        assert_eq!(outer.ty, Type::Integer);
        assert_eq!(outer.frame, 0);
    }

    #[test]
    fn duplicate_in_same_frame_is_rejected() {
        let mut table = LocalTable::new("f");
        table.add("a", Type::Number, true, 1).unwrap();

        let err = table.add("a", Type::Number, false, 3).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn top_frame_cannot_be_popped() {
        let mut table = LocalTable::new("f");
        assert!(table.pop_scope().is_err());
    }

    #[test]
    fn popped_frames_keep_their_arena_index() {
        let mut table = LocalTable::new("f");
        let first = table.new_scope();
        table.pop_scope().unwrap();
        let second = table.new_scope();

        assert_ne!(first, second);
        assert_eq!(table.current_frame(), second);
    }

    #[test]
    fn local_may_not_reuse_a_function_name() {
        let mut symbols = SymbolTable::new();
        symbols.local_create("main").unwrap();

        let err = symbols.local_add("write", Type::Integer, false, 1).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn forward_declaration_stays_undefined_until_filled() {
        let mut globals = GlobalTable::with_builtins();
        assert!(globals.check_all_defined());

        globals.add("later");
        assert_eq!(globals.first_undefined().unwrap().name, "later");

        globals.add("later").defined = true;
        assert!(globals.check_all_defined());
    }
}
