/*!
Recursive‑descent statement parser driving the whole analysis pass.

The parser pulls tokens from a [`TokenCursor`], hands expression positions to
the [`ExpressionAnalyzer`], keeps the [`SymbolTable`] current and reports every
recognised construct to a [`Backend`] as it goes. Nothing is built in memory
beyond the symbol tables; the pass stops at the first error.

Grammar
-------

```text
program     → "require" STRING top* EOF
top         → "global" ID ":" "function" "(" typelist? ")" rets?
            | "function" ID "(" paramlist? ")" rets? body "end"
            | ID "(" args? ")"
rets        → ":" type ("," type)*
body        → stmt*
stmt        → "local" ID ":" type ("=" (expr | call))?
            | "if" expr "then" body ("else" body)? "end"
            | "while" expr "do" body "end"
            | "return" (retval ("," expr)*)?
            | ID "(" args? ")"
            | ID "=" (expr | call)
            | ID ("," ID)+ "=" (exprlist | call)
args        → term ("," term)*
term        → ID | INTEGER | NUMBER | STRING | "nil"
```

Nested `if`/`while` bodies are not parsed recursively. The body loop keeps a
stack of open blocks in the [`ParseContext`] and lets `end` close whatever is
on top, or the function itself when nothing is open.

### Logging Policy

| Location                          | Level  | Purpose                          |
|-----------------------------------|--------|----------------------------------|
| `Parser::new`, `parse`, functions | `info` | Lifecycle milestones.            |
| statement dispatch, calls         | `debug`| Grammar descent and decisions.   |
*/

use log::{debug, info};

use crate::backend::{Backend, Event, Operand, VarRef};
use crate::builtins::BuiltinUsage;
use crate::context::{BlockKind, ParseContext, Target};
use crate::cursor::TokenCursor;
use crate::error::{CompileError, Result};
use crate::expression::{ExprOutcome, ExpressionAnalyzer};
use crate::scanner::Scanner;
use crate::symtable::SymbolTable;
use crate::token::{Token, TokenType};
use crate::types::{ExprType, Storage, Type, TypeSignature};

pub struct Parser<'a, I, B>
where
    I: Iterator<Item = Result<Token<'a>>>,
    B: Backend,
{
    cursor: TokenCursor<'a, I>,
    symbols: SymbolTable,
    ctx: ParseContext,
    backend: B,
    builtins: BuiltinUsage,
    entry_emitted: bool,
}

impl<'a, B: Backend> Parser<'a, Scanner<'a>, B> {
    /// Parser reading straight from source bytes.
    pub fn from_source(src: &'a [u8], backend: B) -> Self {
        Self::new(Scanner::new(src), backend)
    }
}

impl<'a, I, B> Parser<'a, I, B>
where
    I: Iterator<Item = Result<Token<'a>>>,
    B: Backend,
{
    pub fn new(tokens: I, backend: B) -> Self {
        info!("Parser created");

        Self {
            cursor: TokenCursor::new(tokens),
            symbols: SymbolTable::new(),
            ctx: ParseContext::new(),
            backend,
            builtins: BuiltinUsage::new(),
            entry_emitted: false,
        }
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    // ───────────────────────── public API ─────────────────────────

    /// Analyze a whole program.
    pub fn parse(&mut self) -> Result<()> {
        info!("Beginning analysis pass");

        self.prologue()?;

        loop {
            self.ctx.reset();

            let token: Token<'a> = self.cursor.next()?;

            match token.token_type {
                TokenType::GLOBAL => self.forward_declaration()?,
                TokenType::FUNCTION => self.function_definition()?,
                TokenType::IDENTIFIER => self.top_level_call(token)?,
                TokenType::EOF => return self.finish(token.line),
                _ => {
                    return Err(CompileError::syntax(
                        token.line,
                        format!("Unexpected '{}' at top level", token.lexeme),
                    ));
                }
            }
        }
    }

    // ──────────────────────── program level ───────────────────────

    fn prologue(&mut self) -> Result<()> {
        self.consume(TokenType::REQUIRE, "Program must start with 'require'")?;

        let token = self.cursor.next()?;
        if !token.is(TokenType::STRING(String::new())) {
            return Err(CompileError::syntax(
                token.line,
                "Expected a string after 'require'",
            ));
        }

        self.backend.emit(Event::ProgramStart);

        Ok(())
    }

    fn forward_declaration(&mut self) -> Result<()> {
        let name = self.consume(TokenType::IDENTIFIER, "Expected function name after 'global'")?;

        debug!("Forward declaration of '{}'", name.lexeme);

        if self.symbols.global_find(name.lexeme).is_some() {
            return Err(CompileError::undefined(
                name.line,
                format!("Function '{}' is already declared", name.lexeme),
            ));
        }

        self.consume(TokenType::COLON, "Expected ':' after function name")?;
        self.consume(TokenType::FUNCTION, "Expected 'function' in declaration")?;
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'function'")?;

        if !self.matches(TokenType::RIGHT_PAREN)? {
            loop {
                let ty = self.type_keyword()?;
                self.ctx.pending_signature.push(ty);

                if !self.matches(TokenType::COMMA)? {
                    break;
                }
            }

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameter types")?;
        }

        let returns = self.return_types()?;

        let entry = self.symbols.global_add(name.lexeme);
        entry.params = std::mem::take(&mut self.ctx.pending_signature);
        entry.returns = returns;
        entry.defined = false;

        info!(
            "Declared '{}' : {} -> {}",
            name.lexeme, entry.params, entry.returns
        );

        Ok(())
    }

    fn function_definition(&mut self) -> Result<()> {
        let name = self.consume(TokenType::IDENTIFIER, "Expected function name")?;

        let declared = match self.symbols.global_find(name.lexeme) {
            Some(entry) if entry.defined => {
                return Err(CompileError::undefined(
                    name.line,
                    format!("Function '{}' is already defined", name.lexeme),
                ));
            }
            Some(entry) => Some((entry.params.clone(), entry.returns.clone())),
            None => None,
        };

        self.consume(TokenType::LEFT_PAREN, "Expected '(' after function name")?;

        let mut params: Vec<(Token<'a>, Type)> = Vec::new();

        if !self.matches(TokenType::RIGHT_PAREN)? {
            loop {
                let param = self.consume(TokenType::IDENTIFIER, "Expected parameter name")?;
                self.consume(TokenType::COLON, "Expected ':' after parameter name")?;
                let ty = self.type_keyword()?;

                self.ctx.pending_signature.push(ty);
                params.push((param, ty));

                if !self.matches(TokenType::COMMA)? {
                    break;
                }
            }

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters")?;
        }

        let returns = self.return_types()?;

        if let Some((declared_params, declared_returns)) = declared {
            self.ctx.declared_signature = declared_params;

            if self.ctx.declared_signature != self.ctx.pending_signature {
                return Err(CompileError::params(
                    name.line,
                    format!(
                        "Parameters of '{}' {} differ from declaration {}",
                        name.lexeme, self.ctx.pending_signature, self.ctx.declared_signature
                    ),
                ));
            }

            if declared_returns != returns {
                return Err(CompileError::params(
                    name.line,
                    format!(
                        "Returns of '{}' {} differ from declaration {}",
                        name.lexeme, returns, declared_returns
                    ),
                ));
            }
        }

        // Registered before the body so the function may call itself.
        let entry = self.symbols.global_add(name.lexeme);
        entry.params = std::mem::take(&mut self.ctx.pending_signature);
        entry.returns = returns.clone();
        entry.defined = true;

        info!("Defining function '{}'", name.lexeme);

        self.symbols.local_create(name.lexeme)?;

        let mut refs: Vec<VarRef> = Vec::with_capacity(params.len());
        for (param, ty) in &params {
            let local = self.symbols.local_add(param.lexeme, *ty, true, param.line)?;
            refs.push(VarRef {
                name: local.name.clone(),
                frame: local.frame,
            });
        }

        if self.entry_emitted {
            self.backend.emit(Event::FunctionSkip {
                name: name.lexeme.to_owned(),
            });
        }

        self.backend.emit(Event::FunctionStart {
            name: name.lexeme.to_owned(),
            params: refs,
            returns: returns.types().collect(),
        });

        self.ctx.reset();
        self.body()
    }

    fn top_level_call(&mut self, name: Token<'a>) -> Result<()> {
        if !self.entry_emitted {
            self.backend.emit(Event::Entry);
            self.entry_emitted = true;
        }

        self.call(name)?;

        Ok(())
    }

    fn finish(&mut self, line: usize) -> Result<()> {
        if !self.symbols.global_check_all_defined() {
            let name = self
                .symbols
                .globals()
                .first_undefined()
                .map(|e| e.name.clone())
                .unwrap_or_default();

            return Err(CompileError::undefined(
                line,
                format!("Function '{}' is declared but never defined", name),
            ));
        }

        self.backend.emit(Event::ProgramEnd);
        self.backend.emit(Event::Builtins(self.builtins.names()));
        self.backend.emit(Event::DivByZeroTrap);
        self.backend.emit(Event::NilOperandTrap);
        self.backend.emit(Event::WriteNilTrap);
        self.backend.emit(Event::Exit);

        info!("Analysis finished");

        Ok(())
    }

    // ──────────────────────── function body ───────────────────────

    fn body(&mut self) -> Result<()> {
        loop {
            self.ctx.reset();

            let token: Token<'a> = self.cursor.next()?;

            debug!("Body statement starting with {:?}", token.token_type);

            match token.token_type {
                TokenType::LOCAL => self.local_declaration()?,
                TokenType::IF => self.if_statement(token.line)?,
                TokenType::WHILE => self.while_statement()?,
                TokenType::ELSE => self.else_branch(token.line)?,
                TokenType::END => {
                    if self.end_block()? {
                        return Ok(());
                    }
                }
                TokenType::RETURN => self.return_statement(token.line)?,
                TokenType::IDENTIFIER => self.identifier_statement(token)?,
                TokenType::EOF => {
                    return Err(CompileError::syntax(
                        token.line,
                        "Unexpected end of input, expected 'end'",
                    ));
                }
                _ => {
                    return Err(CompileError::syntax(
                        token.line,
                        format!("Unexpected '{}' in function body", token.lexeme),
                    ));
                }
            }
        }
    }

    /// Close the innermost open construct; true when it was the function.
    fn end_block(&mut self) -> Result<bool> {
        match self.ctx.close_block() {
            Some(BlockKind::IfBlock | BlockKind::ElseBlock) => {
                self.backend.emit(Event::IfEnd);
                self.symbols.local_pop_scope()?;
                Ok(false)
            }
            Some(BlockKind::WhileBlock) => {
                self.backend.emit(Event::WhileEnd);
                self.symbols.local_pop_scope()?;
                Ok(false)
            }
            None => {
                let table = self
                    .symbols
                    .local_destroy()
                    .ok_or_else(|| CompileError::internal("'end' outside of a function"))?;

                self.backend.emit(Event::FunctionEnd {
                    name: table.function().to_owned(),
                });

                if self.entry_emitted {
                    self.backend.emit(Event::FunctionSkipEnd {
                        name: table.function().to_owned(),
                    });
                }

                info!("Finished function '{}'", table.function());

                Ok(true)
            }
        }
    }

    fn local_declaration(&mut self) -> Result<()> {
        let name = self.consume(TokenType::IDENTIFIER, "Expected variable name after 'local'")?;
        self.consume(TokenType::COLON, "Expected ':' after variable name")?;
        let ty = self.type_keyword()?;

        debug!("Local declaration '{}': {}", name.lexeme, ty);

        let initializer = if self.matches(TokenType::EQUAL)? {
            Some(self.initializer(ty, name.line)?)
        } else {
            None
        };

        let local = self.symbols.local_add(name.lexeme, ty, false, name.line)?;
        local.initialized = initializer.is_some();
        let var = VarRef {
            name: local.name.clone(),
            frame: local.frame,
        };

        self.backend.emit(Event::DeclareLocal {
            var: var.clone(),
            hoisted: self.ctx.in_loop(),
        });

        match initializer {
            Some(Initializer::Value) => self.backend.emit(Event::Assign { target: var }),
            Some(Initializer::Call) => self.backend.emit(Event::AssignCall { targets: vec![var] }),
            None => {}
        }

        Ok(())
    }

    /// Analyze the right-hand side of `local x : T = …`.
    fn initializer(&mut self, target: Type, line: usize) -> Result<Initializer> {
        match self.expression()? {
            ExprOutcome::Typed(outcome) => {
                let ty = value_type(outcome, line)?;

                match ty.storable_in(target) {
                    Storage::Direct => {}
                    Storage::Widened => self.backend.emit(Event::IntToNumber { depth: 0 }),
                    Storage::Incompatible => {
                        return Err(CompileError::assign(
                            line,
                            format!("Cannot initialize {} variable with {}", target, ty),
                        ));
                    }
                }

                Ok(Initializer::Value)
            }

            ExprOutcome::DeferredCall => {
                let callee = self.cursor.next()?;
                let returns = self.call(callee)?;

                let Some(ty) = returns.get(0) else {
                    return Err(CompileError::params(
                        line,
                        "Called function returns no value",
                    ));
                };

                match ty.storable_in(target) {
                    Storage::Direct => {}
                    Storage::Widened => self.backend.emit(Event::ResultToNumber { index: 0 }),
                    Storage::Incompatible => {
                        return Err(CompileError::assign(
                            line,
                            format!("Cannot initialize {} variable with {}", target, ty),
                        ));
                    }
                }

                Ok(Initializer::Call)
            }
        }
    }

    fn if_statement(&mut self, line: usize) -> Result<()> {
        self.condition(line, "if")?;
        self.backend.emit(Event::IfStart);

        self.consume(TokenType::THEN, "Expected 'then' after condition")?;

        self.symbols.local_new_scope()?;
        self.ctx.open_block(BlockKind::IfBlock);

        Ok(())
    }

    fn while_statement(&mut self) -> Result<()> {
        self.backend.emit(Event::WhileStart);

        let line = self.cursor.line();
        self.condition(line, "while")?;
        self.backend.emit(Event::WhileSkip);

        self.consume(TokenType::DO, "Expected 'do' after condition")?;

        self.symbols.local_new_scope()?;
        self.ctx.open_block(BlockKind::WhileBlock);

        Ok(())
    }

    fn condition(&mut self, line: usize, keyword: &str) -> Result<()> {
        match self.expression()? {
            ExprOutcome::Typed(_) => Ok(()),
            ExprOutcome::DeferredCall => Err(CompileError::syntax(
                line,
                format!("Function call cannot be used as '{}' condition", keyword),
            )),
        }
    }

    fn else_branch(&mut self, line: usize) -> Result<()> {
        if !self.ctx.enter_else() {
            return Err(CompileError::syntax(line, "'else' without matching 'if'"));
        }

        self.backend.emit(Event::Else);

        self.symbols.local_pop_scope()?;
        self.symbols.local_new_scope()?;

        Ok(())
    }

    fn return_statement(&mut self, line: usize) -> Result<()> {
        let function = self
            .symbols
            .local()
            .map(|t| t.function().to_owned())
            .ok_or_else(|| CompileError::internal("'return' outside of a function"))?;

        let returns: TypeSignature = self
            .symbols
            .global_find(&function)
            .map(|e| e.returns.clone())
            .unwrap_or_default();

        // `return` is the last statement of its block: anything before the
        // closing keyword is read as the returned values.
        let next = self.cursor.next()?;
        let bare = matches!(
            next.token_type,
            TokenType::END | TokenType::ELSE | TokenType::EOF
        );
        let statement = matches!(
            next.token_type,
            TokenType::LOCAL | TokenType::IF | TokenType::WHILE | TokenType::RETURN
        );
        let next_line = next.line;
        self.cursor.pushback(next)?;

        if bare {
            debug!("Bare return from '{}'", function);
            self.backend.emit(Event::FunctionReturn);
            return Ok(());
        }

        if statement {
            return Err(CompileError::syntax(
                next_line,
                "'return' must be the last statement of its block",
            ));
        }

        self.ctx.declared_signature = returns.clone();

        match self.expression()? {
            ExprOutcome::DeferredCall => {
                let callee = self.cursor.next()?;
                let name = callee.lexeme.to_owned();
                let produced = self.call(callee)?;

                if produced.is_empty() {
                    return Err(CompileError::params(
                        line,
                        format!("'{}' returns no values, nothing to return", name),
                    ));
                }

                // the call reused the signature slot for its parameters
                self.ctx.declared_signature = returns;
                self.check_call_results(&produced, line)?;

                self.backend.emit(Event::ReturnCall { function: name });
            }

            ExprOutcome::Typed(first) => {
                self.return_value(first, line)?;

                while self.matches(TokenType::COMMA)? {
                    match self.expression()? {
                        ExprOutcome::Typed(outcome) => self.return_value(outcome, line)?,
                        ExprOutcome::DeferredCall => {
                            return Err(CompileError::syntax(
                                line,
                                "Function call must be the only return value",
                            ));
                        }
                    }
                }
            }
        }

        self.backend.emit(Event::FunctionReturn);

        Ok(())
    }

    /// Check one returned expression against the next return slot.
    fn return_value(&mut self, outcome: ExprType, line: usize) -> Result<()> {
        let index = self.ctx.slots;
        let ty = value_type(outcome, line)?;

        let Some(expected) = self.ctx.declared_signature.get(index) else {
            return Err(CompileError::params(
                line,
                format!(
                    "Too many return values, function returns {}",
                    self.ctx.declared_signature
                ),
            ));
        };

        match ty.storable_in(expected) {
            Storage::Direct => {}
            Storage::Widened => self.backend.emit(Event::IntToNumber { depth: 0 }),
            Storage::Incompatible => {
                return Err(CompileError::params(
                    line,
                    format!("Return value {} is {}, expected {}", index + 1, ty, expected),
                ));
            }
        }

        self.backend.emit(Event::ReturnValue { index });
        self.ctx.slots += 1;

        Ok(())
    }

    // ───────────────────── assignment and calls ───────────────────

    fn identifier_statement(&mut self, name: Token<'a>) -> Result<()> {
        let next = self.cursor.next()?;

        match next.token_type {
            TokenType::LEFT_PAREN => {
                self.cursor.pushback(next)?;
                self.call(name)?;
                Ok(())
            }

            TokenType::EQUAL => {
                let target = self.target(&name)?;
                self.ctx.targets.push(target);
                self.assignment(name.line)
            }

            TokenType::COMMA => {
                let target = self.target(&name)?;
                self.ctx.targets.push(target);

                loop {
                    let id = self.consume(TokenType::IDENTIFIER, "Expected assignment target")?;
                    let target = self.target(&id)?;
                    self.ctx.targets.push(target);

                    if !self.matches(TokenType::COMMA)? {
                        break;
                    }
                }

                self.consume(TokenType::EQUAL, "Expected '=' after assignment targets")?;
                self.assignment(name.line)
            }

            _ => Err(CompileError::syntax(
                next.line,
                format!("Unexpected '{}' after '{}'", next.lexeme, name.lexeme),
            )),
        }
    }

    fn target(&self, name: &Token<'a>) -> Result<Target> {
        let Some(local) = self.symbols.local_find(name.lexeme) else {
            return Err(CompileError::undefined(
                name.line,
                format!("Assignment to undefined variable '{}'", name.lexeme),
            ));
        };

        Ok(Target {
            var: VarRef {
                name: local.name.clone(),
                frame: local.frame,
            },
            ty: local.ty,
        })
    }

    /// Right-hand side of a single or multiple assignment to `ctx.targets`.
    fn assignment(&mut self, line: usize) -> Result<()> {
        debug!("Assignment to {} target(s)", self.ctx.targets.len());

        match self.expression()? {
            ExprOutcome::DeferredCall => {
                let callee = self.cursor.next()?;
                let produced = self.call(callee)?;

                self.ctx.declared_signature = self.ctx.targets.iter().map(|t| t.ty).collect();
                self.check_call_results(&produced, line)?;

                let targets = self.ctx.targets.iter().map(|t| t.var.clone()).collect();
                self.backend.emit(Event::AssignCall { targets });
            }

            ExprOutcome::Typed(first) => {
                self.assigned_value(first, line)?;

                while self.matches(TokenType::COMMA)? {
                    match self.expression()? {
                        ExprOutcome::Typed(outcome) => self.assigned_value(outcome, line)?,
                        ExprOutcome::DeferredCall => {
                            return Err(CompileError::syntax(
                                line,
                                "Function call must be the only right-hand side",
                            ));
                        }
                    }
                }

                if self.ctx.slots != self.ctx.targets.len() {
                    return Err(CompileError::params(
                        line,
                        format!(
                            "{} target(s) but {} value(s)",
                            self.ctx.targets.len(),
                            self.ctx.slots
                        ),
                    ));
                }

                // The last value sits on top of the evaluation stack.
                for target in self.ctx.targets.iter().rev() {
                    self.backend.emit(Event::Assign {
                        target: target.var.clone(),
                    });
                }
            }
        }

        for target in &self.ctx.targets {
            if let Some(local) = self.symbols.local_find_mut(&target.var.name) {
                local.initialized = true;
            }
        }

        Ok(())
    }

    fn assigned_value(&mut self, outcome: ExprType, line: usize) -> Result<()> {
        let index = self.ctx.slots;
        let ty = value_type(outcome, line)?;

        let Some(target) = self.ctx.targets.get(index) else {
            return Err(CompileError::params(
                line,
                format!("More values than the {} assignment target(s)", self.ctx.targets.len()),
            ));
        };

        match ty.storable_in(target.ty) {
            Storage::Direct => {}
            Storage::Widened => self.backend.emit(Event::IntToNumber { depth: 0 }),
            Storage::Incompatible => {
                return Err(CompileError::assign(
                    line,
                    format!("Cannot assign {} to {} variable '{}'", ty, target.ty, target.var.name),
                ));
            }
        }

        self.ctx.slots += 1;

        Ok(())
    }

    /// Match the results of the call just emitted against
    /// `ctx.declared_signature`, position by position.
    fn check_call_results(&mut self, produced: &TypeSignature, line: usize) -> Result<()> {
        let expected = &self.ctx.declared_signature;
        let callee = self.ctx.callee.as_deref().unwrap_or("<call>");

        if produced.len() < expected.len() {
            return Err(CompileError::params(
                line,
                format!("'{}' returns {}, {} needed", callee, produced, expected),
            ));
        }

        let mut conversions: Vec<usize> = Vec::new();

        for (index, want) in expected.types().enumerate() {
            let got = produced.get(index).unwrap_or(Type::Nil);

            match got.storable_in(want) {
                Storage::Direct => {}
                Storage::Widened => conversions.push(index),
                Storage::Incompatible => {
                    return Err(CompileError::params(
                        line,
                        format!(
                            "Result {} of '{}' is {}, expected {}",
                            index + 1,
                            callee,
                            got,
                            want
                        ),
                    ));
                }
            }
        }

        for index in conversions {
            self.backend.emit(Event::ResultToNumber { index });
        }

        Ok(())
    }

    /// Parse `( args )` after `name` and emit the call. Returns the callee's
    /// return signature.
    fn call(&mut self, name: Token<'a>) -> Result<TypeSignature> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after function name")?;

        let Some(entry) = self.symbols.global_find(name.lexeme) else {
            return Err(CompileError::undefined(
                name.line,
                format!("Call of undefined function '{}'", name.lexeme),
            ));
        };

        let variadic = entry.variadic;
        let returns = entry.returns.clone();
        self.ctx.declared_signature = entry.params.clone();
        self.ctx.pending_signature.clear();
        self.ctx.callee = Some(name.lexeme.to_owned());

        self.builtins.mark(name.lexeme);

        debug!("Call of '{}' expecting {}", name.lexeme, self.ctx.declared_signature);

        if variadic {
            self.variadic_arguments()?;
            return Ok(returns);
        }

        self.backend.emit(Event::CallPrepare {
            function: name.lexeme.to_owned(),
        });

        if !self.matches(TokenType::RIGHT_PAREN)? {
            loop {
                let (operand, ty) = self.term()?;
                let index = self.ctx.pending_signature.len();
                self.ctx.pending_signature.push(ty);

                let Some(expected) = self.ctx.declared_signature.get(index) else {
                    return Err(CompileError::params(
                        name.line,
                        format!(
                            "Too many arguments for '{}', expected {}",
                            name.lexeme, self.ctx.declared_signature
                        ),
                    ));
                };

                self.backend.emit(Event::CallParam { index, operand });

                match ty.storable_in(expected) {
                    Storage::Direct => {}
                    Storage::Widened => self.backend.emit(Event::NumConversion { index }),
                    Storage::Incompatible => {
                        return Err(CompileError::params(
                            name.line,
                            format!(
                                "Argument {} of '{}' is {}, expected {}",
                                index + 1,
                                name.lexeme,
                                ty,
                                expected
                            ),
                        ));
                    }
                }

                if !self.matches(TokenType::COMMA)? {
                    break;
                }
            }

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments")?;
        }

        if self.ctx.pending_signature.len() != self.ctx.declared_signature.len() {
            return Err(CompileError::params(
                name.line,
                format!(
                    "'{}' expects {}, got {}",
                    name.lexeme, self.ctx.declared_signature, self.ctx.pending_signature
                ),
            ));
        }

        self.backend.emit(Event::Call {
            function: name.lexeme.to_owned(),
        });

        Ok(returns)
    }

    /// `write` arguments: any count, any type, each written immediately.
    fn variadic_arguments(&mut self) -> Result<()> {
        if self.matches(TokenType::RIGHT_PAREN)? {
            return Ok(());
        }

        loop {
            let (operand, _) = self.term()?;
            self.backend.emit(Event::Write(operand));

            if !self.matches(TokenType::COMMA)? {
                break;
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments")?;

        Ok(())
    }

    fn term(&mut self) -> Result<(Operand, Type)> {
        let token = self.cursor.next()?;

        match token.token_type {
            TokenType::IDENTIFIER => {
                let Some(local) = self.symbols.local_find(token.lexeme) else {
                    return Err(CompileError::undefined(
                        token.line,
                        format!("Undefined variable '{}'", token.lexeme),
                    ));
                };

                Ok((
                    Operand::Variable(VarRef {
                        name: local.name.clone(),
                        frame: local.frame,
                    }),
                    local.ty,
                ))
            }
            TokenType::INTEGER(n) => Ok((Operand::Integer(n), Type::Integer)),
            TokenType::NUMBER(n) => Ok((Operand::Number(n), Type::Number)),
            TokenType::STRING(s) => Ok((Operand::Str(s), Type::String)),
            TokenType::NIL => Ok((Operand::Nil, Type::Nil)),
            _ => Err(CompileError::syntax(
                token.line,
                format!("Expected argument, found '{}'", token.lexeme),
            )),
        }
    }

    // ────────────────────── utility helpers ───────────────────────

    fn expression(&mut self) -> Result<ExprOutcome> {
        ExpressionAnalyzer::new(&mut self.cursor, &self.symbols, &mut self.backend).analyze()
    }

    /// Optional `: type, type …` after a parameter list.
    fn return_types(&mut self) -> Result<TypeSignature> {
        let mut returns = TypeSignature::new();

        if self.matches(TokenType::COLON)? {
            loop {
                returns.push(self.type_keyword()?);

                if !self.matches(TokenType::COMMA)? {
                    break;
                }
            }
        }

        Ok(returns)
    }

    fn type_keyword(&mut self) -> Result<Type> {
        let token = self.cursor.next()?;

        Type::from_keyword(&token.token_type).ok_or_else(|| {
            CompileError::syntax(
                token.line,
                format!("Expected a type, found '{}'", token.lexeme),
            )
        })
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> Result<bool> {
        let token = self.cursor.next()?;

        if token.token_type == ttype {
            return Ok(true);
        }

        self.cursor.pushback(token)?;

        Ok(false)
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<Token<'a>> {
        let token = self.cursor.next()?;

        if token.token_type == ttype {
            return Ok(token);
        }

        debug!("Expected {}, found {:?}", ttype.name(), token.token_type);

        Err(CompileError::syntax(token.line, message))
    }
}

/// How a local's initializer left its value for the backend.
enum Initializer {
    /// On the evaluation stack.
    Value,
    /// In the last call's first result.
    Call,
}

/// Plain language type of an expression used as a value.
fn value_type(outcome: ExprType, line: usize) -> Result<Type> {
    match outcome {
        ExprType::Value(ty) => Ok(ty),
        ExprType::Condition => Err(CompileError::type_mismatch(
            line,
            "Comparison result cannot be used as a value",
        )),
    }
}
