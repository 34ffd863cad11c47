pub mod backend;
pub mod builtins;
pub mod context;
pub mod cursor;
pub mod error;
pub mod expression;
pub mod parser;
pub mod scanner;
pub mod symtable;
pub mod token;
pub mod types;

use backend::EventLog;
use parser::Parser;

/// Analyze a complete program and return the recorded semantic events.
pub fn compile(src: &[u8]) -> error::Result<EventLog> {
    let mut parser = Parser::from_source(src, EventLog::new());
    parser.parse()?;

    Ok(parser.into_backend())
}
