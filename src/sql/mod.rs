pub mod ast;
pub mod functions;
pub mod parser;
