pub mod ast;
pub mod visitor;
