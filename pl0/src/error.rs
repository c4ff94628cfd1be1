use thiserror::Error;

use pl0_vm::{ArithmeticFault, RuntimeError};

use crate::scope::SymbolKind;
use crate::span::Span;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Syntax error at {span}: expected {expected}, found {found}")]
    SyntaxError {
        span: Span,
        expected: String,
        found: String,
    },

    #[error("Name error at {span}: undefined name referenced: {name}")]
    UndefinedName { name: String, span: Span },

    #[error("Name error at {span}: invalid assignment to non-variable {name} of type {kind}")]
    InvalidAssignment {
        name: String,
        kind: SymbolKind,
        span: Span,
    },

    #[error("Name error at {span}: expecting procedure but {name} is a {kind}")]
    NotAProcedure {
        name: String,
        kind: SymbolKind,
        span: Span,
    },

    #[error("Name error at {span}: invalid value name {name} of type {kind}")]
    InvalidValue {
        name: String,
        kind: SymbolKind,
        span: Span,
    },

    #[error("Assembly error at line {line}: undefined label '{label}'")]
    UndefinedLabel { label: String, line: usize },

    #[error("Assembly error at line {line}: label '{label}' defined twice")]
    DuplicateLabel { label: String, line: usize },

    #[error("Assembly error at line {line}: invalid token '{token}'")]
    InvalidToken { token: String, line: usize },

    #[error("Runtime error: {fault}")]
    Arithmetic { fault: ArithmeticFault },

    #[error("Runtime error: call depth exceeded {limit} while calling {name}")]
    RecursionLimit { name: String, limit: usize },

    #[error("{source}")]
    Runtime {
        #[from]
        source: RuntimeError,
    },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl From<ArithmeticFault> for CompileError {
    fn from(fault: ArithmeticFault) -> Self {
        CompileError::Arithmetic { fault }
    }
}
