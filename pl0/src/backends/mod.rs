pub mod stack;

use crate::ir::ast;
use crate::error::CompileError;

/// Бэкенд превращает AST в текст ассемблера своей машины
pub trait Backend {
    fn compile(&mut self, program: &ast::Program) -> Result<String, CompileError>;
}

#[derive(Debug, Clone, Copy)]
pub enum BackendType {
    Stack,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Stack,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stack => "stack",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Stack => "PL/0 stack machine assembly",
        }
    }

    pub fn create(&self) -> Box<dyn Backend> {
        match self {
            Self::Stack => Box::new(stack::Compiler::new()),
        }
    }

    pub fn find(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|backend| backend.name() == name)
    }
}
