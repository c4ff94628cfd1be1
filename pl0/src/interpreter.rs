use std::collections::HashMap;
use std::panic;
use std::thread;

use tracing::{debug, trace};

use pl0_vm::Opcode;
use pl0_vm::machine::{arithmetic, compare};

use crate::error::CompileError;
use crate::ir::ast;
use crate::scope::SymbolKind;
use crate::span::Span;

/// Глубже этого интерпретатор не спускается
pub const MAX_CALL_DEPTH: usize = 10_000;

// Обход рекурсивный, поэтому стек потока рассчитан на MAX_CALL_DEPTH
const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum Value<'p> {
    Constant(i64),
    Variable(i64),
    Procedure(&'p ast::Procedure),
}

impl Value<'_> {
    fn kind(&self) -> SymbolKind {
        match self {
            Value::Constant(_) => SymbolKind::Constant,
            Value::Variable(_) => SymbolKind::Variable,
            Value::Procedure(_) => SymbolKind::Procedure,
        }
    }
}

/// Одна активация блока
struct Activation<'p> {
    names: HashMap<&'p str, Value<'p>>,
    // статическая ссылка на активацию объемлющего блока
    parent: Option<usize>,
}

/// Эталонный интерпретатор: исполняет AST напрямую, без кодогенерации
pub struct Interpreter<'p> {
    activations: Vec<Activation<'p>>,
    output: Vec<i64>,
}

impl<'p> Interpreter<'p> {
    pub fn new() -> Self {
        Interpreter {
            activations: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Выполняет программу и возвращает всё, что напечатал `!`.
    /// Работает в отдельном потоке с большим стеком.
    pub fn run(self, program: &'p ast::Program) -> Result<Vec<i64>, CompileError> {
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("pl0-interpreter".to_string())
                .stack_size(STACK_SIZE)
                .spawn_scoped(scope, move || self.run_program(program))?;

            worker.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
        })
    }

    fn run_program(mut self, program: &'p ast::Program) -> Result<Vec<i64>, CompileError> {
        self.run_block(&program.block, None)?;
        debug!(printed = self.output.len(), "interpretation finished");
        Ok(self.output)
    }

    fn run_block(&mut self, block: &'p ast::Block, parent: Option<usize>) -> Result<(), CompileError> {
        let mut names = HashMap::new();
        for constant in &block.constants {
            names.insert(constant.name.as_str(), Value::Constant(constant.value));
        }
        for variable in &block.variables {
            names.insert(variable.name.as_str(), Value::Variable(0));
        }
        for procedure in &block.procedures {
            names.insert(procedure.name.as_str(), Value::Procedure(procedure));
        }

        self.activations.push(Activation { names, parent });
        let result = self.execute(&block.statement);
        self.activations.pop();
        result
    }

    fn current(&self) -> usize {
        self.activations.len() - 1
    }

    /// Идём по статическим ссылкам от текущей активации
    fn lookup(&self, name: &str, span: Span) -> Result<(usize, Value<'p>), CompileError> {
        let mut index = Some(self.current());

        while let Some(i) = index {
            let activation = &self.activations[i];
            if let Some(value) = activation.names.get(name) {
                return Ok((i, *value));
            }
            index = activation.parent;
        }

        Err(CompileError::UndefinedName { name: name.to_string(), span })
    }

    fn execute(&mut self, statement: &'p ast::Statement) -> Result<(), CompileError> {
        match statement {
            ast::Statement::Set { target, value, span } => {
                let (owner, old) = self.lookup(target, *span)?;
                if !matches!(old, Value::Variable(_)) {
                    return Err(CompileError::InvalidAssignment {
                        name: target.clone(),
                        kind: old.kind(),
                        span: *span,
                    });
                }
                let value = self.evaluate(value)?;
                self.activations[owner].names.insert(target.as_str(), Value::Variable(value));
            }
            ast::Statement::Call { name, span } => {
                let (owner, value) = self.lookup(name, *span)?;
                let Value::Procedure(procedure) = value else {
                    return Err(CompileError::NotAProcedure {
                        name: name.clone(),
                        kind: value.kind(),
                        span: *span,
                    });
                };
                if self.activations.len() >= MAX_CALL_DEPTH {
                    return Err(CompileError::RecursionLimit {
                        name: name.clone(),
                        limit: MAX_CALL_DEPTH,
                    });
                }
                trace!(procedure = %name, depth = self.activations.len(), "call");
                self.run_block(&procedure.block, Some(owner))?;
            }
            ast::Statement::Begin(statements) => {
                for statement in statements {
                    self.execute(statement)?;
                }
            }
            ast::Statement::If { condition, body } => {
                if self.test(condition)? {
                    self.execute(body)?;
                }
            }
            ast::Statement::While { condition, body } => {
                while self.test(condition)? {
                    self.execute(body)?;
                }
            }
            ast::Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                self.output.push(value);
            }
        }
        Ok(())
    }

    fn test(&mut self, condition: &'p ast::Condition) -> Result<bool, CompileError> {
        match condition {
            ast::Condition::Odd(expression) => Ok(self.evaluate(expression)? % 2 != 0),
            ast::Condition::Compare { left, op, right } => {
                let a = self.evaluate(left)?;
                let b = self.evaluate(right)?;
                Ok(compare(op.opcode(), a, b))
            }
        }
    }

    fn evaluate(&mut self, expression: &'p ast::Expression) -> Result<i64, CompileError> {
        let mut value = self.evaluate_term(&expression.first)?;

        for (op, term) in &expression.rest {
            let rhs = self.evaluate_term(term)?;
            value = arithmetic(op.opcode(), value, rhs)?;
        }

        // знак относится ко всему выражению, как в кодогенераторе
        if expression.sign == Some(ast::AddOperator::Minus) {
            value = arithmetic(Opcode::Mul, value, -1)?;
        }
        Ok(value)
    }

    fn evaluate_term(&mut self, term: &'p ast::Term) -> Result<i64, CompileError> {
        let mut value = self.evaluate_factor(&term.first)?;

        for (op, factor) in &term.rest {
            let rhs = self.evaluate_factor(factor)?;
            value = arithmetic(op.opcode(), value, rhs)?;
        }
        Ok(value)
    }

    fn evaluate_factor(&mut self, factor: &'p ast::Factor) -> Result<i64, CompileError> {
        match factor {
            ast::Factor::Number(value) => Ok(*value),
            ast::Factor::Group(expression) => self.evaluate(expression),
            ast::Factor::Name { name, span } => match self.lookup(name, *span)?.1 {
                Value::Constant(value) | Value::Variable(value) => Ok(value),
                Value::Procedure(_) => Err(CompileError::InvalidValue {
                    name: name.clone(),
                    kind: SymbolKind::Procedure,
                    span: *span,
                }),
            },
        }
    }
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Self::new()
    }
}
