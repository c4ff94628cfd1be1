use std::fmt::Display;

use tracing::debug;

use pl0_vm::Opcode;

use crate::error::CompileError;
use crate::ir::ast;
use crate::scope::{Scope, Symbol};
use crate::span::Span;

use super::Backend;

/// Метка входа в основную программу
pub const ENTRY_LABEL: &str = "main";

/// Кодогенератор для стековой машины.
/// Один проход по AST, на выходе строки ассемблера.
pub struct Compiler {
    lines: Vec<String>,
    label_id: usize,
    scope: Scope,
    // метки процедур, которые сейчас компилируются, снаружи внутрь
    procedure_path: Vec<String>,
}

impl Backend for Compiler {
    fn compile(&mut self, program: &ast::Program) -> Result<String, CompileError> {
        self.compile_program(program)
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            label_id: 0,
            scope: Scope::new(),
            procedure_path: Vec::new(),
        }
    }

    pub fn compile_program(&mut self, program: &ast::Program) -> Result<String, CompileError> {
        // каждый запуск начинается с чистого состояния
        self.lines.clear();
        self.label_id = 0;
        self.scope = Scope::new();
        self.procedure_path.clear();

        self.scope.push();
        self.emit_with(Opcode::Jmp, ENTRY_LABEL);

        self.compile_declarations(&program.block)?;

        self.emit_label(ENTRY_LABEL);
        self.compile_statement(&program.block.statement)?;
        self.emit(Opcode::Halt);

        self.scope.pop();
        debug!(lines = self.lines.len(), labels = self.label_id, "code generated");

        let mut assembly = self.lines.join("\n");
        assembly.push('\n');
        Ok(assembly)
    }

    fn intermediate_label(&mut self, hint: &str) -> String {
        self.label_id += 1;
        format!("t_{}_{}", hint, self.label_id)
    }

    fn compile_declarations(&mut self, block: &ast::Block) -> Result<(), CompileError> {
        for constant in &block.constants {
            self.scope.define(&constant.name, constant.value);
        }

        for variable in &block.variables {
            // Уникальная метка, под ней одна статическая ячейка
            let label = self.intermediate_label(&format!("var_{}", variable.name));
            self.scope.update(&variable.name, label.clone());
            self.lines.push(format!("{}: 0", label));
        }

        for procedure in &block.procedures {
            self.compile_procedure(procedure)?;
        }
        Ok(())
    }

    fn compile_procedure(&mut self, procedure: &ast::Procedure) -> Result<(), CompileError> {
        let entry = self.intermediate_label(&format!("proc_{}", procedure.name));

        // Имя видно в объемлющем кадре - работают и соседние, и рекурсивные вызовы
        self.scope.declare(&procedure.name, entry.clone());

        self.scope.push();
        self.procedure_path.push(entry.clone());

        self.lines.push(format!("# Procedure {}", procedure.name));
        self.compile_declarations(&procedure.block)?;

        self.emit_label(&entry);
        // Каждая активация начинает с нулевых локальных переменных
        let locals = self.local_variables(self.scope.depth() - 1);
        for label in &locals {
            self.emit_with(Opcode::Push, 0);
            self.emit_with(Opcode::Save, label);
        }

        self.compile_statement(&procedure.block.statement)?;
        self.emit(Opcode::Ret);

        self.procedure_path.pop();
        self.scope.pop();
        Ok(())
    }

    /// Метки переменных всех кадров начиная с уровня `level`
    fn local_variables(&self, level: usize) -> Vec<String> {
        self.scope
            .frames_from(level)
            .iter()
            .flat_map(|frame| frame.variable_labels().iter().cloned())
            .collect()
    }

    fn compile_statement(&mut self, statement: &ast::Statement) -> Result<(), CompileError> {
        match statement {
            ast::Statement::Set { target, value, span } => {
                self.compile_set(target, value, *span)?;
            }
            ast::Statement::Call { name, span } => {
                self.compile_call(name, *span)?;
            }
            ast::Statement::Begin(statements) => {
                for statement in statements {
                    self.compile_statement(statement)?;
                }
            }
            ast::Statement::If { condition, body } => {
                self.compile_if(condition, body)?;
            }
            ast::Statement::While { condition, body } => {
                self.compile_while(condition, body)?;
            }
            ast::Statement::Print(expression) => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Print);
                self.emit(Opcode::Pop);
            }
        }
        Ok(())
    }

    fn compile_set(&mut self, target: &str, value: &ast::Expression, span: Span) -> Result<(), CompileError> {
        let label = match self.scope.resolve(target, span)?.symbol {
            Symbol::Variable(label) => label.clone(),
            other => {
                return Err(CompileError::InvalidAssignment {
                    name: target.to_string(),
                    kind: other.kind(),
                    span,
                });
            }
        };

        self.compile_expression(value)?;
        self.emit_with(Opcode::Save, label);
        Ok(())
    }

    fn compile_call(&mut self, name: &str, span: Span) -> Result<(), CompileError> {
        let entry = match self.scope.resolve(name, span)?.symbol {
            Symbol::Procedure(label) => label.clone(),
            other => {
                return Err(CompileError::NotAProcedure {
                    name: name.to_string(),
                    kind: other.kind(),
                    span,
                });
            }
        };

        // Вызов процедуры, которая сейчас компилируется: ячейки статические,
        // поэтому сохраняем переменные её кадра и всех вложенных на стеке
        let Some(index) = self.procedure_path.iter().position(|label| *label == entry) else {
            self.emit_with(Opcode::Call, entry);
            return Ok(());
        };

        let saved = self.local_variables(index + 1);
        debug!(procedure = name, saved = saved.len(), "recursive call");

        for label in &saved {
            self.emit_with(Opcode::Load, label);
        }
        self.emit_with(Opcode::Call, entry);
        for label in saved.iter().rev() {
            self.emit_with(Opcode::Save, label);
        }
        Ok(())
    }

    fn compile_if(&mut self, condition: &ast::Condition, body: &ast::Statement) -> Result<(), CompileError> {
        let false_label = self.intermediate_label("if_false");

        // Результат условия (1/0) на вершине стека, JE прыгает при 0
        self.compile_condition(condition)?;
        self.emit_with(Opcode::Je, &false_label);

        self.compile_statement(body)?;

        self.emit_label(&false_label);
        Ok(())
    }

    fn compile_while(&mut self, condition: &ast::Condition, body: &ast::Statement) -> Result<(), CompileError> {
        let top_label = self.intermediate_label("while_start");
        let bottom_label = self.intermediate_label("while_end");

        self.emit_label(&top_label);
        self.compile_condition(condition)?;
        self.emit_with(Opcode::Je, &bottom_label);

        self.compile_statement(body)?;

        self.emit_with(Opcode::Jmp, &top_label);
        self.emit_label(&bottom_label);
        Ok(())
    }

    fn compile_condition(&mut self, condition: &ast::Condition) -> Result<(), CompileError> {
        match condition {
            ast::Condition::Odd(expression) => {
                // x - (x / 2) * 2 != 0
                self.compile_expression(expression)?;
                self.emit(Opcode::Dup);
                self.emit_with(Opcode::Push, 2);
                self.emit(Opcode::Div);
                self.emit_with(Opcode::Push, 2);
                self.emit(Opcode::Mul);
                self.emit(Opcode::Sub);
                self.emit_with(Opcode::Push, 0);
                self.emit(Opcode::CmpNe);
            }
            ast::Condition::Compare { left, op, right } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(op.opcode());
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &ast::Expression) -> Result<(), CompileError> {
        self.compile_term(&expression.first)?;

        for (op, term) in &expression.rest {
            self.compile_term(term)?;
            self.emit(op.opcode());
        }

        // Унарный минус меняет знак всего выражения
        if expression.sign == Some(ast::AddOperator::Minus) {
            self.emit_with(Opcode::Push, -1);
            self.emit(Opcode::Mul);
        }
        Ok(())
    }

    fn compile_term(&mut self, term: &ast::Term) -> Result<(), CompileError> {
        self.compile_factor(&term.first)?;

        for (op, factor) in &term.rest {
            self.compile_factor(factor)?;
            self.emit(op.opcode());
        }
        Ok(())
    }

    fn compile_factor(&mut self, factor: &ast::Factor) -> Result<(), CompileError> {
        match factor {
            ast::Factor::Number(value) => {
                self.emit_with(Opcode::Push, value);
            }
            ast::Factor::Name { name, span } => {
                match self.scope.resolve(name, *span)?.symbol {
                    Symbol::Variable(label) => {
                        let label = label.clone();
                        self.emit_with(Opcode::Load, label);
                    }
                    Symbol::Constant(value) => {
                        let value = *value;
                        self.emit_with(Opcode::Push, value);
                    }
                    Symbol::Procedure(_) => {
                        return Err(CompileError::InvalidValue {
                            name: name.clone(),
                            kind: crate::scope::SymbolKind::Procedure,
                            span: *span,
                        });
                    }
                }
            }
            ast::Factor::Group(expression) => {
                self.compile_expression(expression)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, opcode: Opcode) {
        self.lines.push(format!("\t{}", opcode));
    }

    fn emit_with(&mut self, opcode: Opcode, operand: impl Display) {
        self.lines.push(format!("\t{} {}", opcode, operand));
    }

    fn emit_label(&mut self, label: &str) {
        self.lines.push(format!("{}:", label));
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
