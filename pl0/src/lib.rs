pub mod assembler;
pub mod backends;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod parser;
pub mod scope;
pub mod span;

use pl0_vm::Machine;

use backends::Backend;
use error::CompileError;

/// Исходник -> текст ассемблера стековой машины
pub fn compile(source: &str) -> Result<String, CompileError> {
    let program = parser::parse(source)?;
    backends::stack::Compiler::new().compile(&program)
}

/// Текст ассемблера -> плоская программа
pub fn assemble(text: &str) -> Result<Vec<i64>, CompileError> {
    Ok(assembler::assemble(text)?.code)
}

/// Весь конвейер: компиляция, сборка и запуск на машине
pub fn run(source: &str) -> Result<Vec<i64>, CompileError> {
    let code = assemble(&compile(source)?)?;
    Ok(Machine::new(code).run()?)
}

/// Исполнение AST эталонным интерпретатором
pub fn interpret(source: &str) -> Result<Vec<i64>, CompileError> {
    let program = parser::parse(source)?;
    interpreter::Interpreter::new().run(&program)
}
