use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Constant,
    Variable,
    Procedure,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Constant => f.write_str("CONSTANT"),
            SymbolKind::Variable => f.write_str("VARIABLE"),
            SymbolKind::Procedure => f.write_str("PROCEDURE"),
        }
    }
}

/// Привязка имени в кадре
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// значение константы
    Constant(i64),
    /// метка ячейки переменной
    Variable(String),
    /// метка входа процедуры
    Procedure(String),
}

impl Symbol {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Constant(_) => SymbolKind::Constant,
            Symbol::Variable(_) => SymbolKind::Variable,
            Symbol::Procedure(_) => SymbolKind::Procedure,
        }
    }
}

/// Один лексический уровень
#[derive(Debug, Default)]
pub struct Frame {
    symbols: HashMap<String, Symbol>,
    // метки переменных в порядке объявления
    variables: Vec<String>,
}

impl Frame {
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Метки переменных этого кадра, в порядке объявления
    pub fn variable_labels(&self) -> &[String] {
        &self.variables
    }

    fn insert(&mut self, name: &str, symbol: Symbol) {
        // переопределение в том же кадре просто перезаписывает старое
        if let Some(Symbol::Variable(old)) = self.symbols.get(name) {
            let old = old.clone();
            self.variables.retain(|label| *label != old);
        }
        if let Symbol::Variable(label) = &symbol {
            self.variables.push(label.clone());
        }
        self.symbols.insert(name.to_string(), symbol);
    }
}

/// Результат поиска: что нашли и на сколько уровней выше текущего
#[derive(Debug, PartialEq, Eq)]
pub struct Resolved<'s> {
    pub symbol: &'s Symbol,
    pub depth: usize,
}

/// Стек кадров: внизу глобальный, сверху текущий блок
#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Кадры начиная с уровня `level` (0 - глобальный) и до текущего
    pub fn frames_from(&self, level: usize) -> &[Frame] {
        &self.frames[level.min(self.frames.len())..]
    }

    /// Константа в текущем кадре
    pub fn define(&mut self, name: &str, value: i64) {
        self.insert(name, Symbol::Constant(value));
    }

    /// Переменная в текущем кадре
    pub fn update(&mut self, name: &str, label: String) {
        self.insert(name, Symbol::Variable(label));
    }

    /// Процедура в текущем кадре
    pub fn declare(&mut self, name: &str, label: String) {
        self.insert(name, Symbol::Procedure(label));
    }

    fn insert(&mut self, name: &str, symbol: Symbol) {
        if self.frames.is_empty() {
            self.push();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, symbol);
        }
    }

    /// Поиск от внутреннего кадра к внешнему
    pub fn resolve(&self, name: &str, span: Span) -> Result<Resolved<'_>, CompileError> {
        self.frames
            .iter()
            .rev()
            .enumerate()
            .find_map(|(depth, frame)| frame.lookup(name).map(|symbol| Resolved { symbol, depth }))
            .ok_or_else(|| CompileError::UndefinedName {
                name: name.to_string(),
                span,
            })
    }
}
