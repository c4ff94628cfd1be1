use pl0_vm::Opcode;

use crate::span::Span;

#[derive(Debug, Clone)]
pub struct Program {
    pub block: Block,
}

/// Блок: объявления строго по порядку, затем один оператор
#[derive(Debug, Clone)]
pub struct Block {
    pub constants: Vec<Constant>,
    pub variables: Vec<Variable>,
    pub procedures: Vec<Procedure>,
    pub statement: Statement,
}

/// const a = 5
#[derive(Debug, Clone)]
pub struct Constant {
    pub name: String,
    pub value: i64,
    pub span: Span,
}

/// var x
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub span: Span,
}

/// procedure p; block;
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Statement {
    /// x := expression
    Set {
        target: String,
        value: Expression,
        span: Span,
    },
    /// call p
    Call {
        name: String,
        span: Span,
    },
    /// begin ... ; ... end
    Begin(Vec<Statement>),
    /// if условие then ...
    If {
        condition: Condition,
        body: Box<Statement>,
    },
    /// while условие do ...
    While {
        condition: Condition,
        body: Box<Statement>,
    },
    /// ! expression
    Print(Expression),
}

#[derive(Debug, Clone)]
pub enum Condition {
    /// odd x
    Odd(Expression),
    /// a < b и т.д.
    Compare {
        left: Expression,
        op: Relation,
        right: Expression,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Equal,        // =
    NotEqual,     // !=
}

/// [+|-] term {(+|-) term}
/// Знак не сворачивается при разборе - его обрабатывает кодогенератор
#[derive(Debug, Clone)]
pub struct Expression {
    pub sign: Option<AddOperator>,
    pub first: Term,
    pub rest: Vec<(AddOperator, Term)>,
}

/// factor {(*|/) factor}
#[derive(Debug, Clone)]
pub struct Term {
    pub first: Factor,
    pub rest: Vec<(MulOperator, Factor)>,
}

#[derive(Debug, Clone)]
pub enum Factor {
    Name { name: String, span: Span },
    Number(i64),
    Group(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOperator {
    Plus,  // +
    Minus, // -
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOperator {
    Times,  // *
    Divide, // /
}

impl Relation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Relation::Less => "<",
            Relation::LessEqual => "<=",
            Relation::Greater => ">",
            Relation::GreaterEqual => ">=",
            Relation::Equal => "=",
            Relation::NotEqual => "!=",
        }
    }

    /// Инструкция сравнения, которая кладёт 1/0
    pub fn opcode(&self) -> Opcode {
        match self {
            Relation::Less => Opcode::CmpLt,
            Relation::LessEqual => Opcode::CmpLte,
            Relation::Greater => Opcode::CmpGt,
            Relation::GreaterEqual => Opcode::CmpGte,
            Relation::Equal => Opcode::CmpE,
            Relation::NotEqual => Opcode::CmpNe,
        }
    }
}

impl AddOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            AddOperator::Plus => "+",
            AddOperator::Minus => "-",
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            AddOperator::Plus => Opcode::Add,
            AddOperator::Minus => Opcode::Sub,
        }
    }
}

impl MulOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            MulOperator::Times => "*",
            MulOperator::Divide => "/",
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            MulOperator::Times => Opcode::Mul,
            MulOperator::Divide => Opcode::Div,
        }
    }
}
