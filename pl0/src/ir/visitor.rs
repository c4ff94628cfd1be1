//! Обход AST по видам узлов.
//!
//! Внешние бэкенды (печать дерева, интерпретаторы, экспорт в графы) видят
//! дерево только через [`Node`]: вид узла, его значение и дочерние узлы.

use std::fmt;

use super::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    Block,
    Constants,
    Define,
    Variables,
    Procedures,
    Procedure,
    Begin,
    If,
    While,
    Set,
    Call,
    Print,
    Condition,
    Odd,
    Expression,
    Term,
    Name,
    Number,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Program => "PROGRAM",
            NodeKind::Block => "BLOCK",
            NodeKind::Constants => "CONSTANTS",
            NodeKind::Define => "DEFINE",
            NodeKind::Variables => "VARIABLES",
            NodeKind::Procedures => "PROCEDURES",
            NodeKind::Procedure => "PROCEDURE",
            NodeKind::Begin => "BEGIN",
            NodeKind::If => "IF",
            NodeKind::While => "WHILE",
            NodeKind::Set => "SET",
            NodeKind::Call => "CALL",
            NodeKind::Print => "PRINT",
            NodeKind::Condition => "CONDITION",
            NodeKind::Odd => "ODD",
            NodeKind::Expression => "EXPRESSION",
            NodeKind::Term => "TERM",
            NodeKind::Name => "NAME",
            NodeKind::Number => "NUMBER",
        };
        f.write_str(name)
    }
}

/// Ссылка на любой узел дерева
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Program(&'a Program),
    Block(&'a Block),
    Constants(&'a [Constant]),
    Define(&'a Constant),
    Variables(&'a [Variable]),
    Procedures(&'a [Procedure]),
    Procedure(&'a Procedure),
    Statement(&'a Statement),
    Condition(&'a Condition),
    Expression(&'a Expression),
    Term(&'a Term),
    Factor(&'a Factor),
    Name(&'a str),
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Program(_) => NodeKind::Program,
            Node::Block(_) => NodeKind::Block,
            Node::Constants(_) => NodeKind::Constants,
            Node::Define(_) => NodeKind::Define,
            Node::Variables(_) => NodeKind::Variables,
            Node::Procedures(_) => NodeKind::Procedures,
            Node::Procedure(_) => NodeKind::Procedure,
            Node::Statement(statement) => match statement {
                Statement::Set { .. } => NodeKind::Set,
                Statement::Call { .. } => NodeKind::Call,
                Statement::Begin(_) => NodeKind::Begin,
                Statement::If { .. } => NodeKind::If,
                Statement::While { .. } => NodeKind::While,
                Statement::Print(_) => NodeKind::Print,
            },
            Node::Condition(Condition::Odd(_)) => NodeKind::Odd,
            Node::Condition(Condition::Compare { .. }) => NodeKind::Condition,
            Node::Expression(_) => NodeKind::Expression,
            Node::Term(_) => NodeKind::Term,
            Node::Factor(Factor::Name { .. }) | Node::Name(_) => NodeKind::Name,
            Node::Factor(Factor::Number(_)) => NodeKind::Number,
            // Скобки не дают отдельного узла
            Node::Factor(Factor::Group(expression)) => Node::Expression(expression).kind(),
        }
    }

    /// Значение листа или оператор узла, если есть
    pub fn label(&self) -> Option<String> {
        match self {
            Node::Define(constant) => Some(format!("{} = {}", constant.name, constant.value)),
            Node::Procedure(procedure) => Some(procedure.name.clone()),
            Node::Name(name) => Some(name.to_string()),
            Node::Factor(Factor::Name { name, .. }) => Some(name.clone()),
            Node::Factor(Factor::Number(value)) => Some(value.to_string()),
            Node::Factor(Factor::Group(expression)) => Node::Expression(expression).label(),
            Node::Condition(Condition::Compare { op, .. }) => Some(op.symbol().to_string()),
            Node::Expression(expression) => {
                let mut ops: Vec<&str> = expression.sign.iter().map(|sign| sign.symbol()).collect();
                ops.extend(expression.rest.iter().map(|(op, _)| op.symbol()));
                (!ops.is_empty()).then(|| ops.join(" "))
            }
            Node::Term(term) => {
                let ops: Vec<&str> = term.rest.iter().map(|(op, _)| op.symbol()).collect();
                (!ops.is_empty()).then(|| ops.join(" "))
            }
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::Program(program) => vec![Node::Block(&program.block)],
            Node::Block(block) => {
                let mut children = Vec::new();
                if !block.constants.is_empty() {
                    children.push(Node::Constants(&block.constants));
                }
                if !block.variables.is_empty() {
                    children.push(Node::Variables(&block.variables));
                }
                if !block.procedures.is_empty() {
                    children.push(Node::Procedures(&block.procedures));
                }
                children.push(Node::Statement(&block.statement));
                children
            }
            Node::Constants(constants) => constants.iter().map(Node::Define).collect(),
            Node::Define(_) => Vec::new(),
            Node::Variables(variables) => variables.iter().map(|v| Node::Name(&v.name)).collect(),
            Node::Procedures(procedures) => procedures.iter().map(Node::Procedure).collect(),
            Node::Procedure(procedure) => vec![Node::Block(&procedure.block)],
            Node::Statement(statement) => match statement {
                Statement::Set { target, value, .. } => {
                    vec![Node::Name(target), Node::Expression(value)]
                }
                Statement::Call { name, .. } => vec![Node::Name(name)],
                Statement::Begin(statements) => statements.iter().map(Node::Statement).collect(),
                Statement::If { condition, body } | Statement::While { condition, body } => {
                    vec![Node::Condition(condition), Node::Statement(body)]
                }
                Statement::Print(expression) => vec![Node::Expression(expression)],
            },
            Node::Condition(condition) => match condition {
                Condition::Odd(expression) => vec![Node::Expression(expression)],
                Condition::Compare { left, right, .. } => {
                    vec![Node::Expression(left), Node::Expression(right)]
                }
            },
            Node::Expression(expression) => {
                let mut children = vec![Node::Term(&expression.first)];
                children.extend(expression.rest.iter().map(|(_, term)| Node::Term(term)));
                children
            }
            Node::Term(term) => {
                let mut children = vec![Node::Factor(&term.first)];
                children.extend(term.rest.iter().map(|(_, factor)| Node::Factor(factor)));
                children
            }
            Node::Factor(Factor::Group(expression)) => Node::Expression(expression).children(),
            Node::Factor(_) | Node::Name(_) => Vec::new(),
        }
    }
}

/// Посетитель: по умолчанию просто спускается во все дочерние узлы
pub trait Visitor<'a> {
    fn visit(&mut self, node: Node<'a>) {
        self.visit_children(node);
    }

    fn visit_children(&mut self, node: Node<'a>) {
        for child in node.children() {
            self.visit(child);
        }
    }
}

/// Печать дерева с отступами: `KIND value`
#[derive(Default)]
pub struct TreePrinter {
    depth: usize,
    output: String,
}

impl TreePrinter {
    pub fn print(program: &Program) -> String {
        let mut printer = TreePrinter::default();
        printer.visit(Node::Program(program));
        printer.output
    }
}

impl<'a> Visitor<'a> for TreePrinter {
    fn visit(&mut self, node: Node<'a>) {
        let indent = "  ".repeat(self.depth);
        match node.label() {
            Some(label) => self.output.push_str(&format!("{}{} {}\n", indent, node.kind(), label)),
            None => self.output.push_str(&format!("{}{}\n", indent, node.kind())),
        }

        self.depth += 1;
        self.visit_children(node);
        self.depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use std::collections::HashMap;

    #[derive(Default)]
    struct KindCounter {
        counts: HashMap<NodeKind, usize>,
    }

    impl<'a> Visitor<'a> for KindCounter {
        fn visit(&mut self, node: Node<'a>) {
            *self.counts.entry(node.kind()).or_default() += 1;
            self.visit_children(node);
        }
    }

    #[derive(Default)]
    struct CallCollector {
        calls: Vec<String>,
    }

    impl<'a> Visitor<'a> for CallCollector {
        fn visit(&mut self, node: Node<'a>) {
            if let Node::Statement(Statement::Call { name, .. }) = node {
                self.calls.push(name.clone());
            }
            self.visit_children(node);
        }
    }

    #[test]
    fn default_visit_reaches_every_node() {
        let program = parse("var x; procedure p; x := 1; begin call p; !x * 2 end.").unwrap();
        let mut counter = KindCounter::default();
        counter.visit(Node::Program(&program));

        assert_eq!(counter.counts[&NodeKind::Program], 1);
        assert_eq!(counter.counts[&NodeKind::Block], 2);
        assert_eq!(counter.counts[&NodeKind::Procedure], 1);
        assert_eq!(counter.counts[&NodeKind::Set], 1);
        assert_eq!(counter.counts[&NodeKind::Call], 1);
        assert_eq!(counter.counts[&NodeKind::Print], 1);
        assert_eq!(counter.counts[&NodeKind::Number], 2);
    }

    #[test]
    fn overriding_one_kind_keeps_the_fallback() {
        let program = parse(
            "procedure a; procedure b; call a; call b; begin call a; call a end.",
        )
        .unwrap();
        let mut collector = CallCollector::default();
        collector.visit(Node::Program(&program));
        assert_eq!(collector.calls, vec!["a", "b", "a", "a"]);
    }

    #[test]
    fn tree_printer_shows_kinds_and_values() {
        let program = parse("const a = 5; !a - 1.").unwrap();
        let tree = TreePrinter::print(&program);
        let expected = "\
PROGRAM
  BLOCK
    CONSTANTS
      DEFINE a = 5
    PRINT
      EXPRESSION -
        TERM
          NAME a
        TERM
          NUMBER 1
";
        assert_eq!(tree, expected);
    }
}
