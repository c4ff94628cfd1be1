use crate::error::CompileError;
use crate::ir::ast;
use crate::span::Span;
use super::lexer::{Token, TokenKind};

/// Разбор всего потока токенов в Program
pub fn parse_tokens<I: Iterator<Item = Token>>(tokens: I) -> Result<ast::Program, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Предиктивный парсер: текущий токен выбирает правило, без отката
struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    current: Token,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    fn new(mut tokens: I) -> Self {
        let current = next_or_eof(&mut tokens, Span::default());
        Self { tokens, current }
    }

    // program = block "." .
    fn parse_program(&mut self) -> Result<ast::Program, CompileError> {
        let block = self.parse_block()?;
        self.expect(TokenKind::Dot)?;
        self.expect(TokenKind::Eof)?;
        Ok(ast::Program { block })
    }

    fn parse_block(&mut self) -> Result<ast::Block, CompileError> {
        let constants = self.parse_constants()?;
        let variables = self.parse_variables()?;
        let procedures = self.parse_procedures()?;
        let statement = self.parse_statement()?;

        Ok(ast::Block { constants, variables, procedures, statement })
    }

    // ["const" ident "=" number {"," ident "=" number} ";"]
    fn parse_constants(&mut self) -> Result<Vec<ast::Constant>, CompileError> {
        let mut constants = Vec::new();
        if !self.eat(&TokenKind::Const) {
            return Ok(constants);
        }

        loop {
            let (name, span) = self.expect_identifier()?;
            self.expect(TokenKind::Equal)?;
            let value = self.expect_number()?;
            constants.push(ast::Constant { name, value, span });

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(constants)
    }

    // ["var" ident {"," ident} ";"]
    fn parse_variables(&mut self) -> Result<Vec<ast::Variable>, CompileError> {
        let mut variables = Vec::new();
        if !self.eat(&TokenKind::Var) {
            return Ok(variables);
        }

        loop {
            let (name, span) = self.expect_identifier()?;
            variables.push(ast::Variable { name, span });

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::Semicolon)?;
        Ok(variables)
    }

    // {"procedure" ident ";" block ";"}
    fn parse_procedures(&mut self) -> Result<Vec<ast::Procedure>, CompileError> {
        let mut procedures = Vec::new();

        while self.eat(&TokenKind::Procedure) {
            let (name, span) = self.expect_identifier()?;
            self.expect(TokenKind::Semicolon)?;
            let block = self.parse_block()?;
            self.expect(TokenKind::Semicolon)?;

            procedures.push(ast::Procedure { name, block, span });
        }

        Ok(procedures)
    }

    fn parse_statement(&mut self) -> Result<ast::Statement, CompileError> {
        match &self.current.kind {
            TokenKind::Identifier(_) => {
                let (target, span) = self.expect_identifier()?;
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expression()?;
                Ok(ast::Statement::Set { target, value, span })
            }
            TokenKind::Call => {
                self.advance();
                let (name, span) = self.expect_identifier()?;
                Ok(ast::Statement::Call { name, span })
            }
            TokenKind::Begin => {
                self.advance();
                let mut statements = vec![self.parse_statement()?];
                while self.eat(&TokenKind::Semicolon) {
                    statements.push(self.parse_statement()?);
                }
                self.expect(TokenKind::End)?;
                Ok(ast::Statement::Begin(statements))
            }
            TokenKind::If => {
                self.advance();
                let condition = self.parse_condition()?;
                self.expect(TokenKind::Then)?;
                let body = self.parse_statement()?;
                Ok(ast::Statement::If { condition, body: Box::new(body) })
            }
            TokenKind::While => {
                self.advance();
                let condition = self.parse_condition()?;
                self.expect(TokenKind::Do)?;
                let body = self.parse_statement()?;
                Ok(ast::Statement::While { condition, body: Box::new(body) })
            }
            TokenKind::Print => {
                self.advance();
                let expression = self.parse_expression()?;
                Ok(ast::Statement::Print(expression))
            }
            _ => Err(self.error("statement")),
        }
    }

    // "odd" expression | expression relop expression
    fn parse_condition(&mut self) -> Result<ast::Condition, CompileError> {
        if self.eat(&TokenKind::Odd) {
            let expression = self.parse_expression()?;
            return Ok(ast::Condition::Odd(expression));
        }

        let left = self.parse_expression()?;
        let op = match self.current.kind {
            TokenKind::Less => ast::Relation::Less,
            TokenKind::LessEqual => ast::Relation::LessEqual,
            TokenKind::Greater => ast::Relation::Greater,
            TokenKind::GreaterEqual => ast::Relation::GreaterEqual,
            TokenKind::Equal => ast::Relation::Equal,
            TokenKind::NotEqual => ast::Relation::NotEqual,
            _ => return Err(self.error("comparison operator")),
        };
        self.advance();
        let right = self.parse_expression()?;

        Ok(ast::Condition::Compare { left, op, right })
    }

    fn parse_add_operator(&mut self) -> Option<ast::AddOperator> {
        let op = match self.current.kind {
            TokenKind::Plus => ast::AddOperator::Plus,
            TokenKind::Minus => ast::AddOperator::Minus,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    // ["+"|"-"] term {("+"|"-") term}
    fn parse_expression(&mut self) -> Result<ast::Expression, CompileError> {
        let sign = self.parse_add_operator();
        let first = self.parse_term()?;

        let mut rest = Vec::new();
        while let Some(op) = self.parse_add_operator() {
            rest.push((op, self.parse_term()?));
        }

        Ok(ast::Expression { sign, first, rest })
    }

    // factor {("*"|"/") factor}
    fn parse_term(&mut self) -> Result<ast::Term, CompileError> {
        let first = self.parse_factor()?;

        let mut rest = Vec::new();
        loop {
            let op = match self.current.kind {
                TokenKind::Times => ast::MulOperator::Times,
                TokenKind::Divide => ast::MulOperator::Divide,
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_factor()?));
        }

        Ok(ast::Term { first, rest })
    }

    // ident | number | "(" expression ")"
    fn parse_factor(&mut self) -> Result<ast::Factor, CompileError> {
        match &self.current.kind {
            TokenKind::Identifier(_) => {
                let (name, span) = self.expect_identifier()?;
                Ok(ast::Factor::Name { name, span })
            }
            TokenKind::Number(_) | TokenKind::NumberOutOfRange(_) => {
                let value = self.expect_number()?;
                Ok(ast::Factor::Number(value))
            }
            TokenKind::LParen => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(ast::Factor::Group(Box::new(expression)))
            }
            _ => Err(self.error("number, name, or '('")),
        }
    }

    // Вспомогательные методы

    fn advance(&mut self) -> Token {
        let span = self.current.span;
        let next = next_or_eof(&mut self.tokens, span);
        std::mem::replace(&mut self.current, next)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.current.kind == *kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, CompileError> {
        if self.current.kind == expected {
            Ok(self.advance())
        } else {
            Err(self.error(&expected.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), CompileError> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            let span = self.advance().span;
            Ok((name, span))
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect_number(&mut self) -> Result<i64, CompileError> {
        match self.current.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(value)
            }
            TokenKind::NumberOutOfRange(_) => Err(self.error("number within i64 range")),
            _ => Err(self.error("number")),
        }
    }

    fn error(&self, expected: &str) -> CompileError {
        CompileError::SyntaxError {
            span: self.current.span,
            expected: expected.to_string(),
            found: self.current.kind.to_string(),
        }
    }
}

/// После конца потока парсер видит Eof, а не None
fn next_or_eof<I: Iterator<Item = Token>>(tokens: &mut I, span: Span) -> Token {
    tokens.next().unwrap_or(Token { kind: TokenKind::Eof, span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn syntax_error(source: &str) -> (usize, usize, String) {
        match parse(source) {
            Err(CompileError::SyntaxError { span, expected, .. }) => (span.line, span.column, expected),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn declarations_in_order() {
        let program = parse("const a = 1, b = 2; var x, y; procedure p; x := a; call p.").unwrap();
        let block = &program.block;

        let constants: Vec<(&str, i64)> =
            block.constants.iter().map(|c| (c.name.as_str(), c.value)).collect();
        assert_eq!(constants, vec![("a", 1), ("b", 2)]);
        let variables: Vec<&str> = block.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(variables, vec!["x", "y"]);
        assert_eq!(block.procedures.len(), 1);
        assert_eq!(block.procedures[0].name, "p");
        assert!(matches!(block.statement, ast::Statement::Call { ref name, .. } if name == "p"));
    }

    #[test]
    fn precedence_is_structural() {
        let program = parse("!1 + 2 * 3.").unwrap();
        let ast::Statement::Print(expression) = &program.block.statement else {
            panic!("expected print");
        };

        assert!(expression.sign.is_none());
        assert!(matches!(expression.first.first, ast::Factor::Number(1)));
        assert!(expression.first.rest.is_empty());
        assert_eq!(expression.rest.len(), 1);

        let (op, term) = &expression.rest[0];
        assert_eq!(*op, ast::AddOperator::Plus);
        assert!(matches!(term.first, ast::Factor::Number(2)));
        assert_eq!(term.rest.len(), 1);
        assert_eq!(term.rest[0].0, ast::MulOperator::Times);
    }

    #[test]
    fn leading_sign_is_kept_on_the_expression() {
        let program = parse("!-1.").unwrap();
        let ast::Statement::Print(expression) = &program.block.statement else {
            panic!("expected print");
        };
        assert_eq!(expression.sign, Some(ast::AddOperator::Minus));
        assert!(matches!(expression.first.first, ast::Factor::Number(1)));
    }

    #[test]
    fn nested_procedures() {
        let program = parse("procedure outer; procedure inner; !1; call inner; call outer.").unwrap();
        let outer = &program.block.procedures[0];
        assert_eq!(outer.block.procedures[0].name, "inner");
    }

    #[test]
    fn conditions() {
        let program = parse("begin if odd 3 then !1; while 1 != 2 do !2 end.").unwrap();
        let ast::Statement::Begin(statements) = &program.block.statement else {
            panic!("expected begin");
        };
        assert!(matches!(
            &statements[0],
            ast::Statement::If { condition: ast::Condition::Odd(_), .. }
        ));
        assert!(matches!(
            &statements[1],
            ast::Statement::While { condition: ast::Condition::Compare { op: ast::Relation::NotEqual, .. }, .. }
        ));
    }

    #[test]
    fn missing_dot() {
        let (line, column, expected) = syntax_error("!1");
        assert_eq!((line, column), (1, 3));
        assert_eq!(expected, "'.'");
    }

    #[test]
    fn statements_need_begin_end() {
        let (_, _, expected) = syntax_error("var x; x := 1; !x.");
        assert_eq!(expected, "'.'");
    }

    #[test]
    fn missing_relation() {
        let (line, column, expected) = syntax_error("if 1 then !1.");
        assert_eq!((line, column), (1, 6));
        assert_eq!(expected, "comparison operator");
    }

    #[test]
    fn declarations_out_of_order() {
        let (_, _, expected) = syntax_error("var x; const a = 1; x := a.");
        assert_eq!(expected, "statement");
    }

    #[test]
    fn error_position_on_later_line() {
        let (line, column, expected) = syntax_error("begin\n  x := \nend.");
        assert_eq!((line, column), (3, 1));
        assert_eq!(expected, "number, name, or '('");
    }

    #[test]
    fn number_out_of_range_is_rejected() {
        let (line, column, expected) = syntax_error("var x;\nx := 1 + 99999999999999999999.");
        assert_eq!((line, column), (2, 10));
        assert_eq!(expected, "number within i64 range");

        let (_, _, expected) = syntax_error("const big = 9223372036854775808; !big.");
        assert_eq!(expected, "number within i64 range");
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let (_, _, expected) = syntax_error("!1. !2.");
        assert_eq!(expected, "end of file");
    }
}
