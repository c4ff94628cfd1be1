use pl0::error::CompileError;
use pl0::parser::lexer::{Lexer, TokenKind};

use std::{
    fs,
    path::{Path, PathBuf},
};

const TESTFILE_DIRNAME: &str = "test_programs/";
const EXPECT_PREFIX: &str = "# expect:";

#[test]
fn run_all_testcases() {
    let mut paths: Vec<PathBuf> = Vec::new();
    for file in fs::read_dir(Path::new(TESTFILE_DIRNAME)).expect("Failed to open test directory!") {
        let path = file.expect("Failed to open a test file!").path();
        if path.extension().is_some_and(|ext| ext == "pl0") {
            paths.push(path);
        }
    }
    paths.sort();
    assert!(!paths.is_empty(), "no test programs found");

    let mut tests = E2ETests::new(paths);
    tests.run_all();
    tests.output();
}

struct E2ETests {
    paths: Vec<PathBuf>,
    results: Vec<Result<(), (PathBuf, String)>>,
}

impl E2ETests {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            results: Vec::new(),
        }
    }

    pub fn run_all(&mut self) {
        for path in self.paths.clone() {
            let result = Self::run_testfile(&path).map_err(|reason| (path.clone(), reason));
            self.results.push(result);
        }
    }

    pub fn output(&self) {
        let failures: Vec<&(PathBuf, String)> = self
            .results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .collect();
        if failures.is_empty() {
            return;
        }

        let mut output = format!(
            "E2E tests: {} passed; {} failed;\n\nfailures:\n",
            self.paths.len() - failures.len(),
            failures.len()
        );
        for (path, reason) in failures {
            output.push_str(&format!("{}: {}\n", path.display(), reason));
        }

        panic!("{}", output);
    }

    /// Компилированный конвейер и интерпретатор должны напечатать ожидаемое
    fn run_testfile(path: &Path) -> Result<(), String> {
        let source = fs::read_to_string(path).map_err(|e| format!("cannot read: {}", e))?;
        let expected = expected_output(&source)?;

        let compiled = pl0::run(&source).map_err(|e| format!("pipeline failed: {}", e))?;
        if compiled != expected {
            return Err(format!("pipeline printed {:?}, expected {:?}", compiled, expected));
        }

        let interpreted = pl0::interpret(&source).map_err(|e| format!("interpreter failed: {}", e))?;
        if interpreted != compiled {
            return Err(format!("interpreter printed {:?}, pipeline printed {:?}", interpreted, compiled));
        }

        Ok(())
    }
}

fn expected_output(source: &str) -> Result<Vec<i64>, String> {
    let header = source
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(EXPECT_PREFIX))
        .ok_or_else(|| format!("first line must start with '{}'", EXPECT_PREFIX))?;

    header
        .split_whitespace()
        .map(|value| value.parse::<i64>().map_err(|e| format!("bad expected value '{}': {}", value, e)))
        .collect()
}

#[test]
fn stages_compose_through_text() {
    let assembly = pl0::compile("var x; begin x := 6 * 7; !x end.").unwrap();
    assert!(assembly.starts_with("\tJMP main\n"));

    let code = pl0::assemble(&assembly).unwrap();
    let mut machine = pl0_vm::Machine::new(code);
    assert_eq!(machine.run().unwrap(), vec![42]);
}

#[test]
fn undefined_name_fails_at_any_depth() {
    let sources = [
        "!nope.",
        "procedure p; !nope; call p.",
        "procedure p; procedure q; begin !1; x := 2 end; call q; call p.",
    ];
    for source in sources {
        assert!(
            matches!(pl0::compile(source), Err(CompileError::UndefinedName { .. })),
            "compiled: {}",
            source
        );
        assert!(
            matches!(pl0::interpret(source), Err(CompileError::UndefinedName { .. })),
            "interpreted: {}",
            source
        );
    }
}

#[test]
fn illegal_character_is_skipped() {
    let source = "begin !1 @+ 2; !3 end.";
    let mut lexer = Lexer::new(source);
    let kinds: Vec<TokenKind> = lexer.by_ref().map(|token| token.kind).collect();

    assert_eq!(lexer.diagnostics().len(), 1);
    assert_eq!(lexer.diagnostics()[0].character, '@');
    assert!(kinds.contains(&TokenKind::Number(3)));
    assert_eq!(kinds.last(), Some(&TokenKind::Eof));

    assert_eq!(pl0::run(source).unwrap(), vec![3, 3]);
}

#[test]
fn syntax_error_reports_position() {
    let error = pl0::compile("var x;\nx := ;.").unwrap_err();
    match error {
        CompileError::SyntaxError { span, .. } => assert_eq!((span.line, span.column), (2, 6)),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn leading_minus_negates_the_whole_expression() {
    assert_eq!(pl0::run("!-2 + 5.").unwrap(), vec![-7]);

    let source = "var x; begin x := 3; !-x - 1 end.";
    assert_eq!(pl0::run(source).unwrap(), vec![-2]);
    assert_eq!(pl0::interpret(source).unwrap(), vec![-2]);
}

#[test]
fn oversized_literal_is_a_syntax_error() {
    let error = pl0::run("!99999999999999999999.").unwrap_err();
    match error {
        CompileError::SyntaxError { span, expected, .. } => {
            assert_eq!((span.line, span.column), (1, 2));
            assert_eq!(expected, "number within i64 range");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn runtime_errors_surface_through_the_pipeline() {
    let error = pl0::run("var z; !1 / z.").unwrap_err();
    assert!(matches!(
        error,
        CompileError::Runtime { source: pl0_vm::RuntimeError::DivisionByZero { .. } }
    ));
    assert!(matches!(pl0::interpret("var z; !1 / z."), Err(CompileError::Arithmetic { .. })));
}
