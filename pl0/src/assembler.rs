use std::collections::HashMap;

use tracing::debug;

use pl0_vm::Opcode;

use crate::error::CompileError;

/// Результат сборки: плоская программа и таблица меток
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub code: Vec<i64>,
    pub labels: HashMap<String, usize>,
}

/// Ячейка после первого прохода: готовое число или ссылка на метку
enum Cell<'a> {
    Value(i64),
    Label { name: &'a str, line: usize },
}

/// Два прохода: сначала собираем метки и ячейки, потом подставляем адреса меток
pub fn assemble(text: &str) -> Result<Assembled, CompileError> {
    let mut cells: Vec<Cell> = Vec::new();
    let mut labels: HashMap<String, usize> = HashMap::new();

    // Первый проход
    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let mut line = strip_comment(raw_line).trim();

        if line.is_empty() {
            continue;
        }

        // label: [tokens...]
        if let Some((name, rest)) = line.split_once(':') {
            let name = name.trim();
            if !is_label(name) {
                return Err(CompileError::InvalidToken { token: name.to_string(), line: line_number });
            }
            if labels.insert(name.to_string(), cells.len()).is_some() {
                return Err(CompileError::DuplicateLabel { label: name.to_string(), line: line_number });
            }
            line = rest.trim();
        }

        for token in line.split_whitespace() {
            let cell = if let Ok(value) = token.parse::<i64>() {
                Cell::Value(value)
            } else if let Some(opcode) = Opcode::from_mnemonic(token) {
                Cell::Value(opcode.code())
            } else if is_label(token) {
                Cell::Label { name: token, line: line_number }
            } else {
                return Err(CompileError::InvalidToken { token: token.to_string(), line: line_number });
            };
            cells.push(cell);
        }
    }

    // Второй проход - подставляем адреса меток
    let code = cells
        .into_iter()
        .map(|cell| match cell {
            Cell::Value(value) => Ok(value),
            Cell::Label { name, line } => labels
                .get(name)
                .map(|&offset| offset as i64)
                .ok_or_else(|| CompileError::UndefinedLabel { label: name.to_string(), line }),
        })
        .collect::<Result<Vec<i64>, CompileError>>()?;

    debug!(cells = code.len(), labels = labels.len(), "assembled");
    Ok(Assembled { code, labels })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(position) => &line[..position],
        None => line,
    }
}

fn is_label(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl0_vm::program::disassemble;

    #[test]
    fn labels_resolve_to_offsets() {
        let text = "\
# comment line
\tJMP main
counter: 0
main:
\tPUSH -1   # inline comment
\tSAVE counter
\tHALT
";
        let assembled = assemble(text).unwrap();
        assert_eq!(assembled.code, vec![16, 3, 0, 10, -1, 7, 2, 1]);
        assert_eq!(assembled.labels["counter"], 2);
        assert_eq!(assembled.labels["main"], 3);
    }

    #[test]
    fn label_and_value_on_separate_lines() {
        let assembled = assemble("x:\n    0\ny:\n    7\n\tLOAD y\n").unwrap();
        assert_eq!(assembled.code, vec![0, 7, 6, 1]);
    }

    #[test]
    fn forward_and_backward_references() {
        let text = "top:\n\tJMP bottom\n\tJMP top\nbottom:\n\tHALT\n";
        let assembled = assemble(text).unwrap();
        assert_eq!(assembled.code, vec![16, 4, 16, 0, 1]);
    }

    #[test]
    fn jump_targets_match_recorded_offsets() {
        let text = "\tJMP main\nf:\n\tPUSH 1\n\tRET\nmain:\n\tCALL f\n\tJE main\n\tHALT\n";
        let assembled = assemble(text).unwrap();

        let listing = disassemble(&assembled.code);
        let targets: Vec<String> = listing
            .iter()
            .filter_map(|line| {
                let mut parts = line.split_whitespace().skip(1);
                let mnemonic = parts.next()?;
                let operand = parts.next()?;
                Opcode::from_mnemonic(mnemonic)?.takes_address().then(|| operand.to_string())
            })
            .collect();

        let main = assembled.labels["main"].to_string();
        let f = assembled.labels["f"].to_string();
        assert_eq!(targets, vec![main.clone(), f, main]);
    }

    #[test]
    fn undefined_label_is_fatal() {
        let error = assemble("\tJMP nowhere\n").unwrap_err();
        assert!(matches!(
            error,
            CompileError::UndefinedLabel { ref label, line: 1 } if label == "nowhere"
        ));
    }

    #[test]
    fn duplicate_label_is_fatal() {
        let error = assemble("a:\n\tNOP\na:\n").unwrap_err();
        assert!(matches!(error, CompileError::DuplicateLabel { line: 3, .. }));
    }

    #[test]
    fn garbage_token_is_fatal() {
        let error = assemble("\tPUSH 1.5\n").unwrap_err();
        assert!(matches!(error, CompileError::InvalidToken { ref token, .. } if token == "1.5"));
    }
}
