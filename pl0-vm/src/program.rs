use std::fs;
use std::path::Path;

use crate::error::RuntimeError;
use crate::opcodes::Opcode;

/// Разбор плоской программы: числа через запятую и/или пробелы,
/// допускаются квадратные скобки вокруг: `[16, 5, 0]`
pub fn parse_flat(text: &str) -> Result<Vec<i64>, RuntimeError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    inner
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<i64>().map_err(|_| RuntimeError::InvalidProgram {
                token: token.to_string(),
            })
        })
        .collect()
}

pub fn format_flat(program: &[i64]) -> String {
    let cells: Vec<String> = program.iter().map(|cell| cell.to_string()).collect();
    format!("[{}]", cells.join(", "))
}

/// Загрузка плоской программы из файла
pub fn load_program(path: &Path) -> Result<Vec<i64>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_flat(&text)?)
}

/// Линейный листинг: `addr: MNEMONIC operand`.
/// Ячейки, которые не являются опкодами, печатаются как данные.
pub fn disassemble(program: &[i64]) -> Vec<String> {
    let mut listing = Vec::new();
    let mut address = 0;

    while address < program.len() {
        let cell = program[address];

        match Opcode::from_code(cell) {
            Some(opcode) if opcode.operand_count() == 1 => match program.get(address + 1) {
                Some(operand) => {
                    listing.push(format!("{:04}: {} {}", address, opcode, operand));
                    address += 2;
                }
                None => {
                    listing.push(format!("{:04}: .data {}", address, cell));
                    address += 1;
                }
            },
            Some(opcode) => {
                listing.push(format!("{:04}: {}", address, opcode));
                address += 1;
            }
            None => {
                listing.push(format!("{:04}: .data {}", address, cell));
                address += 1;
            }
        }
    }

    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bracketed_and_bare_lists() {
        assert_eq!(parse_flat("[16, 5, -1]").unwrap(), vec![16, 5, -1]);
        assert_eq!(parse_flat("16 5\n-1\n").unwrap(), vec![16, 5, -1]);
        assert_eq!(parse_flat("[]").unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            parse_flat("[1, main]"),
            Err(RuntimeError::InvalidProgram { token: "main".to_string() })
        );
    }

    #[test]
    fn formats_like_a_list() {
        assert_eq!(format_flat(&[16, 3, 1]), "[16, 3, 1]");
        assert_eq!(parse_flat(&format_flat(&[10, -4, 50])).unwrap(), vec![10, -4, 50]);
    }

    #[test]
    fn disassembles_operands_and_data() {
        let program = vec![16, 3, 0, 10, -1, 45, 99];
        assert_eq!(
            disassemble(&program),
            vec![
                "0000: JMP 3",
                "0002: NOP",
                "0003: PUSH -1",
                "0005: ADD",
                "0006: .data 99",
            ]
        );
    }
}
