use std::fmt;

/// Инструкции стековой машины.
/// Числовые значения фиксированы - это и есть байткод плоской программы.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Halt,
    // Память
    Load,
    Save,
    // Стек
    Push,
    Pop,
    Dup,
    // Переходы и вызовы
    Jmp,
    Call,
    Ret,
    // Условные переходы по знаку значения на вершине стека
    Jlt,
    Jlte,
    Je,
    Jne,
    Jgte,
    Jgt,
    // Сравнения: кладут 1 или 0
    CmpLt,
    CmpLte,
    CmpE,
    CmpNe,
    CmpGte,
    CmpGt,
    // Арифметика
    Mul,
    Div,
    Add,
    Sub,
    // Ввод-вывод
    Print,
    Debug,
}

impl Opcode {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Nop, Self::Halt,
            Self::Load, Self::Save,
            Self::Push, Self::Pop, Self::Dup,
            Self::Jmp, Self::Call, Self::Ret,
            Self::Jlt, Self::Jlte, Self::Je, Self::Jne, Self::Jgte, Self::Jgt,
            Self::CmpLt, Self::CmpLte, Self::CmpE, Self::CmpNe, Self::CmpGte, Self::CmpGt,
            Self::Mul, Self::Div, Self::Add, Self::Sub,
            Self::Print, Self::Debug,
        ]
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Nop => 0,
            Self::Halt => 1,
            Self::Load => 6,
            Self::Save => 7,
            Self::Push => 10,
            Self::Pop => 11,
            Self::Dup => 12,
            Self::Jmp => 16,
            Self::Call => 17,
            Self::Ret => 18,
            Self::Jlt => 20,
            Self::Jlte => 21,
            Self::Je => 22,
            Self::Jne => 23,
            Self::Jgte => 24,
            Self::Jgt => 25,
            Self::CmpLt => 30,
            Self::CmpLte => 31,
            Self::CmpE => 32,
            Self::CmpNe => 33,
            Self::CmpGte => 34,
            Self::CmpGt => 35,
            Self::Mul => 43,
            Self::Div => 44,
            Self::Add => 45,
            Self::Sub => 46,
            Self::Print => 50,
            Self::Debug => 51,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Halt => "HALT",
            Self::Load => "LOAD",
            Self::Save => "SAVE",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Jmp => "JMP",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Jlt => "JLT",
            Self::Jlte => "JLTE",
            Self::Je => "JE",
            Self::Jne => "JNE",
            Self::Jgte => "JGTE",
            Self::Jgt => "JGT",
            Self::CmpLt => "CMPLT",
            Self::CmpLte => "CMPLTE",
            Self::CmpE => "CMPE",
            Self::CmpNe => "CMPNE",
            Self::CmpGte => "CMPGTE",
            Self::CmpGt => "CMPGT",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Print => "PRINT",
            Self::Debug => "DEBUG",
        }
    }

    /// Сколько ячеек-операндов идёт сразу за опкодом
    pub fn operand_count(&self) -> usize {
        match self {
            Self::Load | Self::Save | Self::Push
            | Self::Jmp | Self::Call
            | Self::Jlt | Self::Jlte | Self::Je | Self::Jne | Self::Jgte | Self::Jgt => 1,
            _ => 0,
        }
    }

    /// Операнд - адрес (метка), а не литерал
    pub fn takes_address(&self) -> bool {
        self.operand_count() == 1 && *self != Self::Push
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::all().into_iter().find(|op| op.code() == code)
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|op| op.mnemonic() == name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
