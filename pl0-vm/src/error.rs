use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime error: stack underflow at address {address}")]
    StackUnderflow { address: usize },

    #[error("Runtime error: division by zero at address {address}")]
    DivisionByZero { address: usize },

    #[error("Runtime error: arithmetic overflow at address {address}")]
    Overflow { address: usize },

    #[error("Runtime error: address {target} out of range (program size {size}) at address {address}")]
    AddressOutOfRange { address: usize, target: i64, size: usize },

    #[error("Runtime error: invalid opcode {value} at address {address}")]
    InvalidOpcode { address: usize, value: i64 },

    #[error("Invalid program text: '{token}' is not an integer")]
    InvalidProgram { token: String },
}

/// Ошибка арифметики без привязки к адресу.
/// Её же использует интерпретатор дерева, у которого адресов нет.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticFault {
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

impl ArithmeticFault {
    pub fn at(self, address: usize) -> RuntimeError {
        match self {
            Self::DivisionByZero => RuntimeError::DivisionByZero { address },
            Self::Overflow => RuntimeError::Overflow { address },
        }
    }
}
