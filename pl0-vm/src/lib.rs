pub mod error;
pub mod logging;
pub mod machine;
pub mod opcodes;
pub mod program;

pub use error::{ArithmeticFault, RuntimeError};
pub use machine::Machine;
pub use opcodes::Opcode;
