use std::error::Error;
use std::io::Write;

use tracing::{debug, info, trace};

use crate::error::{ArithmeticFault, RuntimeError};
use crate::opcodes::Opcode;

/// Значение указателя инструкций после HALT
pub const HALTED: i64 = -1;

pub struct Machine {
    // Указатель инструкций, отрицательный = остановлена
    pub instruction_pointer: i64,
    // Код и переменные лежат в одном массиве
    pub memory: Vec<i64>,
    // Общий стек для значений и адресов возврата
    pub stack: Vec<i64>,
    // Сколько инструкций выполнено
    pub cycles: u64,
    // Адрес инструкции, которая сейчас выполняется
    current: usize,
}

impl Machine {
    pub fn new(program: Vec<i64>) -> Self {
        Machine {
            instruction_pointer: 0,
            memory: program,
            stack: Vec::new(),
            cycles: 0,
            current: 0,
        }
    }

    /// Остановка явная (HALT) или неявная (вышли за конец программы)
    pub fn is_halted(&self) -> bool {
        self.instruction_pointer < 0 || self.instruction_pointer as usize >= self.memory.len()
    }

    /// Выполняет программу до остановки и возвращает всё напечатанное
    pub fn run(&mut self) -> Result<Vec<i64>, RuntimeError> {
        let mut output = Vec::new();

        while !self.is_halted() {
            if let Some(value) = self.step()? {
                output.push(value);
            }
        }

        debug!(cycles = self.cycles, "machine halted");
        Ok(output)
    }

    /// Выполняет программу до остановки, печатая вывод по мере появления
    pub fn run_streaming(&mut self, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
        while !self.is_halted() {
            if let Some(value) = self.step()? {
                writeln!(out, "{}", value)?;
            }
        }

        info!(cycles = self.cycles, "execution finished");
        Ok(())
    }

    /// Один цикл: fetch + execute.
    /// Возвращает значение, если инструкция что-то напечатала.
    pub fn step(&mut self) -> Result<Option<i64>, RuntimeError> {
        if self.is_halted() {
            return Ok(None);
        }

        let opcode = self.fetch()?;
        let printed = self.execute(opcode)?;
        self.cycles += 1;

        Ok(printed)
    }

    fn fetch(&mut self) -> Result<Opcode, RuntimeError> {
        self.current = self.instruction_pointer as usize;
        let value = self.memory[self.current];

        let opcode = Opcode::from_code(value).ok_or(RuntimeError::InvalidOpcode {
            address: self.current,
            value,
        })?;

        trace!(ip = self.current, %opcode, stack = ?self.stack, "fetch");
        Ok(opcode)
    }

    fn execute(&mut self, opcode: Opcode) -> Result<Option<i64>, RuntimeError> {
        match opcode {
            Opcode::Nop => self.op_nop(),
            Opcode::Halt => self.op_halt(),
            Opcode::Load => self.op_load()?,
            Opcode::Save => self.op_save()?,
            Opcode::Push => self.op_push()?,
            Opcode::Pop => self.op_pop()?,
            Opcode::Dup => self.op_dup()?,
            Opcode::Jmp => self.op_jmp()?,
            Opcode::Call => self.op_call()?,
            Opcode::Ret => self.op_ret()?,
            Opcode::Jlt | Opcode::Jlte | Opcode::Je
            | Opcode::Jne | Opcode::Jgte | Opcode::Jgt => self.op_branch(opcode)?,
            Opcode::CmpLt | Opcode::CmpLte | Opcode::CmpE
            | Opcode::CmpNe | Opcode::CmpGte | Opcode::CmpGt => self.op_compare(opcode)?,
            Opcode::Mul | Opcode::Div | Opcode::Add | Opcode::Sub => self.op_arithmetic(opcode)?,
            Opcode::Print => return self.op_print().map(Some),
            Opcode::Debug => self.op_debug(),
        }
        Ok(None)
    }

    // === ИНСТРУКЦИИ === //

    /// NOP - ничего не делает
    fn op_nop(&mut self) {
        self.advance(0);
    }

    /// HALT - остановка машины
    fn op_halt(&mut self) {
        self.instruction_pointer = HALTED;
    }

    /// LOAD addr - push cell[addr]
    fn op_load(&mut self) -> Result<(), RuntimeError> {
        let address = self.address_operand()?;
        self.stack.push(self.memory[address]);
        self.advance(1);
        Ok(())
    }

    /// SAVE addr - pop, store into cell[addr]
    fn op_save(&mut self) -> Result<(), RuntimeError> {
        let address = self.address_operand()?;
        self.memory[address] = self.pop()?;
        self.advance(1);
        Ok(())
    }

    /// PUSH lit - push literal
    fn op_push(&mut self) -> Result<(), RuntimeError> {
        let literal = self.operand()?;
        self.stack.push(literal);
        self.advance(1);
        Ok(())
    }

    /// POP - discard top of stack
    fn op_pop(&mut self) -> Result<(), RuntimeError> {
        self.pop()?;
        self.advance(0);
        Ok(())
    }

    /// DUP - duplicate top of stack
    fn op_dup(&mut self) -> Result<(), RuntimeError> {
        let top = self.peek()?;
        self.stack.push(top);
        self.advance(0);
        Ok(())
    }

    /// JMP addr - unconditional jump
    fn op_jmp(&mut self) -> Result<(), RuntimeError> {
        let address = self.address_operand()?;
        self.instruction_pointer = address as i64;
        Ok(())
    }

    /// CALL addr - push return address (ip + 2), jump to addr
    fn op_call(&mut self) -> Result<(), RuntimeError> {
        let address = self.address_operand()?;
        self.stack.push(self.current as i64 + 2);
        self.instruction_pointer = address as i64;
        Ok(())
    }

    /// RET - jump to popped return address
    fn op_ret(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        let address = self.check_address(value)?;
        self.instruction_pointer = address as i64;
        Ok(())
    }

    /// J{LT,LTE,E,NE,GTE,GT} addr - pop, jump if the sign matches
    fn op_branch(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let address = self.address_operand()?;
        let value = self.pop()?;

        if branch_taken(opcode, value) {
            self.instruction_pointer = address as i64;
        } else {
            self.advance(1);
        }
        Ok(())
    }

    /// CMP{LT,LTE,E,NE,GTE,GT} - pop b, pop a, push a <rel> b as 1/0
    fn op_compare(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(compare(opcode, a, b) as i64);
        self.advance(0);
        Ok(())
    }

    /// MUL, DIV, ADD, SUB - pop b, pop a, push a <op> b
    fn op_arithmetic(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = arithmetic(opcode, a, b).map_err(|fault| fault.at(self.current))?;
        self.stack.push(result);
        self.advance(0);
        Ok(())
    }

    /// PRINT - вывести вершину стека, не снимая её
    fn op_print(&mut self) -> Result<i64, RuntimeError> {
        let top = self.peek()?;
        self.advance(0);
        Ok(top)
    }

    /// DEBUG - сбросить состояние машины в лог
    fn op_debug(&mut self) {
        debug!("{}", self.dump());
        self.advance(0);
    }

    // Вспомогательные методы

    /// Переход к следующей инструкции с учётом операндов
    fn advance(&mut self, operands: usize) {
        self.instruction_pointer = (self.current + 1 + operands) as i64;
    }

    fn operand(&self) -> Result<i64, RuntimeError> {
        let index = self.current + 1;
        self.memory.get(index).copied().ok_or(RuntimeError::AddressOutOfRange {
            address: self.current,
            target: index as i64,
            size: self.memory.len(),
        })
    }

    fn address_operand(&self) -> Result<usize, RuntimeError> {
        let value = self.operand()?;
        self.check_address(value)
    }

    fn check_address(&self, value: i64) -> Result<usize, RuntimeError> {
        if value < 0 || value as usize >= self.memory.len() {
            return Err(RuntimeError::AddressOutOfRange {
                address: self.current,
                target: value,
                size: self.memory.len(),
            });
        }
        Ok(value as usize)
    }

    fn pop(&mut self) -> Result<i64, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow { address: self.current })
    }

    fn peek(&self) -> Result<i64, RuntimeError> {
        self.stack.last().copied().ok_or(RuntimeError::StackUnderflow { address: self.current })
    }

    /// Состояние машины для отладки
    pub fn dump(&self) -> String {
        format!(
            "-- Machine State --\nMemory: {:?}\nStack: {:?}\nOffset: {}\nCycles: {}",
            self.memory, self.stack, self.instruction_pointer, self.cycles
        )
    }
}

/// Проверка условного перехода по знаку значения (результата вычитания)
pub fn branch_taken(opcode: Opcode, value: i64) -> bool {
    match opcode {
        Opcode::Jlt => value < 0,
        Opcode::Jlte => value <= 0,
        Opcode::Je => value == 0,
        Opcode::Jne => value != 0,
        Opcode::Jgte => value >= 0,
        Opcode::Jgt => value > 0,
        _ => false,
    }
}

pub fn compare(opcode: Opcode, a: i64, b: i64) -> bool {
    match opcode {
        Opcode::CmpLt => a < b,
        Opcode::CmpLte => a <= b,
        Opcode::CmpE => a == b,
        Opcode::CmpNe => a != b,
        Opcode::CmpGte => a >= b,
        Opcode::CmpGt => a > b,
        _ => false,
    }
}

/// a <op> b с проверкой переполнения; деление округляет к нулю
pub fn arithmetic(opcode: Opcode, a: i64, b: i64) -> Result<i64, ArithmeticFault> {
    let result = match opcode {
        Opcode::Mul => a.checked_mul(b),
        Opcode::Div => {
            if b == 0 {
                return Err(ArithmeticFault::DivisionByZero);
            }
            a.checked_div(b)
        }
        Opcode::Add => a.checked_add(b),
        Opcode::Sub => a.checked_sub(b),
        _ => None,
    };
    result.ok_or(ArithmeticFault::Overflow)
}
