//! Instruction dispatch loop

use microasm_bytecode::{BytecodeError, Instruction, Opcode, Operand, WORD_SIZE, reg};
use std::cmp::Ordering;
use tracing::debug;

use crate::console::Port;
use crate::error::{Fault, FaultKind};
use crate::machine::Machine;
use crate::native::NativeCall;

const RSP: usize = reg::RSP as usize;
const RBP: usize = reg::RBP as usize;

/// What the loop does after an instruction
enum Flow {
    Continue,
    Halt,
}

type StepResult = Result<Flow, FaultKind>;

fn operand_kind(op: Operand) -> &'static str {
    match op {
        Operand::Register(_) => "register",
        Operand::Immediate(_) => "immediate",
        Operand::Label(_) => "label",
        Operand::Data(_) => "data address",
    }
}

impl Machine {
    /// Execute from the current instruction pointer until HLT, the end of
    /// the code segment, or a fault
    pub(crate) fn run(&mut self) -> Result<(), Fault> {
        while self.ip < self.code.len() {
            let at = self.ip;
            let (inst, next) = Instruction::decode(&self.code, at).map_err(|e| Fault {
                offset: at,
                opcode: Opcode::from_u8(self.code[at]),
                kind: e.into(),
            })?;

            if self.debug {
                debug!(offset = at, "{}", inst);
            }

            self.ip = next;
            match self.step(&inst) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    if self.debug {
                        debug!(offset = at, "HLT encountered");
                    }
                    return Ok(());
                }
                Err(kind) => {
                    return Err(Fault {
                        offset: at,
                        opcode: Some(inst.opcode),
                        kind,
                    });
                }
            }
        }
        Ok(())
    }

    fn step(&mut self, inst: &Instruction) -> StepResult {
        let ops = inst.operands();
        match inst.opcode {
            // Arithmetic
            Opcode::Mov => self.binary(ops, |_, src| Ok(src)),
            Opcode::Add => self.binary(ops, |dst, src| Ok(dst.wrapping_add(src))),
            Opcode::Sub => self.binary(ops, |dst, src| Ok(dst.wrapping_sub(src))),
            Opcode::Mul => self.binary(ops, |dst, src| Ok(dst.wrapping_mul(src))),
            Opcode::Div => self.binary(ops, |dst, src| {
                if src == 0 {
                    return Err(FaultKind::DivisionByZero);
                }
                Ok(dst.wrapping_div(src))
            }),
            Opcode::Inc => self.unary(ops[0], |v| v.wrapping_add(1)),

            // Bitwise
            Opcode::And => self.binary(ops, |dst, src| Ok(dst & src)),
            Opcode::Or => self.binary(ops, |dst, src| Ok(dst | src)),
            Opcode::Xor => self.binary(ops, |dst, src| Ok(dst ^ src)),
            Opcode::Not => self.unary(ops[0], |v| !v),
            Opcode::Shl => self.binary(ops, |dst, n| Ok(dst.wrapping_shl(n as u32))),
            Opcode::Shr => self.binary(ops, |dst, n| Ok(dst.wrapping_shr(n as u32))),

            // Flow control
            Opcode::Jmp => {
                self.ip = self.target(ops[0])?;
                Ok(Flow::Continue)
            }
            Opcode::Cmp => {
                let a = self.value(ops[0])?;
                let b = self.value(ops[1])?;
                self.set_flags(a.cmp(&b));
                Ok(Flow::Continue)
            }
            Opcode::Je | Opcode::Jne | Opcode::Jl | Opcode::Jg | Opcode::Jle | Opcode::Jge => {
                let target = self.target(ops[0])?;
                let (zf, sf) = (self.zero_flag, self.sign_flag);
                let taken = match inst.opcode {
                    Opcode::Je => zf,
                    Opcode::Jne => !zf,
                    Opcode::Jl => sf,
                    Opcode::Jg => !zf && !sf,
                    Opcode::Jle => zf || sf,
                    _ => zf || !sf,
                };
                if taken {
                    self.ip = target;
                }
                Ok(Flow::Continue)
            }
            Opcode::Call => {
                let target = self.target(ops[0])?;
                // Return offset is the byte after the CALL operands
                self.push(self.ip as i32)?;
                self.ip = target;
                Ok(Flow::Continue)
            }
            Opcode::Ret => {
                let ret = self.pop()?;
                self.ip = self.target(Operand::Label(ret))?;
                Ok(Flow::Continue)
            }

            // Stack
            Opcode::Push => {
                let v = self.value(ops[0])?;
                self.push(v)?;
                Ok(Flow::Continue)
            }
            Opcode::Pop => {
                let dst = self.reg_index(ops[0])?;
                self.registers[dst] = self.pop()?;
                Ok(Flow::Continue)
            }
            Opcode::Enter => {
                let frame = self.value(ops[0])?;
                self.push(self.registers[RBP])?;
                self.registers[RBP] = self.registers[RSP];
                self.registers[RSP] = self.registers[RSP].wrapping_sub(frame);
                Ok(Flow::Continue)
            }
            Opcode::Leave => {
                self.registers[RSP] = self.registers[RBP];
                self.registers[RBP] = self.pop()?;
                Ok(Flow::Continue)
            }

            // I/O
            Opcode::Out => {
                let port = self.port(ops[0])?;
                if let Operand::Data(_) = ops[1] {
                    let addr = self.value(ops[1])?;
                    let text = self.ram.read_cstr(addr as i64)?;
                    self.console.write(port, text)?;
                } else {
                    let v = self.value(ops[1])?;
                    self.console.write(port, v.to_string().as_bytes())?;
                }
                Ok(Flow::Continue)
            }
            Opcode::Cout => {
                let port = self.port(ops[0])?;
                let v = self.value(ops[1])?;
                self.console.write(port, &[v as u8])?;
                Ok(Flow::Continue)
            }
            Opcode::OutStr => {
                let port = self.port(ops[0])?;
                let addr = self.value(ops[1])?;
                let len = self.length(ops[2])?;
                let bytes = self.ram.slice(addr as i64, len)?;
                self.console.write(port, bytes)?;
                Ok(Flow::Continue)
            }
            Opcode::OutChar => {
                let port = self.port(ops[0])?;
                let addr = self.value(ops[1])?;
                let byte = self.ram.read_byte(addr as i64)?;
                self.console.write(port, &[byte])?;
                Ok(Flow::Continue)
            }

            // Program control
            Opcode::Hlt => Ok(Flow::Halt),
            Opcode::Argc => {
                let dst = self.reg_index(ops[0])?;
                self.registers[dst] = self.args.len() as i32;
                Ok(Flow::Continue)
            }
            Opcode::GetArg => {
                let dst = self.reg_index(ops[0])?;
                let index = self.value(ops[1])?;
                let addr = usize::try_from(index)
                    .ok()
                    .and_then(|i| self.args.get(i))
                    .copied()
                    .ok_or(FaultKind::ArgumentIndex(index))?;
                self.registers[dst] = addr;
                Ok(Flow::Continue)
            }

            // Memory addressing
            Opcode::MovAddr => {
                let dst = self.reg_index(ops[0])?;
                let addr = self.effective_address(ops[1], ops[2])?;
                self.registers[dst] = self.ram.read_word(addr)?;
                Ok(Flow::Continue)
            }
            Opcode::MovTo => {
                let addr = self.effective_address(ops[0], ops[1])?;
                let v = self.value(ops[2])?;
                self.ram.write_word(addr, v)?;
                Ok(Flow::Continue)
            }

            // Memory blocks
            Opcode::Copy => {
                let dst = self.value(ops[0])?;
                let src = self.value(ops[1])?;
                let len = self.length(ops[2])?;
                self.ram.copy_within(src as i64, dst as i64, len)?;
                Ok(Flow::Continue)
            }
            Opcode::Fill => {
                let dst = self.value(ops[0])?;
                let byte = (self.value(ops[1])? & 0xFF) as u8;
                let len = self.length(ops[2])?;
                self.ram.slice_mut(dst as i64, len)?.fill(byte);
                Ok(Flow::Continue)
            }
            Opcode::CmpMem => {
                let a = self.value(ops[0])?;
                let b = self.value(ops[1])?;
                let len = self.length(ops[2])?;
                let ordering = self
                    .ram
                    .slice(a as i64, len)?
                    .cmp(self.ram.slice(b as i64, len)?);
                self.set_flags(ordering);
                Ok(Flow::Continue)
            }

            // Host interface
            Opcode::Mni => {
                let name = self.native_name(ops[0])?;
                let f = self
                    .natives
                    .get(&name)
                    .ok_or_else(|| FaultKind::UnknownNative(name.clone()))?;
                if self.debug {
                    debug!(native = %name, "Native call");
                }
                let mut call = NativeCall {
                    machine: self,
                    args: [ops[1], ops[2]],
                };
                f(&mut call).map_err(|message| FaultKind::Native { name, message })?;
                Ok(Flow::Continue)
            }
            Opcode::In => {
                let addr = self.value(ops[0])?;
                let line = self.console.read_line()?.unwrap_or_default();
                let slot = self.ram.slice_mut(addr as i64, line.len() + 1)?;
                slot[..line.len()].copy_from_slice(line.as_bytes());
                slot[line.len()] = 0;
                Ok(Flow::Continue)
            }

            // Heap
            Opcode::Malloc => {
                let dst = self.reg_index(ops[0])?;
                let size = self.value(ops[1])?;
                let size = usize::try_from(size)
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or(FaultKind::AllocationSize(size))?;
                // Blocks end below the data base, so addresses fit in i32
                let addr = self.heap.allocate(size).map_or(0, |a| a as i32);
                self.registers[dst] = addr;
                self.set_flags(addr.cmp(&0));
                Ok(Flow::Continue)
            }
            Opcode::Free => {
                let dst = self.reg_index(ops[0])?;
                let ptr = self.value(ops[1])?;
                if !usize::try_from(ptr).is_ok_and(|p| self.heap.free(p)) {
                    return Err(FaultKind::InvalidFree(ptr));
                }
                self.registers[dst] = 1;
                self.set_flags(Ordering::Greater);
                Ok(Flow::Continue)
            }
            Opcode::Movb => {
                let byte = match ops[1] {
                    Operand::Data(_) => self.ram.read_byte(self.value(ops[1])? as i64)?,
                    other => (self.value(other)? & 0xFF) as u8,
                };
                match ops[0] {
                    Operand::Data(_) => {
                        let addr = self.value(ops[0])?;
                        self.ram.write_byte(addr as i64, byte)?;
                    }
                    other => {
                        let dst = self.reg_index(other)?;
                        self.registers[dst] = byte as i32;
                    }
                }
                Ok(Flow::Continue)
            }

            // Directives never survive decoding
            Opcode::Db | Opcode::Lbl => Err(FaultKind::Decode(BytecodeError::PseudoInstruction {
                opcode: inst.opcode,
                offset: self.ip,
            })),
        }
    }

    /// `dst = f(dst, src)` where `dst` must be a register
    fn binary(
        &mut self,
        ops: &[Operand],
        f: impl FnOnce(i32, i32) -> Result<i32, FaultKind>,
    ) -> StepResult {
        let dst = self.reg_index(ops[0])?;
        let src = self.value(ops[1])?;
        self.registers[dst] = f(self.registers[dst], src)?;
        Ok(Flow::Continue)
    }

    fn unary(&mut self, op: Operand, f: impl FnOnce(i32) -> i32) -> StepResult {
        let dst = self.reg_index(op)?;
        self.registers[dst] = f(self.registers[dst]);
        Ok(Flow::Continue)
    }

    /// Resolve an operand to its integer value
    pub(crate) fn value(&self, op: Operand) -> Result<i32, FaultKind> {
        match op {
            Operand::Register(_) => Ok(self.registers[self.reg_index(op)?]),
            Operand::Immediate(v) | Operand::Label(v) => Ok(v),
            Operand::Data(offset) => {
                let addr = self.data_base as i64 + offset as i64;
                // Validates the address; the value is the address itself
                self.ram.read_byte(addr)?;
                Ok(addr as i32)
            }
        }
    }

    pub(crate) fn reg_index(&self, op: Operand) -> Result<usize, FaultKind> {
        match op {
            Operand::Register(idx) => usize::try_from(idx)
                .ok()
                .filter(|&i| i < self.registers.len())
                .ok_or(FaultKind::InvalidRegister(idx)),
            other => Err(FaultKind::InvalidOperand {
                expected: "register",
                found: operand_kind(other),
            }),
        }
    }

    /// Branch target; the end of the code segment is a valid target and halts
    fn target(&self, op: Operand) -> Result<usize, FaultKind> {
        match op {
            Operand::Label(v) | Operand::Immediate(v) => usize::try_from(v)
                .ok()
                .filter(|&t| t <= self.code.len())
                .ok_or(FaultKind::JumpOutOfRange(v)),
            other => Err(FaultKind::InvalidOperand {
                expected: "label or immediate",
                found: operand_kind(other),
            }),
        }
    }

    fn port(&self, op: Operand) -> Result<Port, FaultKind> {
        let n = self.value(op)?;
        Port::from_number(n).ok_or(FaultKind::InvalidPort(n))
    }

    fn length(&self, op: Operand) -> Result<usize, FaultKind> {
        let n = self.value(op)?;
        usize::try_from(n).map_err(|_| FaultKind::NegativeLength(n))
    }

    fn effective_address(&self, base: Operand, offset: Operand) -> Result<i64, FaultKind> {
        Ok(self.value(base)? as i64 + self.value(offset)? as i64)
    }

    fn set_flags(&mut self, ordering: Ordering) {
        self.zero_flag = ordering == Ordering::Equal;
        self.sign_flag = ordering == Ordering::Less;
    }

    fn push(&mut self, value: i32) -> Result<(), FaultKind> {
        let sp = self.registers[RSP] as i64 - WORD_SIZE as i64;
        if sp < 0 {
            return Err(FaultKind::StackOverflow);
        }
        self.ram.write_word(sp, value)?;
        self.registers[RSP] = sp as i32;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, FaultKind> {
        let sp = self.registers[RSP] as i64;
        if sp + WORD_SIZE as i64 > self.ram.len() as i64 {
            return Err(FaultKind::StackUnderflow);
        }
        let value = self.ram.read_word(sp)?;
        self.registers[RSP] = (sp + WORD_SIZE as i64) as i32;
        Ok(value)
    }
}
