//! Program builder for emitting code and data segments

use crate::error::{BytecodeError, Result};
use crate::instruction::Instruction;
use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::program::Program;

/// Forward-referenceable code location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// A branch operand waiting for its label to be bound
#[derive(Debug)]
struct Fixup {
    /// Offset of the operand's `i32` value in the code segment
    at: usize,
    label: Label,
}

/// Incrementally builds a [`Program`]
///
/// Emission errors are recorded and reported by [`ProgramBuilder::finish`],
/// so calls can be chained.
///
/// ```
/// use microasm_bytecode::{Opcode, Operand, ProgramBuilder, reg};
///
/// let mut b = ProgramBuilder::new();
/// let done = b.new_label();
/// b.emit(Opcode::Mov, &[Operand::reg(reg::RAX), Operand::imm(1)])
///     .emit_branch(Opcode::Jmp, done)
///     .emit(Opcode::Inc, &[Operand::reg(reg::RAX)])
///     .bind(done)
///     .emit(Opcode::Hlt, &[]);
/// let program = b.finish().unwrap();
/// assert_eq!(program.disassemble().unwrap().len(), 4);
/// ```
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<u8>,
    data: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    entry: Option<Label>,
    error: Option<BytecodeError>,
}

impl ProgramBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emit one instruction
    pub fn emit(&mut self, opcode: Opcode, operands: &[Operand]) -> &mut Self {
        match Instruction::new(opcode, operands) {
            Ok(inst) => inst.encode(&mut self.code),
            Err(e) => self.record(e),
        }
        self
    }

    /// Emit a branch (`JMP`, `Jcc`, `CALL`) whose target is a label
    pub fn emit_branch(&mut self, opcode: Opcode, target: Label) -> &mut Self {
        if !opcode.is_branch() {
            self.record(BytecodeError::ArityMismatch {
                opcode,
                expected: opcode.operand_count().unwrap_or(0),
                actual: 1,
            });
            return self;
        }
        // Opcode byte + operand type byte precede the value
        let at = self.code.len() + 2;
        self.emit(opcode, &[Operand::Label(0)]);
        self.fixups.push(Fixup { at, label: target });
        self
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current code offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Start execution at `label` instead of offset 0
    pub fn entry(&mut self, label: Label) -> &mut Self {
        self.entry = Some(label);
        self
    }

    /// Append raw bytes to the data segment, returning an operand addressing them
    pub fn data(&mut self, bytes: &[u8]) -> Operand {
        let offset = self.data.len() as i32;
        self.data.extend_from_slice(bytes);
        Operand::data(offset)
    }

    /// Append a NUL-terminated string to the data segment
    pub fn data_str(&mut self, s: &str) -> Operand {
        let operand = self.data(s.as_bytes());
        self.data.push(0);
        operand
    }

    /// Append a little-endian word to the data segment
    pub fn data_word(&mut self, value: i32) -> Operand {
        self.data(&value.to_le_bytes())
    }

    /// Resolve labels and produce the program
    pub fn finish(mut self) -> Result<Program> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        for fixup in &self.fixups {
            let target = self.resolve(fixup.label)?;
            self.code[fixup.at..fixup.at + 4].copy_from_slice(&(target as i32).to_le_bytes());
        }

        let entry = match self.entry {
            Some(label) => self.resolve(label)? as u32,
            None => 0,
        };

        Program::new(self.code, self.data, entry)
    }

    fn resolve(&self, label: Label) -> Result<usize> {
        self.labels[label.0].ok_or(BytecodeError::UnboundLabel(label.0))
    }

    fn record(&mut self, err: BytecodeError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg;

    #[test]
    fn test_forward_label_is_patched() {
        let mut b = ProgramBuilder::new();
        let end = b.new_label();
        b.emit_branch(Opcode::Jmp, end)
            .emit(Opcode::Inc, &[Operand::reg(reg::RAX)])
            .bind(end)
            .emit(Opcode::Hlt, &[]);
        let program = b.finish().unwrap();

        let listing = program.disassemble().unwrap();
        assert_eq!(listing[0].operands, vec![Operand::Label(12)]);
        assert_eq!(listing[2].offset, 12);
    }

    #[test]
    fn test_unbound_label() {
        let mut b = ProgramBuilder::new();
        let nowhere = b.new_label();
        b.emit_branch(Opcode::Call, nowhere);
        assert!(matches!(
            b.finish().unwrap_err(),
            BytecodeError::UnboundLabel(0)
        ));
    }

    #[test]
    fn test_first_error_is_reported() {
        let mut b = ProgramBuilder::new();
        b.emit(Opcode::Mov, &[Operand::reg(0)])
            .emit(Opcode::Db, &[]);
        assert!(matches!(
            b.finish().unwrap_err(),
            BytecodeError::ArityMismatch {
                opcode: Opcode::Mov,
                ..
            }
        ));
    }

    #[test]
    fn test_branch_requires_branch_opcode() {
        let mut b = ProgramBuilder::new();
        let l = b.new_label();
        b.bind(l).emit_branch(Opcode::Add, l);
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_data_offsets() {
        let mut b = ProgramBuilder::new();
        let greeting = b.data_str("hi");
        let word = b.data_word(0x0102_0304);
        b.emit(Opcode::Hlt, &[]);
        let program = b.finish().unwrap();

        assert_eq!(greeting, Operand::data(0));
        assert_eq!(word, Operand::data(3));
        assert_eq!(program.data, vec![b'h', b'i', 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_entry_label() {
        let mut b = ProgramBuilder::new();
        let main = b.new_label();
        b.emit(Opcode::Ret, &[])
            .bind(main)
            .emit(Opcode::Hlt, &[])
            .entry(main);
        let program = b.finish().unwrap();
        assert_eq!(program.entry_point(), 1);
    }
}
