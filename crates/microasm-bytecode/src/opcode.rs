//! MicroASM opcodes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instruction opcodes
///
/// Numbering starts at `0x01` and is part of the artifact format. `Db` and
/// `Lbl` are assembler directives; they have opcode numbers but never appear
/// in an executable code segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== Arithmetic ====================
    /// dst = src
    Mov = 0x01,
    /// dst += src
    Add = 0x02,
    /// dst -= src
    Sub = 0x03,
    /// dst *= src
    Mul = 0x04,
    /// dst /= src (faults on zero)
    Div = 0x05,
    /// dst += 1
    Inc = 0x06,

    // ==================== Flow control ====================
    /// Unconditional jump to an absolute code offset
    Jmp = 0x07,
    /// Set flags from `a - b`
    Cmp = 0x08,
    /// Jump if equal
    Je = 0x09,
    /// Jump if less
    Jl = 0x0A,
    /// Push return offset and jump
    Call = 0x0B,
    /// Pop return offset and jump
    Ret = 0x0C,

    // ==================== Stack ====================
    /// Push a word
    Push = 0x0D,
    /// Pop a word into a register
    Pop = 0x0E,

    // ==================== I/O ====================
    /// Write an integer, or a NUL-terminated string for data operands
    Out = 0x0F,
    /// Write a value as a single character
    Cout = 0x10,
    /// Write `len` bytes starting at an address
    OutStr = 0x11,
    /// Write the byte at an address
    OutChar = 0x12,

    // ==================== Program control ====================
    /// Stop execution
    Hlt = 0x13,
    /// dst = number of script arguments
    Argc = 0x14,
    /// dst = RAM address of script argument `index`
    GetArg = 0x15,

    // ==================== Assembler directives ====================
    /// Data definition
    Db = 0x16,
    /// Label definition
    Lbl = 0x17,

    // ==================== Bitwise ====================
    /// dst &= src
    And = 0x18,
    /// dst |= src
    Or = 0x19,
    /// dst ^= src
    Xor = 0x1A,
    /// dst = !dst
    Not = 0x1B,
    /// dst <<= count
    Shl = 0x1C,
    /// dst >>= count (arithmetic)
    Shr = 0x1D,

    // ==================== Memory addressing ====================
    /// dst = word at (addr + offset)
    MovAddr = 0x1E,
    /// word at (addr + offset) = src
    MovTo = 0x1F,

    // ==================== More flow control ====================
    /// Jump if not equal
    Jne = 0x20,
    /// Jump if greater
    Jg = 0x21,
    /// Jump if less or equal
    Jle = 0x22,
    /// Jump if greater or equal
    Jge = 0x23,

    // ==================== Stack frames ====================
    /// Push RBP, RBP = RSP, RSP -= size
    Enter = 0x24,
    /// RSP = RBP, pop RBP
    Leave = 0x25,

    // ==================== Memory blocks ====================
    /// Copy `len` bytes from src to dst
    Copy = 0x26,
    /// Fill `len` bytes with the low byte of a value
    Fill = 0x27,
    /// Compare two byte ranges and set flags
    CmpMem = 0x28,

    // ==================== Host interface ====================
    /// Call a registered native function by name with two operands
    Mni = 0x29,
    /// Read a line of input into RAM as a NUL-terminated string
    In = 0x2A,

    // ==================== Heap ====================
    /// dst = address of a new heap block of `size` bytes, 0 when exhausted
    Malloc = 0x2B,
    /// Release a heap block; dst = 1
    Free = 0x2C,
    /// Byte move; data operands address RAM
    Movb = 0x2D,
}

impl Opcode {
    /// Decode an opcode byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        use Opcode::*;
        const TABLE: [Opcode; 45] = [
            Mov, Add, Sub, Mul, Div, Inc, Jmp, Cmp, Je, Jl, Call, Ret, Push, Pop, Out, Cout,
            OutStr, OutChar, Hlt, Argc, GetArg, Db, Lbl, And, Or, Xor, Not, Shl, Shr, MovAddr,
            MovTo, Jne, Jg, Jle, Jge, Enter, Leave, Copy, Fill, CmpMem, Mni, In, Malloc, Free,
            Movb,
        ];
        byte.checked_sub(1)
            .and_then(|idx| TABLE.get(idx as usize))
            .copied()
    }

    /// Number of operands that follow the opcode, `None` for assembler directives
    pub fn operand_count(self) -> Option<usize> {
        use Opcode::*;
        let count = match self {
            Ret | Hlt | Leave => 0,
            Inc | Jmp | Je | Jl | Call | Push | Pop | Argc | Not | Jne | Jg | Jle | Jge
            | Enter | In => 1,
            Mov | Add | Sub | Mul | Div | Cmp | Out | Cout | OutChar | GetArg | And | Or
            | Xor | Shl | Shr | Malloc | Free | Movb => 2,
            OutStr | MovAddr | MovTo | Copy | Fill | CmpMem | Mni => 3,
            Db | Lbl => return None,
        };
        Some(count)
    }

    /// Whether the single operand is a code offset
    pub fn is_branch(self) -> bool {
        use Opcode::*;
        matches!(self, Jmp | Je | Jl | Call | Jne | Jg | Jle | Jge)
    }

    /// Assembly mnemonic
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Mov => "MOV",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Inc => "INC",
            Jmp => "JMP",
            Cmp => "CMP",
            Je => "JE",
            Jl => "JL",
            Call => "CALL",
            Ret => "RET",
            Push => "PUSH",
            Pop => "POP",
            Out => "OUT",
            Cout => "COUT",
            OutStr => "OUTSTR",
            OutChar => "OUTCHAR",
            Hlt => "HLT",
            Argc => "ARGC",
            GetArg => "GETARG",
            Db => "DB",
            Lbl => "LBL",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Shl => "SHL",
            Shr => "SHR",
            MovAddr => "MOVADDR",
            MovTo => "MOVTO",
            Jne => "JNE",
            Jg => "JG",
            Jle => "JLE",
            Jge => "JGE",
            Enter => "ENTER",
            Leave => "LEAVE",
            Copy => "COPY",
            Fill => "FILL",
            CmpMem => "CMP_MEM",
            Mni => "MNI",
            In => "IN",
            Malloc => "MALLOC",
            Free => "FREE",
            Movb => "MOVB",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_matches_discriminants() {
        for byte in 0x01..=0x2Du8 {
            let op = Opcode::from_u8(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
    }

    #[test]
    fn test_from_u8_rejects_unknown() {
        assert_eq!(Opcode::from_u8(0x00), None);
        assert_eq!(Opcode::from_u8(0x2E), None);
        assert_eq!(Opcode::from_u8(0xF2), None);
    }

    #[test]
    fn test_directives_have_no_arity() {
        assert_eq!(Opcode::Db.operand_count(), None);
        assert_eq!(Opcode::Lbl.operand_count(), None);
        assert_eq!(Opcode::Hlt.operand_count(), Some(0));
        assert_eq!(Opcode::CmpMem.operand_count(), Some(3));
    }

    #[test]
    fn test_host_and_heap_arity() {
        assert_eq!(Opcode::Mni.operand_count(), Some(3));
        assert_eq!(Opcode::In.operand_count(), Some(1));
        assert_eq!(Opcode::Malloc.operand_count(), Some(2));
        assert_eq!(Opcode::Free.operand_count(), Some(2));
        assert_eq!(Opcode::Movb.operand_count(), Some(2));
        assert_eq!(Opcode::from_u8(0x2B), Some(Opcode::Malloc));
        assert_eq!(Opcode::Movb.to_string(), "MOVB");
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::CmpMem.to_string(), "CMP_MEM");
        assert_eq!(Opcode::GetArg.to_string(), "GETARG");
    }
}
