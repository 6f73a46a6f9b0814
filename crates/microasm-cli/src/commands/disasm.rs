//! Disasm command - print the decoded contents of a bytecode artifact.

use anyhow::{Context, Result};
use clap::Args;
use microasm_bytecode::{DecodedInstruction, Program};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args)]
pub struct DisasmCommand {
    /// Bytecode artifact to decode
    pub bytecode: PathBuf,

    /// Emit JSON instead of an assembly listing
    #[arg(long)]
    pub json: bool,
}

/// JSON shape of a disassembled artifact
#[derive(Debug, Serialize)]
struct Listing<'a> {
    version: u16,
    code_size: u32,
    data_size: u32,
    entry_point: u32,
    instructions: &'a [DecodedInstruction],
    data: &'a [u8],
}

impl DisasmCommand {
    pub fn run(&self) -> Result<()> {
        let program = Program::read_file(&self.bytecode)
            .with_context(|| format!("Failed to read {}", self.bytecode.display()))?;
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if self.json {
            write_json(&program, &mut out)
        } else {
            write_listing(&program, &mut out)
        }
    }
}

fn write_json(program: &Program, out: &mut impl Write) -> Result<()> {
    let instructions = program.disassemble()?;
    let listing = Listing {
        version: program.header.version,
        code_size: program.header.code_size,
        data_size: program.header.data_size,
        entry_point: program.header.entry_point,
        instructions: &instructions,
        data: &program.data,
    };
    serde_json::to_writer_pretty(&mut *out, &listing)?;
    writeln!(out)?;
    Ok(())
}

fn write_listing(program: &Program, out: &mut impl Write) -> Result<()> {
    let header = &program.header;
    writeln!(
        out,
        "; MASM v{}  code: {} bytes  data: {} bytes  entry: 0x{:04X}",
        header.version, header.code_size, header.data_size, header.entry_point
    )?;
    for inst in program.disassemble()? {
        let marker = if inst.offset == program.entry_point() {
            ">"
        } else {
            " "
        };
        writeln!(out, "{marker}{:04X}  {}", inst.offset, inst.text)?;
    }
    if !program.data.is_empty() {
        writeln!(out, "; data")?;
        for (i, chunk) in program.data.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            writeln!(out, " {:04X}  {:<47}  {ascii}", i * 16, hex.join(" "))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use microasm_bytecode::{Opcode, Operand, ProgramBuilder, reg};

    fn sample() -> Program {
        let mut b = ProgramBuilder::new();
        let msg = b.data_str("hi");
        b.emit(Opcode::Out, &[Operand::imm(1), msg])
            .emit(Opcode::Mov, &[Operand::reg(reg::RAX), Operand::imm(7)])
            .emit(Opcode::Hlt, &[]);
        b.finish().unwrap()
    }

    #[test]
    fn test_listing() {
        let mut out = Vec::new();
        write_listing(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("; MASM v1"));
        assert!(lines[1].starts_with(">0000  OUT"));
        assert!(lines[2].contains("MOV RAX, 7"));
        assert!(lines[3].contains("HLT"));
        assert_eq!(lines[4], "; data");
        assert!(lines[5].ends_with("hi."));
    }

    #[test]
    fn test_json() {
        let mut out = Vec::new();
        write_json(&sample(), &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["instructions"].as_array().unwrap().len(), 3);
        assert_eq!(value["instructions"][1]["text"], "MOV RAX, 7");
        assert_eq!(value["data"].as_array().unwrap().len(), 3);
    }
}
