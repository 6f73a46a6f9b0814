//! Example command - write a demo bytecode artifact.

use anyhow::{Context, Result};
use clap::Args;
use microasm_bytecode::{Opcode, Operand, Program, ProgramBuilder, reg};
use std::path::PathBuf;

#[derive(Args)]
pub struct ExampleCommand {
    /// Where to write the artifact
    #[arg(default_value = "example.bin")]
    pub output: PathBuf,
}

impl ExampleCommand {
    pub fn run(&self) -> Result<()> {
        let program = example_program()?;
        program
            .write_file(&self.output)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        println!(
            "Wrote {} ({} code bytes, {} data bytes)",
            self.output.display(),
            program.code.len(),
            program.data.len()
        );
        Ok(())
    }
}

/// Greets, echoes each script argument on its own line, then leaves 5! in RAX
pub fn example_program() -> microasm_bytecode::Result<Program> {
    let r = Operand::reg;
    let imm = Operand::imm;
    let stdout = imm(1);

    let mut b = ProgramBuilder::new();
    let greeting = b.data_str("Hello from MicroASM!\n");
    let prefix = b.data_str("arg: ");
    let nul = b.data(&[0]);

    let next_arg = b.new_label();
    let next_char = b.new_label();
    let end_arg = b.new_label();
    let args_done = b.new_label();
    let factorial = b.new_label();
    let fact_done = b.new_label();

    b.emit(Opcode::Out, &[stdout, greeting])
        .emit(Opcode::Argc, &[r(reg::RCX)])
        .emit(Opcode::Mov, &[r(reg::RBX), imm(0)]);

    // for each argument: print "arg: <text>\n"
    b.bind(next_arg)
        .emit(Opcode::Cmp, &[r(reg::RBX), r(reg::RCX)])
        .emit_branch(Opcode::Jge, args_done)
        .emit(Opcode::GetArg, &[r(reg::RSI), r(reg::RBX)])
        .emit(Opcode::Out, &[stdout, prefix])
        .bind(next_char)
        .emit(Opcode::CmpMem, &[r(reg::RSI), nul, imm(1)])
        .emit_branch(Opcode::Je, end_arg)
        .emit(Opcode::OutChar, &[stdout, r(reg::RSI)])
        .emit(Opcode::Inc, &[r(reg::RSI)])
        .emit_branch(Opcode::Jmp, next_char)
        .bind(end_arg)
        .emit(Opcode::Cout, &[stdout, imm('\n' as i32)])
        .emit(Opcode::Inc, &[r(reg::RBX)])
        .emit_branch(Opcode::Jmp, next_arg);

    b.bind(args_done)
        .emit(Opcode::Mov, &[r(reg::RAX), imm(1)])
        .emit(Opcode::Mov, &[r(reg::RDX), imm(5)])
        .emit_branch(Opcode::Call, factorial)
        .emit(Opcode::Hlt, &[]);

    // RAX *= RDX * (RDX - 1) * ... * 2
    b.bind(factorial)
        .emit(Opcode::Cmp, &[r(reg::RDX), imm(1)])
        .emit_branch(Opcode::Jle, fact_done)
        .emit(Opcode::Mul, &[r(reg::RAX), r(reg::RDX)])
        .emit(Opcode::Sub, &[r(reg::RDX), imm(1)])
        .emit_branch(Opcode::Jmp, factorial)
        .bind(fact_done)
        .emit(Opcode::Ret, &[]);

    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use microasm_host::{Bindings, Interpreter};

    #[test]
    fn test_example_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.bin");
        example_program().unwrap().write_file(&path).unwrap();

        let bindings = Bindings::linked();
        let mut interp = Interpreter::new(&bindings, 65536, false).unwrap();
        interp.load(&path).unwrap();
        interp.execute(&["arg1_from_host", "arg2"]).unwrap();
        assert_eq!(interp.register(0).unwrap(), 120);
        assert_eq!(interp.register(reg::RBX as usize).unwrap(), 2);
    }

    #[test]
    fn test_example_disassembles() {
        let program = example_program().unwrap();
        let listing = program.disassemble().unwrap();
        assert_eq!(listing[0].opcode, Opcode::Out);
        assert_eq!(listing.last().unwrap().opcode, Opcode::Ret);
    }
}
