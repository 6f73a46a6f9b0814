//! Full create → load → execute → inspect → destroy cycles through the
//! statically linked runtime

#![cfg(feature = "linked")]

use microasm_bytecode::{Opcode, Operand, ProgramBuilder, reg};
use microasm_host::{Bindings, ErrorKind, Interpreter};
use std::path::Path;

fn write_example(path: &Path) {
    let mut b = ProgramBuilder::new();
    let greeting = b.data_str("hello from MicroASM\n");
    b.emit(Opcode::Out, &[Operand::imm(1), greeting])
        .emit(Opcode::Argc, &[Operand::reg(reg::RAX)])
        .emit(Opcode::Mul, &[Operand::reg(reg::RAX), Operand::imm(21)])
        .emit(Opcode::Hlt, &[]);
    b.finish().unwrap().write_file(path).unwrap();
}

#[test]
fn test_driver_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.bin");
    write_example(&path);

    let bindings = Bindings::linked();
    let mut interp = Interpreter::new(&bindings, 65536, true).unwrap();
    interp.load(&path).unwrap();
    interp.execute(&["arg1_from_host", "arg2"]).unwrap();

    assert_eq!(interp.register(0).unwrap(), 42);
    interp.write_ram_int(100, 12345).unwrap();
    assert_eq!(interp.read_ram_int(100).unwrap(), 12345);
}

#[test]
fn test_execute_before_load_fails() {
    let bindings = Bindings::linked();
    let mut interp = Interpreter::new(&bindings, 4096, false).unwrap();
    let err = interp.execute(&[] as &[&str]).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ExecutionFailed));
    assert!(err.to_string().contains("no bytecode loaded"));
}

#[test]
fn test_load_retry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("later.bin");

    let bindings = Bindings::linked();
    let mut interp = Interpreter::new(&bindings, 4096, false).unwrap();
    let err = interp.load(&path).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::LoadFailed));

    write_example(&path);
    interp.load(&path).unwrap();
    interp.execute(&["only"]).unwrap();
    assert_eq!(interp.register(0).unwrap(), 21);

    let err = interp.execute(&["again"]).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ExecutionFailed));
}

#[test]
fn test_fault_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fault.bin");
    let mut b = ProgramBuilder::new();
    b.emit(Opcode::Mov, &[Operand::reg(reg::RAX), Operand::imm(7)])
        .emit(Opcode::Pop, &[Operand::reg(reg::RBX)]);
    b.finish().unwrap().write_file(&path).unwrap();

    let bindings = Bindings::linked();
    let mut interp = Interpreter::new(&bindings, 4096, false).unwrap();
    interp.load(&path).unwrap();
    let err = interp.execute(&[] as &[&str]).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ExecutionFailed));
    assert!(err.to_string().contains("Stack underflow"));

    assert_eq!(interp.register(0).unwrap(), 7);
    interp.write_ram_int(100, 12345).unwrap();
    assert_eq!(interp.read_ram_int(100).unwrap(), 12345);
}

#[test]
fn test_error_text_is_per_call() {
    let bindings = Bindings::linked();
    let mut interp = Interpreter::new(&bindings, 4096, false).unwrap();

    let first = interp.read_ram_int(5000).unwrap_err();
    interp.write_ram_int(0, 1).unwrap();
    let second = interp.register(99).unwrap_err();

    assert_eq!(first.kind(), Some(ErrorKind::Memory));
    assert_eq!(second.kind(), Some(ErrorKind::General));
    assert_ne!(first.to_string(), second.to_string());
}

#[test]
fn test_create_destroy_cycles() {
    let bindings = Bindings::linked();
    for _ in 0..1000 {
        let interp = Interpreter::new(&bindings, 65536, false).unwrap();
        assert_eq!(interp.register(0).unwrap(), 0);
    }
}

#[test]
fn test_drop_on_error_path() {
    fn run(bindings: &Bindings) -> Result<(), microasm_host::MasmError> {
        let mut interp = Interpreter::new(bindings, 4096, false)?;
        interp.load("/nonexistent/missing.bin")?;
        Ok(())
    }
    let bindings = Bindings::linked();
    let err = run(&bindings).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::LoadFailed));
}
