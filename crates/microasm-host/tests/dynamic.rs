//! The driver scenario through a runtime opened with `Bindings::load`
//!
//! The shared library is looked up next to the test binary in the cargo
//! target directory. When it has not been built there the test returns early
//! without checking anything.

use microasm_bytecode::{Opcode, Operand, ProgramBuilder, reg};
use microasm_host::{Bindings, ErrorKind, Interpreter, LIBRARY_NAME};
use std::path::PathBuf;

fn built_library() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    [deps.join(LIBRARY_NAME), deps.parent()?.join(LIBRARY_NAME)]
        .into_iter()
        .find(|p| p.is_file())
}

#[test]
fn test_scenario_through_loaded_library() {
    let Some(library) = built_library() else {
        eprintln!("{LIBRARY_NAME} not found in the target directory; skipping");
        return;
    };
    let bindings = Bindings::load(&library).unwrap();
    assert!(bindings.is_dynamic());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.bin");
    let mut b = ProgramBuilder::new();
    b.emit(Opcode::Argc, &[Operand::reg(reg::RAX)])
        .emit(Opcode::Mul, &[Operand::reg(reg::RAX), Operand::imm(21)])
        .emit(Opcode::Hlt, &[]);
    b.finish().unwrap().write_file(&path).unwrap();

    let mut interp = Interpreter::new(&bindings, 65536, false).unwrap();
    interp.load(&path).unwrap();
    interp.execute(&["arg1_from_host", "arg2"]).unwrap();
    assert_eq!(interp.register(0).unwrap(), 42);
    interp.write_ram_int(100, 12345).unwrap();
    assert_eq!(interp.read_ram_int(100).unwrap(), 12345);

    // Errors come from the loaded library's own last-error slot
    let err = interp.read_ram_int(65536).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Memory));
    assert!(!err.to_string().contains("Unknown error"));
}
