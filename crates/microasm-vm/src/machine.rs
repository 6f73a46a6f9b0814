//! Interpreter instance: register file, RAM image and lifecycle

use microasm_bytecode::{Program, REGISTER_COUNT, WORD_SIZE, reg};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::DEFAULT_RAM_SIZE;
use crate::console::{Console, StdConsole};
use crate::error::{Fault, FaultKind, VmError, VmResult};
use crate::heap::Heap;
use crate::memory::Ram;
use crate::native::{NativeCall, NativeRegistry, NativeResult};

/// Construction parameters for a [`Machine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// RAM image size in bytes; must be positive and fit in a register
    pub ram_size: usize,
    /// Trace every executed instruction at `debug` level
    pub debug: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            debug: false,
        }
    }
}

/// Lifecycle state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Allocated, no program installed
    Created,
    /// Program installed, not yet run
    Loaded,
    /// Ran to a halt
    Executed,
    /// Stopped on a runtime fault
    Faulted,
}

/// One MicroASM interpreter instance
pub struct Machine {
    pub(crate) registers: [i32; REGISTER_COUNT],
    pub(crate) ram: Ram,
    pub(crate) code: Vec<u8>,
    pub(crate) ip: usize,
    pub(crate) data_base: usize,
    /// First byte after the loaded data segment
    pub(crate) data_end: usize,
    pub(crate) zero_flag: bool,
    pub(crate) sign_flag: bool,
    /// RAM addresses of the NUL-terminated script arguments
    pub(crate) args: Vec<i32>,
    pub(crate) debug: bool,
    pub(crate) state: State,
    pub(crate) console: Box<dyn Console>,
    /// `MALLOC` blocks between address `WORD_SIZE` and the data base
    pub(crate) heap: Heap,
    pub(crate) natives: NativeRegistry,
}

impl Machine {
    /// Create a machine writing program output to the process streams
    pub fn new(config: MachineConfig) -> VmResult<Self> {
        Self::with_console(config, Box::new(StdConsole))
    }

    /// Create a machine with a custom output sink
    pub fn with_console(config: MachineConfig, console: Box<dyn Console>) -> VmResult<Self> {
        let top = i32::try_from(config.ram_size)
            .ok()
            .filter(|&size| size > 0)
            .ok_or(VmError::InvalidRamSize(config.ram_size as i64))?;

        let mut registers = [0; REGISTER_COUNT];
        registers[reg::RSP as usize] = top;
        registers[reg::RBP as usize] = top;

        let data_base = config.ram_size / 2;
        let ram = allocate_ram(config.ram_size)?;

        if config.debug {
            debug!(ram_size = config.ram_size, "Interpreter created in debug mode");
        }

        Ok(Self {
            registers,
            ram,
            code: Vec::new(),
            ip: 0,
            data_base,
            data_end: data_base,
            zero_flag: false,
            sign_flag: false,
            args: Vec::new(),
            debug: config.debug,
            state: State::Created,
            console,
            // Address 0 stays out of the heap so 0 can mean "no block"
            heap: Heap::new(WORD_SIZE, data_base),
            natives: NativeRegistry::with_builtins(),
        })
    }

    /// Make `f` callable from programs as `MNI name, a, b`
    ///
    /// Registering an existing name replaces it, including the built-ins
    /// `Math.sin` and `IO.write`.
    pub fn register_native<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut NativeCall<'_>) -> NativeResult + 'static,
    {
        self.natives.insert(name, Rc::new(f));
    }

    /// Whether a native function is registered under `name`
    pub fn has_native(&self, name: &str) -> bool {
        self.natives.contains(name)
    }

    /// Bytes currently held by `MALLOC` blocks
    pub fn heap_in_use(&self) -> usize {
        self.heap.in_use()
    }

    /// Replace the output sink
    pub fn set_console(&mut self, console: Box<dyn Console>) {
        self.console = console;
    }

    /// Read an artifact from disk and install it
    ///
    /// On failure the machine stays `Created` and loading may be retried.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> VmResult<()> {
        self.ensure_created()?;
        let path = path.as_ref();
        let program = Program::read_file(path).inspect_err(|e| {
            debug!(path = %path.display(), error = %e, "Bytecode load failed");
        })?;
        self.load_program(program)
    }

    /// Install an already parsed program
    pub fn load_program(&mut self, program: Program) -> VmResult<()> {
        self.ensure_created()?;

        let data_size = program.data.len();
        let fits = self
            .data_base
            .checked_add(data_size)
            .is_some_and(|end| end <= self.ram.len());
        if !fits {
            return Err(VmError::DataSegmentTooLarge {
                ram_size: self.ram.len(),
                data_size,
                base: self.data_base,
            });
        }

        self.ram
            .slice_mut(self.data_base as i64, data_size)?
            .copy_from_slice(&program.data);
        self.data_end = self.data_base + data_size;
        self.ip = program.entry_point();
        self.code = program.code;
        self.state = State::Loaded;

        if self.debug {
            debug!(
                code_size = self.code.len(),
                data_size,
                entry = self.ip,
                "Bytecode loaded"
            );
        }
        Ok(())
    }

    /// Run the loaded program until it halts or faults
    ///
    /// Permitted once per load. A fault leaves registers and RAM as they were
    /// when the faulting instruction started.
    pub fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> VmResult<()> {
        match self.state {
            State::Loaded => {}
            State::Created => {
                return Err(self.invalid_state("execute", "no bytecode loaded"));
            }
            State::Executed | State::Faulted => {
                return Err(self.invalid_state(
                    "execute",
                    "program already executed; re-execution is not supported",
                ));
            }
        }

        let result = self.place_args(args).and_then(|()| self.run());
        if let Err(e) = self.console.flush() {
            warn!(error = %e, "Failed to flush program output");
        }

        match result {
            Ok(()) => {
                self.state = State::Executed;
                if self.debug {
                    debug!(ip = self.ip, "Execution finished");
                }
                Ok(())
            }
            Err(fault) => {
                self.state = State::Faulted;
                debug!(error = %fault, "Execution faulted");
                Err(fault.into())
            }
        }
    }

    /// Copy script arguments into RAM directly after the data segment
    fn place_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), Fault> {
        let offset = self.ip;
        let mut cursor = self.data_end;
        self.args.clear();
        for arg in args {
            let bytes = arg.as_ref().as_bytes();
            let slot = self
                .ram
                .slice_mut(cursor as i64, bytes.len() + 1)
                .map_err(|e| Fault {
                    offset,
                    opcode: None,
                    kind: FaultKind::Memory(e),
                })?;
            slot[..bytes.len()].copy_from_slice(bytes);
            slot[bytes.len()] = 0;
            // cursor < ram size, which fits in i32
            self.args.push(cursor as i32);
            cursor += bytes.len() + 1;
        }
        Ok(())
    }

    /// Current value of a register
    pub fn register(&self, index: i64) -> VmResult<i32> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.registers.get(i))
            .copied()
            .ok_or(VmError::RegisterIndex {
                index,
                max: REGISTER_COUNT - 1,
            })
    }

    /// The whole register file
    pub fn registers(&self) -> &[i32] {
        &self.registers
    }

    /// Read a word from RAM
    pub fn read_word(&self, address: i64) -> VmResult<i32> {
        Ok(self.ram.read_word(address)?)
    }

    /// Write a word to RAM
    pub fn write_word(&mut self, address: i64, value: i32) -> VmResult<()> {
        Ok(self.ram.write_word(address, value)?)
    }

    /// The RAM image
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// RAM size in bytes
    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// Address where the data segment is loaded
    pub fn data_base(&self) -> usize {
        self.data_base
    }

    /// Instruction pointer (code offset)
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether instruction tracing is enabled
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Enable or disable instruction tracing
    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    fn ensure_created(&self) -> VmResult<()> {
        match self.state {
            State::Created => Ok(()),
            _ => Err(self.invalid_state("load", "bytecode already loaded")),
        }
    }

    fn invalid_state(&self, operation: &'static str, reason: &'static str) -> VmError {
        VmError::InvalidState {
            operation,
            reason,
            state: self.state,
        }
    }
}

fn allocate_ram(size: usize) -> VmResult<Ram> {
    Ram::try_new(size).map_err(|source| {
        warn!(size, error = %source, "RAM allocation failed");
        VmError::Allocation { size, source }
    })
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("ip", &self.ip)
            .field("ram_size", &self.ram.len())
            .field("code_size", &self.code.len())
            .field("registers", &self.registers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microasm_bytecode::{Opcode, Operand, ProgramBuilder};

    fn halt_program() -> Program {
        let mut b = ProgramBuilder::new();
        b.emit(Opcode::Hlt, &[]);
        b.finish().unwrap()
    }

    #[test]
    fn test_zero_ram_rejected() {
        let err = Machine::new(MachineConfig {
            ram_size: 0,
            debug: false,
        })
        .unwrap_err();
        assert!(matches!(err, VmError::InvalidRamSize(0)));
    }

    #[test]
    fn test_unallocatable_ram_is_an_error() {
        let err = allocate_ram(usize::MAX).unwrap_err();
        assert!(matches!(err, VmError::Allocation { size: usize::MAX, .. }));
        assert!(err.to_string().contains("Failed to allocate"));
    }

    #[test]
    fn test_builtin_natives() {
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        assert!(vm.has_native("Math.sin"));
        assert!(vm.has_native("IO.write"));
        assert!(!vm.has_native("Test.custom"));
        vm.register_native("Test.custom", |_| Ok(()));
        assert!(vm.has_native("Test.custom"));
    }

    #[test]
    fn test_initial_registers() {
        let vm = Machine::new(MachineConfig::default()).unwrap();
        assert_eq!(vm.register(0).unwrap(), 0);
        assert_eq!(vm.register(reg::RSP as i64).unwrap(), 65536);
        assert_eq!(vm.register(reg::RBP as i64).unwrap(), 65536);
        assert_eq!(vm.state(), State::Created);
    }

    #[test]
    fn test_register_out_of_range() {
        let vm = Machine::new(MachineConfig::default()).unwrap();
        assert!(matches!(
            vm.register(24).unwrap_err(),
            VmError::RegisterIndex { index: 24, max: 23 }
        ));
        assert!(vm.register(-1).is_err());
    }

    #[test]
    fn test_execute_before_load() {
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        let err = vm.execute(&[] as &[&str]).unwrap_err();
        assert!(err.to_string().contains("no bytecode loaded"));
        assert_eq!(vm.state(), State::Created);
    }

    #[test]
    fn test_second_load_rejected() {
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        vm.load_program(halt_program()).unwrap();
        let err = vm.load_program(halt_program()).unwrap_err();
        assert!(matches!(
            err,
            VmError::InvalidState {
                operation: "load",
                state: State::Loaded,
                ..
            }
        ));
    }

    #[test]
    fn test_re_execute_rejected() {
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        vm.load_program(halt_program()).unwrap();
        vm.execute(&[] as &[&str]).unwrap();
        assert_eq!(vm.state(), State::Executed);
        let err = vm.execute(&[] as &[&str]).unwrap_err();
        assert!(err.to_string().contains("already executed"));
    }

    #[test]
    fn test_data_segment_too_large() {
        let mut b = ProgramBuilder::new();
        b.data(&[0u8; 9]);
        b.emit(Opcode::Hlt, &[]);
        let mut vm = Machine::new(MachineConfig {
            ram_size: 16,
            debug: false,
        })
        .unwrap();
        let err = vm.load_program(b.finish().unwrap()).unwrap_err();
        assert!(matches!(err, VmError::DataSegmentTooLarge { base: 8, .. }));
        assert_eq!(vm.state(), State::Created);
    }

    #[test]
    fn test_data_copied_to_base() {
        let mut b = ProgramBuilder::new();
        b.data_word(77);
        b.emit(Opcode::Hlt, &[]);
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        vm.load_program(b.finish().unwrap()).unwrap();
        assert_eq!(vm.read_word(vm.data_base() as i64).unwrap(), 77);
    }

    #[test]
    fn test_write_then_read_word() {
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        vm.write_word(100, 12345).unwrap();
        assert_eq!(vm.read_word(100).unwrap(), 12345);
        assert!(vm.read_word(65533).is_err());
        assert!(vm.write_word(65533, 1).is_err());
    }

    #[test]
    fn test_args_placed_after_data() {
        let mut b = ProgramBuilder::new();
        b.data_str("abc");
        b.emit(Opcode::Argc, &[Operand::reg(reg::RAX)])
            .emit(Opcode::Hlt, &[]);
        let mut vm = Machine::new(MachineConfig::default()).unwrap();
        vm.load_program(b.finish().unwrap()).unwrap();
        vm.execute(&["x", "yz"]).unwrap();

        let base = vm.data_base() as i64;
        assert_eq!(vm.ram().read_cstr(base + 4).unwrap(), b"x");
        assert_eq!(vm.ram().read_cstr(base + 6).unwrap(), b"yz");
        assert_eq!(vm.register(0).unwrap(), 2);
    }
}
