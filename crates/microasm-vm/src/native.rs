//! Host functions reachable from programs through `MNI`
//!
//! An `MNI` instruction names a function as `Module.Function` (a
//! NUL-terminated string in the data segment) and passes two operands. The
//! function sees those operands through a [`NativeCall`] and may read or
//! write registers, RAM and the console.

use microasm_bytecode::Operand;
use std::collections::HashMap;
use std::rc::Rc;

use crate::console::Port;
use crate::error::FaultKind;
use crate::machine::Machine;
use crate::memory::Ram;

/// Result of a native function; the error text becomes a runtime fault
pub type NativeResult = Result<(), String>;

/// A registered native function
pub type NativeFn = Rc<dyn Fn(&mut NativeCall<'_>) -> NativeResult>;

/// Native functions by `Module.Function` name
#[derive(Clone, Default)]
pub(crate) struct NativeRegistry {
    functions: HashMap<String, NativeFn>,
}

impl NativeRegistry {
    /// Registry holding the built-in functions
    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.insert("Math.sin", Rc::new(math_sin));
        registry.insert("IO.write", Rc::new(io_write));
        registry
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, f: NativeFn) {
        self.functions.insert(name.into(), f);
    }

    pub(crate) fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// The machine as seen by a native function during one `MNI`
pub struct NativeCall<'m> {
    pub(crate) machine: &'m mut Machine,
    pub(crate) args: [Operand; 2],
}

impl NativeCall<'_> {
    /// Raw operand `index` (0 or 1)
    pub fn operand(&self, index: usize) -> Option<Operand> {
        self.args.get(index).copied()
    }

    /// Resolve operand `index` to a value, as an ordinary instruction would
    pub fn value(&self, index: usize) -> Result<i32, String> {
        let op = self.operand(index).ok_or("no such operand")?;
        self.machine.value(op).map_err(|e| e.to_string())
    }

    /// Store into the register named by operand `index`
    pub fn set_register(&mut self, index: usize, value: i32) -> NativeResult {
        let op = self.operand(index).ok_or("no such operand")?;
        let reg = self.machine.reg_index(op).map_err(|e| e.to_string())?;
        self.machine.registers[reg] = value;
        Ok(())
    }

    /// The RAM image
    pub fn ram(&self) -> &Ram {
        &self.machine.ram
    }

    /// The RAM image, writable
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.machine.ram
    }

    /// Write to an output port
    pub fn write(&mut self, port: Port, bytes: &[u8]) -> NativeResult {
        self.machine
            .console
            .write(port, bytes)
            .map_err(|e| FaultKind::Console(e).to_string())
    }
}

/// `Math.sin angle, dst`: angle and result in thousandths
fn math_sin(call: &mut NativeCall<'_>) -> NativeResult {
    let milli = call.value(0)?;
    let sin = (milli as f64 / 1000.0).sin();
    call.set_register(1, (sin * 1000.0).round() as i32)
}

/// `IO.write port, addr`: print the NUL-terminated string at `addr`
fn io_write(call: &mut NativeCall<'_>) -> NativeResult {
    let n = call.value(0)?;
    let port = Port::from_number(n).ok_or_else(|| FaultKind::InvalidPort(n).to_string())?;
    let addr = call.value(1)?;
    let text = call
        .ram()
        .read_cstr(addr as i64)
        .map_err(|e| e.to_string())?
        .to_vec();
    call.write(port, &text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = NativeRegistry::with_builtins();
        assert!(registry.contains("Math.sin"));
        assert!(registry.contains("IO.write"));
        assert!(!registry.contains("Math.cos"));
        assert!(registry.get("math.sin").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = NativeRegistry::default();
        registry.insert("Test.f", Rc::new(|_: &mut NativeCall<'_>| -> NativeResult { Ok(()) }));
        registry.insert(
            "Test.f",
            Rc::new(|_: &mut NativeCall<'_>| -> NativeResult { Err("second".into()) }),
        );
        assert_eq!(registry.functions.len(), 1);
    }
}
