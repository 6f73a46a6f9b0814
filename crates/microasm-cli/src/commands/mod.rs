//! CLI command implementations.

pub mod disasm;
pub mod example;
pub mod run;
