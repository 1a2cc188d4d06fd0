//! Bytecode generation and analysis
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable instructions. Method bodies are kept as raw bytes: editing them in place keeps
//! everything the class file says about offsets (exception tables, stack maps, debug tables)
//! meaningful, and [`opcodes`] has what is needed to walk over the instructions.
//!
//! ### Code generation
//!
//! [`Bytecode`] appends instructions to a method body while keeping track of the operand stack
//! depth and the number of locals used, so that the resulting [`Code`](crate::jvm::class_file::Code)
//! attribute comes out with correct `max_stack` and `max_locals`.
//!
//! ### Analysis
//!
//! For existing method bodies, [`compute_max_stack`] recovers the maximum operand stack depth by
//! following every control flow path through the bytecode.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod bytecode;
pub mod opcodes;
mod stack_depth;

pub use bytecode::*;
pub use stack_depth::*;
