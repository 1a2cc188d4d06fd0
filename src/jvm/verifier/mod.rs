//! Verifier stack map frames
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. This
//! information is referred to as the _stack map frame_ and the set of stack map frames for all
//! possible jump targets in a method is the _stack map table_. The "types" used in verification
//! (represented using [`VerificationType`]) are slightly augmented to take into account
//! initialization and null.
//!
//! Frames are stored in a compressed form where each frame is described relative to the previous
//! one (see [`StackMapFrame`]). Editing the bytecode of a method means the frames have to follow:
//! inserting bytes shifts frame offsets, inserting locals changes full frames, and removing a
//! `new` instruction removes the uninitialized values it created. Both the modern
//! [`StackMapTable`] and the legacy CLDC [`StackMap`] attributes support those edits.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod stack_map;
mod types;

pub use stack_map::*;
pub use types::*;
