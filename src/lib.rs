//! Decode, edit, and re-encode JVM class files

pub mod jvm;
pub mod util;
