//! Read, edit, and write JVM classes
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Greeter {
//!     public static String greet() {
//!         return "hello";
//!     }
//! }
//! ```
//!
//! Generating an analogous class file, then renaming the class in it, can be done as follows:
//!
//! ```
//! use classedit::jvm::class_file::{ClassFile, Method, Serialize};
//! use classedit::jvm::code::{opcodes, Bytecode};
//! use classedit::jvm::*;
//!
//! # fn generate_class() -> Result<(), Error> {
//! let mut class = ClassFile::new(ClassAccessFlags::PUBLIC, "me.alec.Greeter", None)?;
//!
//! // Generate the method body
//! let mut code = Bytecode::new(&mut class.constants, true, "()Ljava/lang/String;")?;
//! code.add_string_constant("hello")?;
//! code.add_opcode(opcodes::ARETURN);
//! let code = code.finish()?;
//! assert_eq!(code.max_stack, 1);
//!
//! // Add the method to the class
//! let mut greet = Method::new(
//!     &mut class.constants,
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     "greet",
//!     "()Ljava/lang/String;",
//! )?;
//! greet.set_code(&mut class.constants, &code)?;
//! class.add_method(greet)?;
//!
//! // Edit, then shrink the constant pool down to what is still used
//! class.rename_class("me.alec.Greeter", "me.alec.Welcomer")?;
//! class.compact()?;
//!
//! // Finally, encode the class into bytes
//! let class_bytes: Vec<u8> = class.to_bytes()?;
//! assert_eq!(ClassFile::parse(&class_bytes)?.name()?, "me/alec/Welcomer");
//! # Ok(())
//! # }
//! # generate_class().unwrap();
//! ```

mod access_flags;
pub mod class_file;
pub mod class_source;
pub mod code;
pub mod descriptors;
mod errors;
pub mod verifier;

pub use access_flags::*;
pub use errors::*;
