use crate::jvm::class_file::{Constant, ConstantIndex};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// Input bytes do not describe a valid structure (bad magic, truncated stream, invalid tag)
    MalformedInput(String),

    /// Constant pool reference outside of `[1, size)` or pointing at a padding slot
    IndexOutOfRange(ConstantIndex),

    /// Constant pool reference to a constant of the wrong kind
    ConstantTypeMismatch {
        index: ConstantIndex,
        expected: &'static str,
    },

    /// Bytecode could not be analyzed
    VerificationError {
        offset: usize,
        kind: VerifierErrorKind,
    },

    /// Value that cannot be (re-)encoded in the class file format
    UnsupportedConstruct(String),

    ConstantPoolOverflow {
        constant: Constant,
        offset: usize,
    },

    /// Class file has been compacted or pruned and is no longer editable
    Frozen,

    /// A field or method with the same name and descriptor already exists
    DuplicateMember {
        name: String,
        descriptor: String,
    },

    /// The class source does not have a class by that name
    ClassNotFound(String),

    IoError(io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierErrorKind {
    /// Stack depth drops below zero
    StackUnderflow,

    /// Two control flow paths reach the same offset with different stack depths
    ConflictingDepths { expected: usize, found: usize },

    /// A subroutine is called (or returns) at inconsistent stack depths
    SubroutineDepth { expected: usize, found: usize },

    /// Branch target is outside of the code array
    InvalidBranchTarget(i64),

    /// Instruction runs past the end of the code array
    TruncatedInstruction,

    /// Code array has no instructions at all
    EmptyCode,

    UnknownOpcode(u8),

    /// Descriptor of a field or method operand could not be parsed
    BadDescriptor(String),
}

impl Error {
    /// Convert an error from reading an in-memory buffer
    ///
    /// Running out of bytes means the input is truncated, which is malformed input.
    pub fn from_read(err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::MalformedInput(String::from("unexpected end of input"))
        } else {
            Error::IoError(err)
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            Error::IndexOutOfRange(index) => {
                write!(f, "constant pool index #{} is out of range", index.0)
            }
            Error::ConstantTypeMismatch { index, expected } => {
                write!(f, "constant pool index #{} is not a {}", index.0, expected)
            }
            Error::VerificationError { offset, kind } => {
                write!(f, "verification error at offset {}: {:?}", offset, kind)
            }
            Error::UnsupportedConstruct(msg) => write!(f, "unsupported construct: {}", msg),
            Error::ConstantPoolOverflow { constant, offset } => {
                write!(f, "constant pool overflow adding {:?} at #{}", constant, offset)
            }
            Error::Frozen => f.write_str("class file is frozen (compacted or pruned)"),
            Error::DuplicateMember { name, descriptor } => {
                write!(f, "duplicate member {}{}", name, descriptor)
            }
            Error::ClassNotFound(name) => write!(f, "class not found: {}", name),
            Error::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
