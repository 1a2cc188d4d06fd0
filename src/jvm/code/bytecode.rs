use crate::jvm::class_file::{
    AttributeTable, BytecodeArray, BytecodeIndex, ClassConstantIndex, Code, ConstantIndex,
    ConstantPool, ExceptionHandler,
};
use crate::jvm::code::opcodes::*;
use crate::jvm::descriptors::{BaseType, FieldType, MethodDescriptor, ParseDescriptor};
use crate::jvm::Error;
use crate::util::Width;

/// Assembler for a method body
///
/// Bytes are appended at the end of the buffer and the operand stack depth is tracked along the
/// way, so that `max_stack` is known once the body is complete. Since the simulated depth follows
/// straight-line emission, callers emitting unconditional jumps should reset it with
/// [`Bytecode::set_stack_depth`] at the next branch target.
///
/// Offsets returned by the emitters stay valid for the lifetime of the assembler, which is what
/// makes it possible to emit a branch with a placeholder and patch it later using
/// [`Bytecode::write_u16_at`].
pub struct Bytecode<'p> {
    /// Constant pool of the class owning the method
    pub constants: &'p mut ConstantPool,

    code: Vec<u8>,
    stack_depth: i32,
    max_stack: i32,
    max_locals: u16,
    exception_table: Vec<ExceptionHandler>,
}

/// Which of the 5 typed variants of loads, stores, and returns to use
fn type_offset(field_type: &FieldType) -> u8 {
    match field_type {
        FieldType::Base(BaseType::Long) => 1,
        FieldType::Base(BaseType::Float) => 2,
        FieldType::Base(BaseType::Double) => 3,
        FieldType::Base(_) => 0,
        FieldType::Ref(_) => 4,
    }
}

fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, Error> {
    MethodDescriptor::parse(descriptor).map_err(|err| {
        Error::MalformedInput(format!("bad method descriptor {:?}: {}", descriptor, err))
    })
}

fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, Error> {
    FieldType::parse(descriptor).map_err(|err| {
        Error::MalformedInput(format!("bad field descriptor {:?}: {}", descriptor, err))
    })
}

impl<'p> Bytecode<'p> {
    /// Start a method body
    ///
    /// The parameters of the method (and the receiver, for instance methods) are already in the
    /// local variables.
    pub fn new(
        constants: &'p mut ConstantPool,
        is_static: bool,
        descriptor: &str,
    ) -> Result<Bytecode<'p>, Error> {
        let descriptor = parse_method_descriptor(descriptor)?;
        let receiver = if is_static { 0 } else { 1 };
        Ok(Bytecode {
            constants,
            code: vec![],
            stack_depth: 0,
            max_stack: 0,
            max_locals: (descriptor.parameter_width() + receiver) as u16,
            exception_table: vec![],
        })
    }

    /// Offset at which the next byte will be emitted
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn stack_depth(&self) -> i32 {
        self.stack_depth
    }

    /// Override the simulated stack depth (eg. at a branch target after an unconditional jump)
    pub fn set_stack_depth(&mut self, depth: i32) {
        self.stack_depth = depth;
        self.max_stack = self.max_stack.max(depth);
    }

    pub fn max_stack(&self) -> i32 {
        self.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Make sure `max_locals` covers a local of `width` slots at `index`
    pub fn use_local(&mut self, index: u16, width: u16) {
        self.max_locals = self.max_locals.max(index.saturating_add(width));
    }

    pub fn add_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    pub fn add_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    pub fn add_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Append `length` zero bytes and return the offset of the first one
    pub fn add_gap(&mut self, length: usize) -> usize {
        let offset = self.code.len();
        self.code.resize(offset + length, 0);
        offset
    }

    pub fn write_u16_at(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        self.write_at(offset, &value.to_be_bytes())
    }

    pub fn write_u32_at(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        self.write_at(offset, &value.to_be_bytes())
    }

    fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let len = self.code.len();
        match self.code.get_mut(offset..offset + bytes.len()) {
            Some(slot) => {
                slot.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(Error::UnsupportedConstruct(format!(
                "cannot write {} bytes at {} in code of length {}",
                bytes.len(),
                offset,
                len
            ))),
        }
    }

    /// Append an opcode, applying its stack effect if it does not depend on operands
    pub fn add_opcode(&mut self, opcode: u8) {
        self.code.push(opcode);
        if let Some(grow) = info(opcode).and_then(|info| info.stack_grow) {
            self.grow_stack(grow as isize);
        }
    }

    /// Adjust the simulated stack depth (raising `max_stack` if needed)
    pub fn grow_stack(&mut self, delta: isize) {
        self.stack_depth += delta as i32;
        self.max_stack = self.max_stack.max(self.stack_depth);
    }

    fn add_indexed(&mut self, opcode: u8, index: impl Into<ConstantIndex>) {
        self.add_opcode(opcode);
        self.add_u16(index.into().0);
    }

    fn add_field_access(
        &mut self,
        opcode: u8,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        let size = parse_field_descriptor(descriptor)?.width() as isize;
        let index = self.constants.add_field_ref(class, name, descriptor)?;
        self.add_indexed(opcode, index);
        self.grow_stack(match opcode {
            GETSTATIC => size,
            PUTSTATIC => -size,
            GETFIELD => size - 1,
            _ => -size - 1,
        });
        Ok(())
    }

    pub fn add_getstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), Error> {
        self.add_field_access(GETSTATIC, class, name, descriptor)
    }

    pub fn add_putstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), Error> {
        self.add_field_access(PUTSTATIC, class, name, descriptor)
    }

    pub fn add_getfield(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), Error> {
        self.add_field_access(GETFIELD, class, name, descriptor)
    }

    pub fn add_putfield(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), Error> {
        self.add_field_access(PUTFIELD, class, name, descriptor)
    }

    pub fn add_invokevirtual(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        let delta = parse_method_descriptor(descriptor)?.stack_delta() - 1;
        let index = self.constants.add_method_ref(class, name, descriptor)?;
        self.add_indexed(INVOKEVIRTUAL, index);
        self.grow_stack(delta);
        Ok(())
    }

    /// Call a constructor, private method, or super method
    pub fn add_invokespecial(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        let delta = parse_method_descriptor(descriptor)?.stack_delta() - 1;
        let index = self.constants.add_method_ref(class, name, descriptor)?;
        self.add_indexed(INVOKESPECIAL, index);
        self.grow_stack(delta);
        Ok(())
    }

    /// Call a static method (`is_interface` for static methods on interfaces)
    pub fn add_invokestatic(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<(), Error> {
        let delta = parse_method_descriptor(descriptor)?.stack_delta();
        let index = if is_interface {
            self.constants.add_interface_method_ref(class, name, descriptor)?
        } else {
            self.constants.add_method_ref(class, name, descriptor)?
        };
        self.add_indexed(INVOKESTATIC, index);
        self.grow_stack(delta);
        Ok(())
    }

    pub fn add_invokeinterface(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        let method = parse_method_descriptor(descriptor)?;
        let index = self
            .constants
            .add_interface_method_ref(class, name, descriptor)?;
        self.add_indexed(INVOKEINTERFACE, index);

        // Argument count includes the receiver
        self.add_u8(method.parameter_width() as u8 + 1);
        self.add_u8(0);
        self.grow_stack(method.stack_delta() - 1);
        Ok(())
    }

    /// Call site whose target is given by the bootstrap method at `bootstrap_method` in the
    /// `BootstrapMethods` attribute
    pub fn add_invokedynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<(), Error> {
        let delta = parse_method_descriptor(descriptor)?.stack_delta();
        let index = self
            .constants
            .add_invoke_dynamic(bootstrap_method, name, descriptor)?;
        self.add_indexed(INVOKEDYNAMIC, index);
        self.add_u16(0);
        self.grow_stack(delta);
        Ok(())
    }

    /// Create an array of type `class` (an array descriptor), filling in `dimensions` of it
    pub fn add_multianewarray(&mut self, class: &str, dimensions: u8) -> Result<(), Error> {
        let index = self.constants.add_class(class)?;
        self.add_indexed(MULTIANEWARRAY, index);
        self.add_u8(dimensions);
        self.grow_stack(1 - dimensions as isize);
        Ok(())
    }

    /// Push a single-slot constant, using `ldc_w` when the index does not fit in a byte
    pub fn add_ldc(&mut self, index: ConstantIndex) {
        if index.0 <= u8::MAX as u16 {
            self.add_opcode(LDC);
            self.add_u8(index.0 as u8);
        } else {
            self.add_indexed(LDC_W, index);
        }
    }

    /// Push a `long` or `double` constant
    pub fn add_ldc2_w(&mut self, index: ConstantIndex) {
        self.add_indexed(LDC2_W, index);
    }

    pub fn add_iconst(&mut self, value: i32) -> Result<(), Error> {
        match value {
            -1..=5 => self.add_opcode((ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                self.add_opcode(BIPUSH);
                self.add_u8(value as i8 as u8);
            }
            -32768..=32767 => {
                self.add_opcode(SIPUSH);
                self.add_u16(value as i16 as u16);
            }
            _ => {
                let index = self.constants.add_integer(value)?;
                self.add_ldc(index);
            }
        }
        Ok(())
    }

    pub fn add_lconst(&mut self, value: i64) -> Result<(), Error> {
        match value {
            0 => self.add_opcode(LCONST_0),
            1 => self.add_opcode(LCONST_1),
            _ => {
                let index = self.constants.add_long(value)?;
                self.add_ldc2_w(index);
            }
        }
        Ok(())
    }

    pub fn add_fconst(&mut self, value: f32) -> Result<(), Error> {
        // Bit comparison keeps `-0.0` in the constant pool
        if value.to_bits() == 0.0f32.to_bits() {
            self.add_opcode(FCONST_0);
        } else if value == 1.0 {
            self.add_opcode(FCONST_1);
        } else if value == 2.0 {
            self.add_opcode(FCONST_2);
        } else {
            let index = self.constants.add_float(value)?;
            self.add_ldc(index);
        }
        Ok(())
    }

    pub fn add_dconst(&mut self, value: f64) -> Result<(), Error> {
        if value.to_bits() == 0.0f64.to_bits() {
            self.add_opcode(DCONST_0);
        } else if value == 1.0 {
            self.add_opcode(DCONST_1);
        } else {
            let index = self.constants.add_double(value)?;
            self.add_ldc2_w(index);
        }
        Ok(())
    }

    pub fn add_string_constant(&mut self, value: &str) -> Result<(), Error> {
        let index = self.constants.add_string(value)?;
        self.add_ldc(index);
        Ok(())
    }

    /// Emit a local variable instruction (`iload`, `astore`, ...) in its shortest form
    fn add_local_instruction(&mut self, generic: u8, short: u8, field_type: &FieldType, index: u16) {
        let offset = type_offset(field_type);
        match index {
            0..=3 => self.add_opcode(short + 4 * offset + index as u8),
            4..=255 => {
                self.add_opcode(generic + offset);
                self.add_u8(index as u8);
            }
            _ => {
                self.add_u8(WIDE);
                self.add_opcode(generic + offset);
                self.add_u16(index);
            }
        }
        self.use_local(index, field_type.width() as u16);
    }

    pub fn add_load(&mut self, field_type: &FieldType, index: u16) {
        self.add_local_instruction(ILOAD, ILOAD_0, field_type, index);
    }

    pub fn add_store(&mut self, field_type: &FieldType, index: u16) {
        self.add_local_instruction(ISTORE, ISTORE_0, field_type, index);
    }

    pub fn add_iinc(&mut self, index: u16, increment: i16) {
        if index <= u8::MAX as u16 && i8::try_from(increment).is_ok() {
            self.add_opcode(IINC);
            self.add_u8(index as u8);
            self.add_u8(increment as i8 as u8);
        } else {
            self.add_u8(WIDE);
            self.add_opcode(IINC);
            self.add_u16(index);
            self.add_u16(increment as u16);
        }
        self.use_local(index, 1);
    }

    /// Return a value of the given type (`None` for `void`)
    pub fn add_return(&mut self, return_type: Option<&FieldType>) {
        match return_type {
            None => self.add_opcode(RETURN),
            Some(return_type) => self.add_opcode(IRETURN + type_offset(return_type)),
        }
    }

    pub fn add_new(&mut self, class: &str) -> Result<(), Error> {
        let index = self.constants.add_class(class)?;
        self.add_indexed(NEW, index);
        Ok(())
    }

    pub fn add_checkcast(&mut self, class: &str) -> Result<(), Error> {
        let index = self.constants.add_class(class)?;
        self.add_indexed(CHECKCAST, index);
        Ok(())
    }

    pub fn add_instanceof(&mut self, class: &str) -> Result<(), Error> {
        let index = self.constants.add_class(class)?;
        self.add_indexed(INSTANCEOF, index);
        Ok(())
    }

    pub fn add_anewarray(&mut self, class: &str) -> Result<(), Error> {
        let index = self.constants.add_class(class)?;
        self.add_indexed(ANEWARRAY, index);
        Ok(())
    }

    /// Load every parameter of a method descriptor onto the stack, starting at local `first`
    ///
    /// Returns the number of stack slots pushed.
    pub fn load_parameters(&mut self, descriptor: &str, first: u16) -> Result<usize, Error> {
        let method = parse_method_descriptor(descriptor)?;
        let mut index = first;
        for parameter in &method.parameters {
            self.add_load(parameter, index);
            index += parameter.width() as u16;
        }
        Ok(method.parameter_width())
    }

    /// Register a handler for exceptions thrown in `[start, end)` (`catch_type` of `None`
    /// catches everything)
    pub fn add_exception_handler(
        &mut self,
        start: u16,
        end: u16,
        handler: u16,
        catch_type: Option<&str>,
    ) -> Result<(), Error> {
        let catch_type = match catch_type {
            Some(class) => self.constants.add_class(class)?,
            None => ClassConstantIndex(ConstantIndex(0)),
        };
        self.exception_table.push(ExceptionHandler {
            start_pc: BytecodeIndex(start),
            end_pc: BytecodeIndex(end),
            handler_pc: BytecodeIndex(handler),
            catch_type,
        });
        Ok(())
    }

    /// Turn the assembled body into a `Code` attribute (with no nested attributes)
    pub fn finish(self) -> Result<Code, Error> {
        if self.code.is_empty() || self.code.len() > u16::MAX as usize {
            return Err(Error::UnsupportedConstruct(format!(
                "method body of {} bytes",
                self.code.len()
            )));
        }
        let max_stack = u16::try_from(self.max_stack.max(0)).map_err(|_| {
            Error::UnsupportedConstruct(format!("max stack of {}", self.max_stack))
        })?;
        log::debug!(
            "Assembled {} bytes of code (max stack {}, max locals {})",
            self.code.len(),
            max_stack,
            self.max_locals
        );
        Ok(Code {
            max_stack,
            max_locals: self.max_locals,
            code_array: BytecodeArray(self.code),
            exception_table: self.exception_table,
            attributes: AttributeTable::new(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::compute_max_stack;

    #[test]
    fn arithmetic() {
        let mut pool = ConstantPool::new();
        let mut bytecode = Bytecode::new(&mut pool, true, "()I").unwrap();
        bytecode.add_opcode(ICONST_1);
        bytecode.add_opcode(ICONST_2);
        bytecode.add_opcode(IADD);
        bytecode.add_return(Some(&FieldType::Base(BaseType::Int)));
        let code = bytecode.finish().unwrap();
        assert_eq!(code.code_array.0, vec![ICONST_1, ICONST_2, IADD, IRETURN]);
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 0);
    }

    #[test]
    fn constructor_call() {
        let mut pool = ConstantPool::new();
        let mut bytecode = Bytecode::new(&mut pool, false, "(JLjava/lang/String;)V").unwrap();
        assert_eq!(bytecode.max_locals(), 4);
        bytecode.add_new("foo/C").unwrap();
        bytecode.add_opcode(DUP);
        bytecode.add_invokespecial("foo/C", "<init>", "()V").unwrap();
        bytecode.add_store(&FieldType::object("foo/C"), 5);
        bytecode.add_return(None);
        let code = bytecode.finish().unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 6);
        assert_eq!(compute_max_stack(&code.code_array.0, &[], &pool).unwrap(), 2);
    }

    #[test]
    fn descriptor_dependent_deltas() {
        let mut pool = ConstantPool::new();
        let mut bytecode = Bytecode::new(&mut pool, false, "()V").unwrap();
        bytecode.add_load(&FieldType::object("foo/C"), 0);
        bytecode.add_getfield("foo/C", "x", "J").unwrap();
        assert_eq!(bytecode.stack_depth(), 2);
        bytecode.add_lconst(3).unwrap();
        bytecode.add_invokestatic("java/lang/Math", "max", "(JJ)J", false).unwrap();
        assert_eq!(bytecode.stack_depth(), 2);
        assert_eq!(bytecode.max_stack(), 4);
        bytecode.add_opcode(POP2);
        bytecode.add_load(&FieldType::object("foo/I"), 0);
        bytecode.add_iconst(1000).unwrap();
        bytecode.add_invokeinterface("foo/I", "run", "(I)V").unwrap();
        assert_eq!(bytecode.stack_depth(), 0);
        bytecode.add_return(None);
        let code = bytecode.finish().unwrap();
        assert_eq!(compute_max_stack(&code.code_array.0, &[], &pool).unwrap(), 4);
    }

    #[test]
    fn short_forms() {
        let mut pool = ConstantPool::new();
        let mut bytecode = Bytecode::new(&mut pool, true, "()V").unwrap();
        bytecode.add_iconst(-1).unwrap();
        bytecode.add_iconst(100).unwrap();
        bytecode.add_iconst(-300).unwrap();
        bytecode.add_iconst(100_000).unwrap();
        bytecode.add_load(&FieldType::Base(BaseType::Double), 2);
        bytecode.add_store(&FieldType::Base(BaseType::Float), 300);
        bytecode.add_iinc(1, -1);
        bytecode.add_iinc(1, 1000);
        let code = bytecode.code.clone();
        assert_eq!(
            code,
            vec![
                ICONST_M1,
                BIPUSH,
                100,
                SIPUSH,
                0xFE,
                0xD4,
                LDC,
                1,
                DLOAD_2,
                WIDE,
                FSTORE,
                1,
                44,
                IINC,
                1,
                0xFF,
                WIDE,
                IINC,
                0,
                1,
                0x03,
                0xE8,
            ]
        );
        assert_eq!(bytecode.max_locals(), 301);
    }

    #[test]
    fn parameters_and_handlers() {
        let mut pool = ConstantPool::new();
        let descriptor = "(IJ[Ljava/lang/Object;)V";
        let mut bytecode = Bytecode::new(&mut pool, false, descriptor).unwrap();
        assert_eq!(bytecode.load_parameters(descriptor, 1).unwrap(), 4);
        assert_eq!(bytecode.code, vec![ILOAD_1, LLOAD_2, ALOAD, 4]);

        let placeholder = bytecode.add_gap(2);
        bytecode.write_u16_at(placeholder, 0xBEEF).unwrap();
        assert_eq!(&bytecode.code[placeholder..], &[0xBE, 0xEF]);
        assert!(bytecode.write_u32_at(placeholder, 0).is_err());

        bytecode.add_exception_handler(0, 4, 4, None).unwrap();
        bytecode
            .add_exception_handler(0, 4, 4, Some("java/lang/Exception"))
            .unwrap();
        let code = bytecode.finish().unwrap();
        assert_eq!(code.exception_table[0].catch_type, ClassConstantIndex(ConstantIndex(0)));
        assert_eq!(
            pool.class_name(code.exception_table[1].catch_type).unwrap(),
            "java/lang/Exception"
        );
    }
}
