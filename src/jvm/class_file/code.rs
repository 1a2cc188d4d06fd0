use crate::jvm::class_file::{
    copy_utf8_descriptor, rename_utf8_descriptor, AttributeLike, AttributeTable,
    ClassConstantIndex, ConstantIndex, ConstantPool, Deserialize, Serialize, Utf8ConstantIndex,
    read_bytes, serialize_len,
};
use crate::jvm::code::opcodes::*;
use crate::jvm::code::compute_max_stack;
use crate::jvm::descriptors::ClassRenames;
use crate::jvm::verifier::{is_shifted, shifted_offset, StackMap, StackMapTable};
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method body
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: BytecodeArray,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: AttributeTable,
}

impl Code {
    /// Recompute the maximum operand stack depth from the bytecode
    pub fn compute_max_stack(&self, constants: &ConstantPool) -> Result<u16, Error> {
        compute_max_stack(&self.code_array.0, &self.exception_table, constants)
    }

    /// Shift every bytecode offset stored alongside the code
    ///
    /// This covers the exception table, the stack map attributes, the line number table, and the
    /// local variable tables. Offsets after `at` move by `gap` (offsets at `at` too, when
    /// `inclusive`). The bytecode itself is left alone. Nothing is modified if any offset would
    /// leave the range of the code array.
    pub fn shift_offsets(
        &mut self,
        constants: &ConstantPool,
        at: usize,
        gap: i32,
        inclusive: bool,
    ) -> Result<(), Error> {
        let shift = |pc: BytecodeIndex| -> Result<BytecodeIndex, Error> {
            if is_shifted(pc.0 as usize, at, inclusive) {
                Ok(BytecodeIndex(shifted_offset(pc.0 as usize, gap)? as u16))
            } else {
                Ok(pc)
            }
        };

        let mut exception_table = self.exception_table.clone();
        for handler in &mut exception_table {
            handler.start_pc = shift(handler.start_pc)?;
            handler.end_pc = shift(handler.end_pc)?;
            handler.handler_pc = shift(handler.handler_pc)?;
        }

        let mut stack_map_table = self.attributes.typed::<StackMapTable>(constants)?;
        if let Some(table) = &mut stack_map_table {
            table.shift_offsets(at, gap, inclusive)?;
        }
        let mut stack_map = self.attributes.typed::<StackMap>(constants)?;
        if let Some(map) = &mut stack_map {
            map.shift_offsets(at, gap, inclusive)?;
        }
        let mut line_numbers = self.attributes.typed::<LineNumberTable>(constants)?;
        if let Some(lines) = &mut line_numbers {
            for line in &mut lines.0 {
                line.start_pc = shift(line.start_pc)?;
            }
        }
        let mut local_variables = self.attributes.typed::<LocalVariableTable>(constants)?;
        if let Some(locals) = &mut local_variables {
            for local in &mut locals.0 {
                local.shift(&shift)?;
            }
        }
        let mut local_variable_types = self.attributes.typed::<LocalVariableTypeTable>(constants)?;
        if let Some(locals) = &mut local_variable_types {
            for local in &mut locals.0 {
                local.shift(&shift)?;
            }
        }

        let stack_map_table = stack_map_table.map(|a| a.to_bytes()).transpose()?;
        let stack_map = stack_map.map(|a| a.to_bytes()).transpose()?;
        let line_numbers = line_numbers.map(|a| a.to_bytes()).transpose()?;
        let local_variables = local_variables.map(|a| a.to_bytes()).transpose()?;
        let local_variable_types = local_variable_types.map(|a| a.to_bytes()).transpose()?;

        self.exception_table = exception_table;
        self.replace_attribute(constants, StackMapTable::NAME, stack_map_table);
        self.replace_attribute(constants, StackMap::NAME, stack_map);
        self.replace_attribute(constants, LineNumberTable::NAME, line_numbers);
        self.replace_attribute(constants, LocalVariableTable::NAME, local_variables);
        self.replace_attribute(constants, LocalVariableTypeTable::NAME, local_variable_types);
        log::debug!("Shifted code offsets after {} by {}", at, gap);
        Ok(())
    }

    /// Constants loaded by `ldc` instructions, in order of first use
    pub fn ldc_constants(&self) -> Result<Vec<ConstantIndex>, Error> {
        let code = &self.code_array.0;
        let mut constants = vec![];
        for instruction in Instructions::new(code) {
            let (offset, opcode) = instruction?;
            if opcode == LDC {
                let index = ConstantIndex(code[offset + 1] as u16);
                if !constants.contains(&index) {
                    constants.push(index);
                }
            }
        }
        Ok(constants)
    }

    fn replace_attribute(&mut self, constants: &ConstantPool, name: &str, info: Option<Vec<u8>>) {
        if let (Some(info), Some(existing)) = (info, self.attributes.get_mut(constants, name)) {
            existing.info = info;
        }
    }

    /// Copy the bytecode, remapping constant operands into `dest`
    fn copy_code_array(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<BytecodeArray, Error> {
        let original = &self.code_array.0;
        let mut code = original.clone();

        // `ldc` only has room for a 1-byte index, so its constants get copied first
        for instruction in Instructions::new(original) {
            let (offset, opcode) = instruction?;
            if opcode == LDC {
                let index = ConstantIndex(original[offset + 1] as u16);
                let copied = src.copy_entry(index, dest, renames)?;
                if copied.0 > u8::MAX as u16 {
                    return Err(Error::UnsupportedConstruct(format!(
                        "ldc at {} would need constant index {}",
                        offset, copied.0
                    )));
                }
                code[offset + 1] = copied.0 as u8;
            }
        }

        for instruction in Instructions::new(original) {
            let (offset, opcode) = instruction?;
            match opcode {
                LDC_W | LDC2_W | GETSTATIC..=INVOKEDYNAMIC | NEW | ANEWARRAY | CHECKCAST
                | INSTANCEOF | MULTIANEWARRAY => {
                    let index = u16::from_be_bytes([original[offset + 1], original[offset + 2]]);
                    let copied = src.copy_entry(ConstantIndex(index), dest, renames)?;
                    code[offset + 1..offset + 3].copy_from_slice(&copied.0.to_be_bytes());
                }
                _ => (),
            }
        }

        Ok(BytecodeArray(code))
    }
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        self.code_array.serialize(writer)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Code {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Code {
            max_stack: u16::deserialize(reader)?,
            max_locals: u16::deserialize(reader)?,
            code_array: BytecodeArray::deserialize(reader)?,
            exception_table: Vec::deserialize(reader)?,
            attributes: AttributeTable::deserialize(reader)?,
        })
    }
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let code_array = self.copy_code_array(src, dest, renames)?;
        let exception_table = self
            .exception_table
            .iter()
            .map(|handler| {
                Ok(ExceptionHandler {
                    catch_type: src.copy_class(handler.catch_type, dest, renames)?,
                    ..*handler
                })
            })
            .collect::<Result<_, Error>>()?;
        Ok(Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code_array,
            exception_table,
            attributes: self.attributes.copy(src, dest, renames)?,
        })
    }

    fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        self.attributes.rename_classes(constants, renames)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: BytecodeIndex,

    /// End of exception handler range (exclusive)
    pub end_pc: BytecodeIndex,

    /// Start of exception handler code
    pub handler_pc: BytecodeIndex,

    /// Exception type caught, or index 0 to catch everything
    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ExceptionHandler {
            start_pc: BytecodeIndex::deserialize(reader)?,
            end_pc: BytecodeIndex::deserialize(reader)?,
            handler_pc: BytecodeIndex::deserialize(reader)?,
            catch_type: ClassConstantIndex::deserialize(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BytecodeArray(pub Vec<u8>);

impl Serialize for BytecodeArray {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        // Bytecode length is 4 bytes
        serialize_len::<u32, W>(self.0.len(), writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl Deserialize for BytecodeArray {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let len = u32::deserialize(reader)?;
        Ok(BytecodeArray(read_bytes(reader, len as usize)?))
    }
}

/// Index into `BytecodeArray`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytecodeIndex(pub u16);

impl Serialize for BytecodeIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for BytecodeIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(BytecodeIndex(u16::deserialize(reader)?))
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineNumberTable(pub Vec<LineNumber>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: BytecodeIndex,
    pub line_number: u16,
}

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";

    fn copy(
        &self,
        _src: &ConstantPool,
        _dest: &mut ConstantPool,
        _renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(self.clone())
    }
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        serialize_len::<u16, W>(self.0.len(), writer)?;
        for line in &self.0 {
            line.start_pc.serialize(writer)?;
            line.line_number.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for LineNumberTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u16::deserialize(reader)?;
        let mut lines = Vec::with_capacity(count as usize);
        for _ in 0..count {
            lines.push(LineNumber {
                start_pc: BytecodeIndex::deserialize(reader)?,
                line_number: u16::deserialize(reader)?,
            });
        }
        Ok(LineNumberTable(lines))
    }
}

/// Entry in a `LocalVariableTable` or `LocalVariableTypeTable`
///
/// The `descriptor` is a field descriptor in the first and a field signature in the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: BytecodeIndex,
    pub length: u16,
    pub name: Utf8ConstantIndex,
    pub descriptor: Utf8ConstantIndex,
    pub index: u16,
}

impl LocalVariable {
    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<LocalVariable, Error> {
        Ok(LocalVariable {
            name: src.copy_utf8(self.name, dest)?,
            descriptor: copy_utf8_descriptor(self.descriptor, src, dest, renames)?,
            ..*self
        })
    }

    /// Shift start and end of the live range separately
    fn shift(
        &mut self,
        shift: &impl Fn(BytecodeIndex) -> Result<BytecodeIndex, Error>,
    ) -> Result<(), Error> {
        let end = self.start_pc.0 as usize + self.length as usize;
        let start = shift(self.start_pc)?;
        let end = if end > u16::MAX as usize {
            end
        } else {
            shift(BytecodeIndex(end as u16))?.0 as usize
        };
        self.start_pc = start;
        self.length = end.saturating_sub(start.0 as usize) as u16;
        Ok(())
    }
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.index.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LocalVariable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(LocalVariable {
            start_pc: BytecodeIndex::deserialize(reader)?,
            length: u16::deserialize(reader)?,
            name: Utf8ConstantIndex::deserialize(reader)?,
            descriptor: Utf8ConstantIndex::deserialize(reader)?,
            index: u16::deserialize(reader)?,
        })
    }
}

macro_rules! local_variables_attribute {
    ($(#[$meta:meta])* $attribute:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $attribute(pub Vec<LocalVariable>);

        impl AttributeLike for $attribute {
            const NAME: &'static str = stringify!($attribute);

            fn copy(
                &self,
                src: &ConstantPool,
                dest: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<Self, Error> {
                let locals = self
                    .0
                    .iter()
                    .map(|local| local.copy(src, dest, renames))
                    .collect::<Result<_, _>>()?;
                Ok($attribute(locals))
            }

            fn rename_classes(
                &mut self,
                constants: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<bool, Error> {
                let mut changed = false;
                for local in &mut self.0 {
                    let renamed = rename_utf8_descriptor(constants, local.descriptor, renames)?;
                    changed |= renamed != local.descriptor;
                    local.descriptor = renamed;
                }
                Ok(changed)
            }
        }

        impl Serialize for $attribute {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $attribute {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                Ok($attribute(Vec::deserialize(reader)?))
            }
        }
    };
}

local_variables_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
    LocalVariableTable
);
local_variables_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.14
    LocalVariableTypeTable
);

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::verifier::{StackMapFrame, VerificationType};

    fn sample_code(pool: &mut ConstantPool) -> Code {
        let this = pool.add_utf8("this").unwrap();
        let descriptor = pool.add_utf8("Lfoo/Bar;").unwrap();
        let mut attributes = AttributeTable::new();
        attributes
            .set(
                pool,
                &LineNumberTable(vec![
                    LineNumber {
                        start_pc: BytecodeIndex(0),
                        line_number: 10,
                    },
                    LineNumber {
                        start_pc: BytecodeIndex(4),
                        line_number: 11,
                    },
                ]),
            )
            .unwrap();
        attributes
            .set(
                pool,
                &LocalVariableTable(vec![LocalVariable {
                    start_pc: BytecodeIndex(0),
                    length: 8,
                    name: this,
                    descriptor,
                    index: 0,
                }]),
            )
            .unwrap();
        attributes
            .set(
                pool,
                &StackMapTable(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 4 }]),
            )
            .unwrap();
        Code {
            max_stack: 1,
            max_locals: 1,
            code_array: BytecodeArray(vec![NOP; 8]),
            exception_table: vec![ExceptionHandler {
                start_pc: BytecodeIndex(0),
                end_pc: BytecodeIndex(4),
                handler_pc: BytecodeIndex(4),
                catch_type: ClassConstantIndex(ConstantIndex(0)),
            }],
            attributes,
        }
    }

    #[test]
    fn shift_everything() {
        let mut pool = ConstantPool::new();
        let mut code = sample_code(&mut pool);
        code.shift_offsets(&pool, 4, 3, true).unwrap();

        let handler = code.exception_table[0];
        assert_eq!(handler.start_pc, BytecodeIndex(0));
        assert_eq!(handler.end_pc, BytecodeIndex(7));
        assert_eq!(handler.handler_pc, BytecodeIndex(7));

        let lines = code.attributes.typed::<LineNumberTable>(&pool).unwrap().unwrap();
        assert_eq!(lines.0[1].start_pc, BytecodeIndex(7));

        let locals = code.attributes.typed::<LocalVariableTable>(&pool).unwrap().unwrap();
        assert_eq!(locals.0[0].start_pc, BytecodeIndex(0));
        assert_eq!(locals.0[0].length, 11);

        let frames = code.attributes.typed::<StackMapTable>(&pool).unwrap().unwrap();
        assert_eq!(frames.absolute_offsets(), vec![7]);
    }

    #[test]
    fn failed_shift_changes_nothing() {
        let mut pool = ConstantPool::new();
        let mut code = sample_code(&mut pool);
        let before = code.clone();
        assert!(code.shift_offsets(&pool, 0, -8, false).is_err());
        assert_eq!(code, before);
    }

    #[test]
    fn copy_remaps_bytecode() {
        let mut src = ConstantPool::new();
        for i in 0..10 {
            src.add_integer(i).unwrap();
        }
        let string = src.add_string("hello").unwrap();
        let class = src.add_class("foo/Bar").unwrap();
        let field = src.add_field_ref("foo/Bar", "x", "I").unwrap();
        assert!(string.0 <= u8::MAX as u16);

        let mut bytes = vec![LDC, string.0 as u8, NEW];
        bytes.extend_from_slice(&class.0 .0.to_be_bytes());
        bytes.push(GETSTATIC);
        bytes.extend_from_slice(&field.0.to_be_bytes());
        bytes.push(RETURN);
        let mut attributes = AttributeTable::new();
        attributes
            .set(
                &mut src,
                &StackMapTable(vec![StackMapFrame::SameLocalsOneStack {
                    offset_delta: 2,
                    stack: VerificationType::Object(class),
                }]),
            )
            .unwrap();
        let code = Code {
            max_stack: 2,
            max_locals: 0,
            code_array: BytecodeArray(bytes),
            exception_table: vec![],
            attributes,
        };

        let mut renames = ClassRenames::new();
        renames.insert(String::from("foo/Bar"), String::from("baz/Qux"));
        let mut dest = ConstantPool::new();
        let copied = code.copy(&src, &mut dest, &renames).unwrap();
        let out = &copied.code_array.0;

        assert_eq!(dest.string(ConstantIndex(out[1] as u16)).unwrap(), "hello");
        let new_index = u16::from_be_bytes([out[3], out[4]]);
        assert_eq!(dest.class_name(ConstantIndex(new_index)).unwrap(), "baz/Qux");
        let field_index = u16::from_be_bytes([out[6], out[7]]);
        let member = dest.member_ref(ConstantIndex(field_index)).unwrap();
        assert_eq!(member.class_name, "baz/Qux");
        assert_eq!(member.name, "x");

        let frames = copied.attributes.typed::<StackMapTable>(&dest).unwrap().unwrap();
        match &frames.0[0] {
            StackMapFrame::SameLocalsOneStack {
                stack: VerificationType::Object(class),
                ..
            } => assert_eq!(dest.class_name(*class).unwrap(), "baz/Qux"),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn rename_local_variable_descriptors() {
        let mut pool = ConstantPool::new();
        let mut code = sample_code(&mut pool);
        let mut renames = ClassRenames::new();
        renames.insert(String::from("foo/Bar"), String::from("baz/Qux"));
        assert!(code.rename_classes(&mut pool, &renames).unwrap());
        let locals = code.attributes.typed::<LocalVariableTable>(&pool).unwrap().unwrap();
        assert_eq!(pool.utf8(locals.0[0].descriptor).unwrap(), "Lbaz/Qux;");
        assert_eq!(pool.utf8(locals.0[0].name).unwrap(), "this");
    }
}
