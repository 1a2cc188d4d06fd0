use crate::jvm::class_file::{
    copy_utf8_descriptor, rename_utf8_descriptor, Attribute, AttributeTable, Code, ConstantPool,
    Deserialize, Exceptions, Serialize, Utf8ConstantIndex,
};
use crate::jvm::descriptors::ClassRenames;
use crate::jvm::{Error, MethodAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: AttributeTable,
}

impl Method {
    pub fn new(
        constants: &mut ConstantPool,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Result<Method, Error> {
        Ok(Method {
            access_flags,
            name_index: constants.add_utf8(name)?,
            descriptor_index: constants.add_utf8(descriptor)?,
            attributes: AttributeTable::new(),
        })
    }

    pub fn name<'a>(&self, constants: &'a ConstantPool) -> Result<&'a str, Error> {
        constants.utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, constants: &'a ConstantPool) -> Result<&'a str, Error> {
        constants.utf8(self.descriptor_index)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Decoded method body, if the method has one
    pub fn code(&self, constants: &ConstantPool) -> Result<Option<Code>, Error> {
        self.attributes.typed::<Code>(constants)
    }

    pub fn set_code(&mut self, constants: &mut ConstantPool, code: &Code) -> Result<(), Error> {
        self.attributes.set(constants, code)
    }

    /// Checked exceptions declared with `throws`
    pub fn exceptions(&self, constants: &ConstantPool) -> Result<Option<Exceptions>, Error> {
        self.attributes.typed::<Exceptions>(constants)
    }

    pub fn add_attribute(&mut self, constants: &ConstantPool, attribute: Attribute) -> Result<(), Error> {
        self.attributes.add(constants, attribute)
    }

    pub(crate) fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Method, Error> {
        Ok(Method {
            access_flags: self.access_flags,
            name_index: src.copy_utf8(self.name_index, dest)?,
            descriptor_index: copy_utf8_descriptor(self.descriptor_index, src, dest, renames)?,
            attributes: self.attributes.copy(src, dest, renames)?,
        })
    }

    pub(crate) fn prune(&self, src: &ConstantPool, dest: &mut ConstantPool) -> Result<Method, Error> {
        Ok(Method {
            access_flags: self.access_flags,
            name_index: src.copy_utf8(self.name_index, dest)?,
            descriptor_index: src.copy_utf8(self.descriptor_index, dest)?,
            attributes: self.attributes.prune(src, dest)?,
        })
    }

    pub(crate) fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<(), Error> {
        self.descriptor_index = rename_utf8_descriptor(constants, self.descriptor_index, renames)?;
        self.attributes.rename_classes(constants, renames)?;
        Ok(())
    }
}

impl Serialize for Method {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Method {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: AttributeTable::deserialize(reader)?,
        })
    }
}
