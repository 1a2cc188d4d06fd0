use crate::jvm::class_file::{
    copy_utf8_descriptor, rename_utf8_descriptor, Attribute, AttributeTable, ConstantPool,
    ConstantValue, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::descriptors::ClassRenames;
use crate::jvm::{Error, FieldAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: AttributeTable,
}

impl Field {
    pub fn new(
        constants: &mut ConstantPool,
        access_flags: FieldAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> Result<Field, Error> {
        Ok(Field {
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

    /// Initial value of a `static final` field
    pub fn constant_value(&self, constants: &ConstantPool) -> Result<Option<ConstantValue>, Error> {
        self.attributes.typed::<ConstantValue>(constants)
    }

    pub fn add_attribute(&mut self, constants: &ConstantPool, attribute: Attribute) -> Result<(), Error> {
        self.attributes.add(constants, attribute)
    }

    pub(crate) fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Field, Error> {
        Ok(Field {
            access_flags: self.access_flags,
            name_index: src.copy_utf8(self.name_index, dest)?,
            descriptor_index: copy_utf8_descriptor(self.descriptor_index, src, dest, renames)?,
            attributes: self.attributes.copy(src, dest, renames)?,
        })
    }

    pub(crate) fn prune(&self, src: &ConstantPool, dest: &mut ConstantPool) -> Result<Field, Error> {
        Ok(Field {
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

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Field {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Field {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: AttributeTable::deserialize(reader)?,
        })
    }
}
