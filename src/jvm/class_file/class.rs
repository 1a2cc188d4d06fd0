use crate::jvm::class_file::{
    Attribute, AttributeTable, ClassConstantIndex, ConstantIndex, ConstantPool, Deserialize, Field,
    Method, Serialize, SourceFile, Version,
};
use crate::jvm::class_source::ClassSource;
use crate::jvm::descriptors::{to_binary_name, ClassRenames};
use crate::jvm::{ClassAccessFlags, Error};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Whether a class file can still be edited
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EditState {
    Editable,

    /// Constant pool was compacted, so no further edits are allowed until defrosting
    Compacted,

    /// Attributes (including method bodies) were pruned: this is final
    Pruned,
}

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Index 0 only for `java/lang/Object`
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: AttributeTable,
    edit_state: EditState,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Superclass used when none is specified
    const OBJECT: &'static str = "java/lang/Object";

    /// Fresh class with no members
    ///
    /// Names can be binary (`foo/Bar`) or qualified (`foo.Bar`). Without a superclass,
    /// `java/lang/Object` is used.
    pub fn new(
        access_flags: ClassAccessFlags,
        name: &str,
        super_name: Option<&str>,
    ) -> Result<ClassFile, Error> {
        let mut constants = ConstantPool::new();
        let name = to_binary_name(name);
        let this_class = constants.add_class(&name)?;
        let super_class = match super_name {
            Some(super_name) => constants.add_class(super_name)?,
            None if name == ClassFile::OBJECT => ClassConstantIndex(ConstantIndex(0)),
            None => constants.add_class(ClassFile::OBJECT)?,
        };
        Ok(ClassFile {
            version: Version::JAVA8,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: AttributeTable::new(),
            edit_state: EditState::Editable,
        })
    }

    /// Decode a class file
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        ClassFile::from_bytes(bytes)
    }

    /// Find and decode a class in a class source
    pub fn load(source: &impl ClassSource, name: &str) -> Result<ClassFile, Error> {
        let bytes = source.open(name)?;
        ClassFile::parse(&bytes)
    }

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        log::debug!("Saved class to {}", path.display());
        Ok(())
    }

    pub fn edit_state(&self) -> EditState {
        self.edit_state
    }

    fn check_editable(&self) -> Result<(), Error> {
        match self.edit_state {
            EditState::Editable => Ok(()),
            EditState::Compacted | EditState::Pruned => Err(Error::Frozen),
        }
    }

    /// Binary name of the class
    pub fn name(&self) -> Result<&str, Error> {
        self.constants.class_name(self.this_class)
    }

    /// Binary name of the superclass (`None` only for `java/lang/Object`)
    pub fn super_class_name(&self) -> Result<Option<&str>, Error> {
        if self.super_class.0 .0 == 0 {
            Ok(None)
        } else {
            self.constants.class_name(self.super_class).map(Some)
        }
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, Error> {
        self.interfaces
            .iter()
            .map(|interface| self.constants.class_name(*interface))
            .collect()
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn set_super_class(&mut self, name: &str) -> Result<(), Error> {
        self.check_editable()?;
        self.super_class = self.constants.add_class(name)?;
        Ok(())
    }

    /// Add an interface (nothing happens if the interface is already there)
    pub fn add_interface(&mut self, name: &str) -> Result<(), Error> {
        self.check_editable()?;
        let interface = self.constants.add_class(name)?;
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        Ok(())
    }

    /// Add a field, whose names must be in this class' constant pool
    pub fn add_field(&mut self, field: Field) -> Result<(), Error> {
        self.check_editable()?;
        let name = field.name(&self.constants)?;
        if self.field(name)?.is_some() {
            return Err(Error::DuplicateMember {
                name: name.to_owned(),
                descriptor: field.descriptor(&self.constants)?.to_owned(),
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Add a method, whose names must be in this class' constant pool
    pub fn add_method(&mut self, method: Method) -> Result<(), Error> {
        self.check_editable()?;
        let name = method.name(&self.constants)?;
        let descriptor = method.descriptor(&self.constants)?;
        if self.method(name, descriptor)?.is_some() {
            return Err(Error::DuplicateMember {
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
            });
        }
        self.methods.push(method);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Result<Option<&Field>, Error> {
        for field in &self.fields {
            if field.name(&self.constants)? == name {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Result<Option<&Method>, Error> {
        for method in &self.methods {
            if method.name(&self.constants)? == name
                && method.descriptor(&self.constants)? == descriptor
            {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Result<Option<&mut Method>, Error> {
        let mut found = None;
        for (idx, method) in self.methods.iter().enumerate() {
            if method.name(&self.constants)? == name
                && method.descriptor(&self.constants)? == descriptor
            {
                found = Some(idx);
                break;
            }
        }
        Ok(found.map(move |idx| &mut self.methods[idx]))
    }

    /// Add a class attribute (replacing any existing one with the same name)
    pub fn add_attribute(&mut self, attribute: Attribute) -> Result<(), Error> {
        self.check_editable()?;
        self.attributes.add(&self.constants, attribute)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(&self.constants, name)
    }

    /// Name of the source file, from the `SourceFile` attribute
    pub fn source_file(&self) -> Result<Option<&str>, Error> {
        match self.attributes.typed::<SourceFile>(&self.constants)? {
            None => Ok(None),
            Some(SourceFile(name)) => self.constants.utf8(name).map(Some),
        }
    }

    /// Rename one class everywhere it is mentioned
    pub fn rename_class(&mut self, old_name: &str, new_name: &str) -> Result<(), Error> {
        let mut renames = ClassRenames::new();
        renames.insert(to_binary_name(old_name), to_binary_name(new_name));
        self.rename_classes(&renames)
    }

    /// Rename classes everywhere they are mentioned
    ///
    /// This covers class constants, member descriptors, and type names embedded in signatures,
    /// annotations, and local variable tables. Stack map frames refer to classes through class
    /// constants, so they follow automatically.
    pub fn rename_classes(&mut self, renames: &ClassRenames) -> Result<(), Error> {
        self.check_editable()?;
        if renames.is_empty() {
            return Ok(());
        }
        log::debug!("Renaming {} classes", renames.len());
        self.constants.rename_classes(renames)?;
        for field in &mut self.fields {
            field.rename_classes(&mut self.constants, renames)?;
        }
        for method in &mut self.methods {
            method.rename_classes(&mut self.constants, renames)?;
        }
        self.attributes.rename_classes(&mut self.constants, renames)?;
        Ok(())
    }

    /// Rebuild the constant pool with only the constants still in use
    ///
    /// The class is frozen afterwards (see [`ClassFile::defrost`]).
    pub fn compact(&mut self) -> Result<(), Error> {
        if self.edit_state == EditState::Pruned {
            return Err(Error::Frozen);
        }
        let before = self.constants.size();
        let src = &self.constants;
        let no_renames = ClassRenames::new();
        let mut dest = ConstantPool::new();

        // `ldc` operands go first so that they stay below 256
        let mut ldc_constants = vec![];
        for method in &self.methods {
            if let Some(code) = method.code(src)? {
                for index in code.ldc_constants()? {
                    if !ldc_constants.contains(&index) {
                        ldc_constants.push(index);
                    }
                }
            }
        }
        src.copy_entries_leading(&ldc_constants, &mut dest, &no_renames)?;

        let this_class = src.copy_class(self.this_class, &mut dest, &no_renames)?;
        let super_class = src.copy_class(self.super_class, &mut dest, &no_renames)?;
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| src.copy_class(*interface, &mut dest, &no_renames))
            .collect::<Result<_, _>>()?;
        let fields = self
            .fields
            .iter()
            .map(|field| field.copy(src, &mut dest, &no_renames))
            .collect::<Result<_, _>>()?;
        let methods = self
            .methods
            .iter()
            .map(|method| method.copy(src, &mut dest, &no_renames))
            .collect::<Result<_, _>>()?;
        let attributes = self.attributes.copy(src, &mut dest, &no_renames)?;

        log::debug!("Compacted constant pool from {} to {} slots", before, dest.size());
        dest.invalidate_interning();
        self.constants = dest;
        self.this_class = this_class;
        self.super_class = super_class;
        self.interfaces = interfaces;
        self.fields = fields;
        self.methods = methods;
        self.attributes = attributes;
        self.edit_state = EditState::Compacted;
        Ok(())
    }

    /// Compact the constant pool, dropping all but a few attributes
    ///
    /// Only annotations, signatures, constant values, and declared exceptions survive. Method
    /// bodies are dropped, so the result is only good for compiling against. Pruning an already
    /// pruned class does nothing.
    pub fn prune(&mut self) -> Result<(), Error> {
        if self.edit_state == EditState::Pruned {
            return Ok(());
        }
        let before = self.constants.size();
        let src = &self.constants;
        let no_renames = ClassRenames::new();
        let mut dest = ConstantPool::new();

        let this_class = src.copy_class(self.this_class, &mut dest, &no_renames)?;
        let super_class = src.copy_class(self.super_class, &mut dest, &no_renames)?;
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| src.copy_class(*interface, &mut dest, &no_renames))
            .collect::<Result<_, _>>()?;
        let fields = self
            .fields
            .iter()
            .map(|field| field.prune(src, &mut dest))
            .collect::<Result<_, _>>()?;
        let methods = self
            .methods
            .iter()
            .map(|method| method.prune(src, &mut dest))
            .collect::<Result<_, _>>()?;
        let attributes = self.attributes.prune(src, &mut dest)?;

        log::debug!("Pruned constant pool from {} to {} slots", before, dest.size());
        dest.invalidate_interning();
        self.constants = dest;
        self.this_class = this_class;
        self.super_class = super_class;
        self.interfaces = interfaces;
        self.fields = fields;
        self.methods = methods;
        self.attributes = attributes;
        self.edit_state = EditState::Pruned;
        Ok(())
    }

    /// Allow edits again after compaction (pruned classes stay frozen)
    pub fn defrost(&mut self) -> Result<(), Error> {
        match self.edit_state {
            EditState::Pruned => Err(Error::Frozen),
            EditState::Editable | EditState::Compacted => {
                self.edit_state = EditState::Editable;
                Ok(())
            }
        }
    }

    /// Binary names of all classes referenced from the constant pool (sorted, without
    /// duplicates)
    pub fn referenced_classes(&self) -> Result<Vec<String>, Error> {
        let names: BTreeSet<String> = self
            .constants
            .referenced_class_names()?
            .into_iter()
            .collect();
        Ok(names.into_iter().collect())
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let mut magic = [0; 4];
        reader.read_exact(&mut magic).map_err(Error::from_read)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::MalformedInput(format!(
                "bad magic number {:02X?}",
                magic
            )));
        }
        let version = Version::deserialize(reader)?;
        let constants = ConstantPool::deserialize(reader)?;
        log::debug!(
            "Decoding class file version {}.{} with {} constant slots",
            version.major_version,
            version.minor_version,
            constants.size()
        );
        Ok(ClassFile {
            version,
            constants,
            access_flags: ClassAccessFlags::deserialize(reader)?,
            this_class: ClassConstantIndex::deserialize(reader)?,
            super_class: ClassConstantIndex::deserialize(reader)?,
            interfaces: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
            attributes: AttributeTable::deserialize(reader)?,
            edit_state: EditState::Editable,
        })
    }
}
