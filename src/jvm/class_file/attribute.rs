use crate::jvm::class_file::{
    read_bytes, serialize_len, AnnotationDefault, ClassConstantIndex, Code, ConstantIndex, ConstantPool,
    Deserialize, LineNumberTable, LocalVariableTable, LocalVariableTypeTable,
    RuntimeInvisibleAnnotations, RuntimeInvisibleParameterAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations, Serialize, Utf8ConstantIndex,
};
use crate::jvm::descriptors::{rename_descriptor, ClassRenames};
use crate::jvm::verifier::{StackMap, StackMapTable};
use crate::jvm::{Error, InnerClassAccessFlags, ParameterAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// The representation is designed to be easily extended with custom attributes.
/// While some attributes aren't essential, others are really important (eg. the
/// code attribute for including the actual bytecode).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Encode a typed attribute, adding its name to the constant pool
    pub fn new<A: AttributeLike>(constants: &mut ConstantPool, attribute: &A) -> Result<Attribute, Error> {
        let name_index = constants.add_utf8(A::NAME)?;
        Ok(Attribute {
            name_index,
            info: attribute.to_bytes()?,
        })
    }

    /// Decode the attribute body as a typed attribute (the whole body must be used)
    pub fn decode<A: AttributeLike>(&self) -> Result<A, Error> {
        A::from_bytes(&self.info)
    }

    pub fn name<'a>(&self, constants: &'a ConstantPool) -> Result<&'a str, Error> {
        constants.utf8(self.name_index)
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        serialize_len::<u32, W>(self.info.len(), writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Deserialize for Attribute {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let len = u32::deserialize(reader)?;
        let info = read_bytes(reader, len as usize)?;
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into attributes.
pub trait AttributeLike: Serialize + Deserialize {
    /// Name of the attribute
    const NAME: &'static str;

    /// Copy into another constant pool, applying class renames on the way
    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error>;

    /// Rename classes mentioned in descriptors or signatures inside the attribute
    ///
    /// Returns whether anything changed. Class constants are already handled by renaming in the
    /// constant pool, so most attributes have nothing to do here.
    fn rename_classes(
        &mut self,
        _constants: &mut ConstantPool,
        _renames: &ClassRenames,
    ) -> Result<bool, Error> {
        Ok(false)
    }
}

/// Attributes kept when pruning
pub const PRUNE_ALLOW_LIST: &[&str] = &[
    RuntimeVisibleAnnotations::NAME,
    RuntimeInvisibleAnnotations::NAME,
    RuntimeVisibleParameterAnnotations::NAME,
    RuntimeInvisibleParameterAnnotations::NAME,
    AnnotationDefault::NAME,
    Signature::NAME,
    ConstantValue::NAME,
    Exceptions::NAME,
];

/// Attributes with a typed representation
pub const KNOWN_ATTRIBUTES: &[&str] = &[
    ConstantValue::NAME,
    Code::NAME,
    StackMapTable::NAME,
    StackMap::NAME,
    Exceptions::NAME,
    InnerClasses::NAME,
    EnclosingMethod::NAME,
    Synthetic::NAME,
    Signature::NAME,
    SourceFile::NAME,
    LineNumberTable::NAME,
    LocalVariableTable::NAME,
    LocalVariableTypeTable::NAME,
    Deprecated::NAME,
    RuntimeVisibleAnnotations::NAME,
    RuntimeInvisibleAnnotations::NAME,
    RuntimeVisibleParameterAnnotations::NAME,
    RuntimeInvisibleParameterAnnotations::NAME,
    AnnotationDefault::NAME,
    BootstrapMethods::NAME,
    MethodParameters::NAME,
];

/// Run a generic function on the typed attribute matching a name, or evaluate the fallback
macro_rules! with_known_attribute {
    ($name:expr, $handler:ident($($arg:expr),*), $fallback:expr) => {
        match $name {
            n if n == ConstantValue::NAME => $handler::<ConstantValue>($($arg),*),
            n if n == Code::NAME => $handler::<Code>($($arg),*),
            n if n == StackMapTable::NAME => $handler::<StackMapTable>($($arg),*),
            n if n == StackMap::NAME => $handler::<StackMap>($($arg),*),
            n if n == Exceptions::NAME => $handler::<Exceptions>($($arg),*),
            n if n == InnerClasses::NAME => $handler::<InnerClasses>($($arg),*),
            n if n == EnclosingMethod::NAME => $handler::<EnclosingMethod>($($arg),*),
            n if n == Synthetic::NAME => $handler::<Synthetic>($($arg),*),
            n if n == Signature::NAME => $handler::<Signature>($($arg),*),
            n if n == SourceFile::NAME => $handler::<SourceFile>($($arg),*),
            n if n == LineNumberTable::NAME => $handler::<LineNumberTable>($($arg),*),
            n if n == LocalVariableTable::NAME => $handler::<LocalVariableTable>($($arg),*),
            n if n == LocalVariableTypeTable::NAME => $handler::<LocalVariableTypeTable>($($arg),*),
            n if n == Deprecated::NAME => $handler::<Deprecated>($($arg),*),
            n if n == RuntimeVisibleAnnotations::NAME => {
                $handler::<RuntimeVisibleAnnotations>($($arg),*)
            }
            n if n == RuntimeInvisibleAnnotations::NAME => {
                $handler::<RuntimeInvisibleAnnotations>($($arg),*)
            }
            n if n == RuntimeVisibleParameterAnnotations::NAME => {
                $handler::<RuntimeVisibleParameterAnnotations>($($arg),*)
            }
            n if n == RuntimeInvisibleParameterAnnotations::NAME => {
                $handler::<RuntimeInvisibleParameterAnnotations>($($arg),*)
            }
            n if n == AnnotationDefault::NAME => $handler::<AnnotationDefault>($($arg),*),
            n if n == BootstrapMethods::NAME => $handler::<BootstrapMethods>($($arg),*),
            n if n == MethodParameters::NAME => $handler::<MethodParameters>($($arg),*),
            _ => $fallback,
        }
    };
}

fn copy_as<A: AttributeLike>(
    attribute: &Attribute,
    src: &ConstantPool,
    dest: &mut ConstantPool,
    renames: &ClassRenames,
) -> Result<Attribute, Error> {
    let copied = attribute.decode::<A>()?.copy(src, dest, renames)?;
    Attribute::new(dest, &copied)
}

fn rename_as<A: AttributeLike>(
    attribute: &mut Attribute,
    constants: &mut ConstantPool,
    renames: &ClassRenames,
) -> Result<bool, Error> {
    let mut decoded = attribute.decode::<A>()?;
    let changed = decoded.rename_classes(constants, renames)?;
    if changed {
        attribute.info = decoded.to_bytes()?;
    }
    Ok(changed)
}

/// Attributes attached to a class, field, method, or `Code` attribute
///
/// There is at most one attribute per name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeTable(pub Vec<Attribute>);

impl AttributeTable {
    pub fn new() -> AttributeTable {
        AttributeTable(vec![])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.0.iter()
    }

    fn position(&self, constants: &ConstantPool, name: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|attribute| attribute.name(constants).map_or(false, |n| n == name))
    }

    /// Add an attribute, replacing any existing attribute with the same name
    pub fn add(&mut self, constants: &ConstantPool, attribute: Attribute) -> Result<(), Error> {
        let name = attribute.name(constants)?;
        match self.position(constants, name) {
            Some(idx) => self.0[idx] = attribute,
            None => self.0.push(attribute),
        }
        Ok(())
    }

    pub fn get(&self, constants: &ConstantPool, name: &str) -> Option<&Attribute> {
        self.position(constants, name).map(|idx| &self.0[idx])
    }

    pub fn get_mut(&mut self, constants: &ConstantPool, name: &str) -> Option<&mut Attribute> {
        self.position(constants, name).map(move |idx| &mut self.0[idx])
    }

    pub fn remove(&mut self, constants: &ConstantPool, name: &str) -> Option<Attribute> {
        self.position(constants, name).map(|idx| self.0.remove(idx))
    }

    /// Look up and decode a typed attribute
    pub fn typed<A: AttributeLike>(&self, constants: &ConstantPool) -> Result<Option<A>, Error> {
        self.get(constants, A::NAME)
            .map(Attribute::decode::<A>)
            .transpose()
    }

    /// Encode and add a typed attribute (replacing any existing one)
    pub fn set<A: AttributeLike>(
        &mut self,
        constants: &mut ConstantPool,
        attribute: &A,
    ) -> Result<(), Error> {
        let attribute = Attribute::new(constants, attribute)?;
        self.add(constants, attribute)
    }

    /// Deep copy into another constant pool
    ///
    /// Attributes with unknown names are copied as opaque bytes.
    pub fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<AttributeTable, Error> {
        let mut copied = Vec::with_capacity(self.0.len());
        for attribute in &self.0 {
            let name = attribute.name(src)?;
            let attribute = with_known_attribute!(
                name,
                copy_as(attribute, src, dest, renames),
                {
                    log::debug!("Copying unknown attribute {} as opaque bytes", name);
                    Ok(Attribute {
                        name_index: dest.add_utf8(name)?,
                        info: attribute.info.clone(),
                    })
                }
            )?;
            copied.push(attribute);
        }
        Ok(AttributeTable(copied))
    }

    /// Copy only the attributes from [`PRUNE_ALLOW_LIST`] into another constant pool
    pub fn prune(&self, src: &ConstantPool, dest: &mut ConstantPool) -> Result<AttributeTable, Error> {
        self.prune_with(src, dest, PRUNE_ALLOW_LIST)
    }

    /// Copy only the attributes named in `allow_list` into another constant pool
    pub fn prune_with(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        allow_list: &[&str],
    ) -> Result<AttributeTable, Error> {
        let no_renames = ClassRenames::new();
        let mut pruned = AttributeTable::new();
        for attribute in &self.0 {
            let name = attribute.name(src)?;
            if allow_list.contains(&name) {
                let copied = AttributeTable(vec![attribute.clone()]).copy(src, dest, &no_renames)?;
                pruned.0.extend(copied.0);
            } else if KNOWN_ATTRIBUTES.contains(&name) {
                log::debug!("Pruning attribute {}", name);
            } else {
                log::warn!("Pruning unknown attribute {}", name);
            }
        }
        Ok(pruned)
    }

    /// Rename classes in descriptors and signatures embedded in attributes
    ///
    /// Returns whether any attribute changed.
    pub fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        let mut changed = false;
        for attribute in &mut self.0 {
            let name = attribute.name(constants)?.to_owned();
            changed |= with_known_attribute!(
                name.as_str(),
                rename_as(attribute, constants, renames),
                Ok(false)
            )?;
        }
        Ok(changed)
    }
}

impl Serialize for AttributeTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for AttributeTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(AttributeTable(Vec::deserialize(reader)?))
    }
}

/// Rename the class names in a descriptor or signature stored in a `Utf8` constant
///
/// Returns the index of the renamed text (a fresh constant, when it changes).
pub(crate) fn rename_utf8_descriptor(
    constants: &mut ConstantPool,
    index: Utf8ConstantIndex,
    renames: &ClassRenames,
) -> Result<Utf8ConstantIndex, Error> {
    let renamed = match rename_descriptor(constants.utf8(index)?, renames) {
        Cow::Borrowed(_) => None,
        Cow::Owned(renamed) => Some(renamed),
    };
    match renamed {
        None => Ok(index),
        Some(renamed) => constants.add_utf8(&renamed),
    }
}

/// Copy the text in a `Utf8` constant, renaming classes if the text is a descriptor
pub(crate) fn copy_utf8_descriptor(
    index: Utf8ConstantIndex,
    src: &ConstantPool,
    dest: &mut ConstantPool,
    renames: &ClassRenames,
) -> Result<Utf8ConstantIndex, Error> {
    dest.add_utf8(&rename_descriptor(src.utf8(index)?, renames))
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantValue(pub ConstantIndex);

impl Serialize for ConstantValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ConstantValue(ConstantIndex::deserialize(reader)?))
    }
}

impl AttributeLike for ConstantValue {
    const NAME: &'static str = "ConstantValue";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(ConstantValue(src.copy_entry(self.0, dest, renames)?))
    }
}

/// Checked exceptions a method declares
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.5
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Exceptions(pub Vec<ClassConstantIndex>);

impl Serialize for Exceptions {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for Exceptions {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Exceptions(Vec::deserialize(reader)?))
    }
}

impl AttributeLike for Exceptions {
    const NAME: &'static str = "Exceptions";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let classes = self
            .0
            .iter()
            .map(|class| src.copy_class(*class, dest, renames))
            .collect::<Result<_, _>>()?;
        Ok(Exceptions(classes))
    }
}

/// Every inner class referenced in a class' constant pool must be included in the inner classes
/// attribute on the class.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.6
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InnerClasses(pub Vec<InnerClass>);

impl AttributeLike for InnerClasses {
    const NAME: &'static str = "InnerClasses";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let mut classes = Vec::with_capacity(self.0.len());
        for inner in &self.0 {
            let inner_name = if inner.inner_name.0 .0 == 0 {
                inner.inner_name
            } else {
                src.copy_utf8(inner.inner_name, dest)?
            };
            classes.push(InnerClass {
                inner_class: src.copy_class(inner.inner_class, dest, renames)?,
                outer_class: src.copy_class(inner.outer_class, dest, renames)?,
                inner_name,
                access_flags: inner.access_flags,
            });
        }
        Ok(InnerClasses(classes))
    }
}

impl Serialize for InnerClasses {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for InnerClasses {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(InnerClasses(Vec::deserialize(reader)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
    pub inner_class: ClassConstantIndex,

    /// Index 0 if the class is not a member
    pub outer_class: ClassConstantIndex,

    /// Index 0 if the class is anonymous
    pub inner_name: Utf8ConstantIndex,
    pub access_flags: InnerClassAccessFlags,
}

impl Serialize for InnerClass {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.inner_class.serialize(writer)?;
        self.outer_class.serialize(writer)?;
        self.inner_name.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for InnerClass {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(InnerClass {
            inner_class: ClassConstantIndex::deserialize(reader)?,
            outer_class: ClassConstantIndex::deserialize(reader)?,
            inner_name: Utf8ConstantIndex::deserialize(reader)?,
            access_flags: InnerClassAccessFlags::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclosingMethod {
    pub class: ClassConstantIndex,

    /// `NameAndType` of the enclosing method, or 0 when the class is not enclosed by a method
    pub method: ConstantIndex,
}

impl AttributeLike for EnclosingMethod {
    const NAME: &'static str = "EnclosingMethod";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(EnclosingMethod {
            class: src.copy_class(self.class, dest, renames)?,
            method: src.copy_entry(self.method, dest, renames)?,
        })
    }
}

impl Serialize for EnclosingMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.class.serialize(writer)?;
        self.method.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for EnclosingMethod {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(EnclosingMethod {
            class: ClassConstantIndex::deserialize(reader)?,
            method: ConstantIndex::deserialize(reader)?,
        })
    }
}

/// Marker attributes with an empty body
macro_rules! marker_attribute {
    ($(#[$meta:meta])* $attribute:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $attribute;

        impl AttributeLike for $attribute {
            const NAME: &'static str = stringify!($attribute);

            fn copy(
                &self,
                _src: &ConstantPool,
                _dest: &mut ConstantPool,
                _renames: &ClassRenames,
            ) -> Result<Self, Error> {
                Ok($attribute)
            }
        }

        impl Serialize for $attribute {
            fn serialize<W: WriteBytesExt>(&self, _writer: &mut W) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl Deserialize for $attribute {
            fn deserialize<R: ReadBytesExt>(_reader: &mut R) -> Result<Self, Error> {
                Ok($attribute)
            }
        }
    };
}

marker_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.8
    Synthetic
);

marker_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.15
    Deprecated
);

/// Generic signature of a class, field, or method
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.9
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub signature: Utf8ConstantIndex,
}

impl AttributeLike for Signature {
    const NAME: &'static str = "Signature";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(Signature {
            signature: copy_utf8_descriptor(self.signature, src, dest, renames)?,
        })
    }

    fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        let renamed = rename_utf8_descriptor(constants, self.signature, renames)?;
        let changed = renamed != self.signature;
        self.signature = renamed;
        Ok(changed)
    }
}

impl Serialize for Signature {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.signature.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Signature {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(Signature {
            signature: Utf8ConstantIndex::deserialize(reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFile(pub Utf8ConstantIndex);

impl AttributeLike for SourceFile {
    const NAME: &'static str = "SourceFile";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        _renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(SourceFile(src.copy_utf8(self.0, dest)?))
    }
}

impl Serialize for SourceFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for SourceFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(SourceFile(Utf8ConstantIndex::deserialize(reader)?))
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.23
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BootstrapMethods(pub Vec<BootstrapMethod>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub bootstrap_method: ConstantIndex,
    pub bootstrap_arguments: Vec<ConstantIndex>,
}

impl AttributeLike for BootstrapMethods {
    const NAME: &'static str = "BootstrapMethods";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let mut methods = Vec::with_capacity(self.0.len());
        for method in &self.0 {
            let bootstrap_method = src.copy_entry(method.bootstrap_method, dest, renames)?;
            let bootstrap_arguments = method
                .bootstrap_arguments
                .iter()
                .map(|argument| src.copy_entry(*argument, dest, renames))
                .collect::<Result<_, _>>()?;
            methods.push(BootstrapMethod {
                bootstrap_method,
                bootstrap_arguments,
            });
        }
        Ok(BootstrapMethods(methods))
    }
}

impl Serialize for BootstrapMethods {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for BootstrapMethods {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(BootstrapMethods(Vec::deserialize(reader)?))
    }
}

impl Serialize for BootstrapMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bootstrap_method.serialize(writer)?;
        self.bootstrap_arguments.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for BootstrapMethod {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(BootstrapMethod {
            bootstrap_method: ConstantIndex::deserialize(reader)?,
            bootstrap_arguments: Vec::deserialize(reader)?,
        })
    }
}

/// Names and flags of formal parameters
///
/// Unlike most other attributes, the count is a `u8`.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.24
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodParameters(pub Vec<MethodParameter>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    /// Index 0 for a parameter with no name
    pub name: Utf8ConstantIndex,
    pub access_flags: ParameterAccessFlags,
}

impl AttributeLike for MethodParameters {
    const NAME: &'static str = "MethodParameters";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        _renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let mut parameters = Vec::with_capacity(self.0.len());
        for parameter in &self.0 {
            let name = if parameter.name.0 .0 == 0 {
                parameter.name
            } else {
                src.copy_utf8(parameter.name, dest)?
            };
            parameters.push(MethodParameter {
                name,
                access_flags: parameter.access_flags,
            });
        }
        Ok(MethodParameters(parameters))
    }
}

impl Serialize for MethodParameters {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        serialize_len::<u8, W>(self.0.len(), writer)?;
        for parameter in &self.0 {
            parameter.name.serialize(writer)?;
            parameter.access_flags.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for MethodParameters {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u8::deserialize(reader)?;
        let mut parameters = Vec::with_capacity(count as usize);
        for _ in 0..count {
            parameters.push(MethodParameter {
                name: Utf8ConstantIndex::deserialize(reader)?,
                access_flags: ParameterAccessFlags::deserialize(reader)?,
            });
        }
        Ok(MethodParameters(parameters))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_replaces_same_name() {
        let mut pool = ConstantPool::new();
        let mut table = AttributeTable::new();
        let first = pool.add_utf8("first.java").unwrap();
        let second = pool.add_utf8("second.java").unwrap();
        table.set(&mut pool, &SourceFile(first)).unwrap();
        table.set(&mut pool, &Synthetic).unwrap();
        table.set(&mut pool, &SourceFile(second)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.typed::<SourceFile>(&pool).unwrap(),
            Some(SourceFile(second))
        );
        assert!(table.get(&pool, "Synthetic").is_some());
        assert!(table.remove(&pool, "Synthetic").is_some());
        assert!(table.get(&pool, "Synthetic").is_none());
        assert_eq!(table.typed::<Deprecated>(&pool).unwrap(), None);
    }

    #[test]
    fn copy_remaps_constants() {
        let mut src = ConstantPool::new();
        src.add_utf8("unrelated").unwrap();
        let io = src.add_class("java/io/IOException").unwrap();
        let mut table = AttributeTable::new();
        table.set(&mut src, &Exceptions(vec![io])).unwrap();
        let unknown_name = src.add_utf8("Custom").unwrap();
        table.0.push(Attribute {
            name_index: unknown_name,
            info: vec![1, 2, 3],
        });

        let mut dest = ConstantPool::new();
        let copied = table.copy(&src, &mut dest, &ClassRenames::new()).unwrap();
        let exceptions = copied.typed::<Exceptions>(&dest).unwrap().unwrap();
        assert_eq!(exceptions.0.len(), 1);
        assert_eq!(dest.class_name(exceptions.0[0]).unwrap(), "java/io/IOException");
        assert_eq!(copied.get(&dest, "Custom").unwrap().info, vec![1, 2, 3]);
    }

    #[test]
    fn prune_keeps_allow_list() {
        let mut src = ConstantPool::new();
        let mut table = AttributeTable::new();
        let sig = src.add_utf8("Ljava/util/List<Ljava/lang/String;>;").unwrap();
        table.set(&mut src, &Signature { signature: sig }).unwrap();
        table.set(&mut src, &Synthetic).unwrap();
        let unknown_name = src.add_utf8("Custom").unwrap();
        table.0.push(Attribute {
            name_index: unknown_name,
            info: vec![],
        });

        let mut dest = ConstantPool::new();
        let pruned = table.prune(&src, &mut dest).unwrap();
        assert_eq!(pruned.len(), 1);
        let signature = pruned.typed::<Signature>(&dest).unwrap().unwrap();
        assert_eq!(
            dest.utf8(signature.signature).unwrap(),
            "Ljava/util/List<Ljava/lang/String;>;"
        );

        let mut dest = ConstantPool::new();
        let pruned = table.prune_with(&src, &mut dest, &["Custom"]).unwrap();
        assert_eq!(pruned.len(), 1);
        assert!(pruned.get(&dest, "Custom").is_some());
    }

    #[test]
    fn rename_signatures() {
        let mut pool = ConstantPool::new();
        let sig = pool.add_utf8("Ljava/util/List<Lfoo/A;>;").unwrap();
        let mut table = AttributeTable::new();
        table.set(&mut pool, &Signature { signature: sig }).unwrap();

        let mut renames = ClassRenames::new();
        renames.insert(String::from("foo/A"), String::from("bar/B"));
        table.rename_classes(&mut pool, &renames).unwrap();
        let renamed = table.typed::<Signature>(&pool).unwrap().unwrap();
        assert_eq!(pool.utf8(renamed.signature).unwrap(), "Ljava/util/List<Lbar/B;>;");
        // the original text is left alone
        assert_eq!(pool.utf8(sig).unwrap(), "Ljava/util/List<Lfoo/A;>;");
    }

    #[test]
    fn method_parameters_use_byte_count() {
        let params = MethodParameters(vec![MethodParameter {
            name: Utf8ConstantIndex(ConstantIndex(4)),
            access_flags: ParameterAccessFlags::FINAL,
        }]);
        let bytes = params.to_bytes().unwrap();
        assert_eq!(bytes, vec![1, 0, 4, 0, 0x10]);
        assert_eq!(MethodParameters::from_bytes(&bytes).unwrap(), params);
    }

    #[test]
    fn method_parameters_count_limit() {
        let parameter = MethodParameter {
            name: Utf8ConstantIndex(ConstantIndex(0)),
            access_flags: ParameterAccessFlags::empty(),
        };
        let params = MethodParameters(vec![parameter; 255]);
        let bytes = params.to_bytes().unwrap();
        assert_eq!(bytes[0], 255);
        assert_eq!(bytes.len(), 1 + 255 * 4);

        match MethodParameters(vec![parameter; 256]).to_bytes() {
            Err(Error::UnsupportedConstruct(_)) => (),
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn exceptions_count_limit() {
        let io = ClassConstantIndex(ConstantIndex(3));
        let bytes = Exceptions(vec![io; u16::MAX as usize]).to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFF]);

        match Exceptions(vec![io; u16::MAX as usize + 1]).to_bytes() {
            Err(Error::UnsupportedConstruct(_)) => (),
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn known_attributes_are_dispatched() {
        fn name_of<A: AttributeLike>() -> &'static str {
            A::NAME
        }
        for name in KNOWN_ATTRIBUTES {
            assert_eq!(with_known_attribute!(*name, name_of(), "unknown"), *name);
        }
        assert_eq!(with_known_attribute!("Custom", name_of(), "unknown"), "unknown");
    }
}
