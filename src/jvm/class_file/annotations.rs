//! Annotation trees, as stored in the annotation attributes
//!
//! Only the binary tree is modelled. Type names inside annotations are field descriptors (or
//! return descriptors, for class literals) stored as `Utf8` constants, so renaming classes has to
//! rewrite those texts too.

use crate::jvm::class_file::{
    copy_utf8_descriptor, rename_utf8_descriptor, AttributeLike, ConstantIndex, ConstantPool,
    serialize_len, Deserialize, Serialize, Utf8ConstantIndex,
};
use crate::jvm::descriptors::ClassRenames;
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface
    pub type_index: Utf8ConstantIndex,
    pub elements: Vec<(Utf8ConstantIndex, ElementValue)>,
}

impl Annotation {
    pub fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Annotation, Error> {
        let type_index = copy_utf8_descriptor(self.type_index, src, dest, renames)?;
        let mut elements = Vec::with_capacity(self.elements.len());
        for (name, value) in &self.elements {
            elements.push((src.copy_utf8(*name, dest)?, value.copy(src, dest, renames)?));
        }
        Ok(Annotation {
            type_index,
            elements,
        })
    }

    pub fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        let renamed = rename_utf8_descriptor(constants, self.type_index, renames)?;
        let mut changed = renamed != self.type_index;
        self.type_index = renamed;
        for (_, value) in &mut self.elements {
            changed |= value.rename_classes(constants, renames)?;
        }
        Ok(changed)
    }
}

impl Serialize for Annotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.type_index.serialize(writer)?;
        serialize_len::<u16, W>(self.elements.len(), writer)?;
        for (name, value) in &self.elements {
            name.serialize(writer)?;
            value.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for Annotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let type_index = Utf8ConstantIndex::deserialize(reader)?;
        let count = u16::deserialize(reader)?;
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = Utf8ConstantIndex::deserialize(reader)?;
            elements.push((name, ElementValue::deserialize(reader)?));
        }
        Ok(Annotation {
            type_index,
            elements,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant
    ///
    /// The tag is one of `BCDFIJSZs`. Strings point directly at a `Utf8` constant.
    Const { tag: u8, value: ConstantIndex },

    /// Enum constant (`e`)
    Enum {
        type_name: Utf8ConstantIndex,
        const_name: Utf8ConstantIndex,
    },

    /// Class literal (`c`), stored as a return descriptor
    Class(Utf8ConstantIndex),

    /// Nested annotation (`@`)
    Annotation(Annotation),

    /// Array (`[`)
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Const { tag, .. } => *tag,
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class(_) => b'c',
            ElementValue::Annotation(_) => b'@',
            ElementValue::Array(_) => b'[',
        }
    }

    pub fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<ElementValue, Error> {
        Ok(match self {
            ElementValue::Const { tag, value } => ElementValue::Const {
                tag: *tag,
                value: src.copy_entry(*value, dest, renames)?,
            },
            ElementValue::Enum {
                type_name,
                const_name,
            } => ElementValue::Enum {
                type_name: copy_utf8_descriptor(*type_name, src, dest, renames)?,
                const_name: src.copy_utf8(*const_name, dest)?,
            },
            ElementValue::Class(class) => {
                ElementValue::Class(copy_utf8_descriptor(*class, src, dest, renames)?)
            }
            ElementValue::Annotation(annotation) => {
                ElementValue::Annotation(annotation.copy(src, dest, renames)?)
            }
            ElementValue::Array(values) => ElementValue::Array(
                values
                    .iter()
                    .map(|value| value.copy(src, dest, renames))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    pub fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        match self {
            ElementValue::Const { .. } => Ok(false),
            ElementValue::Enum { type_name, .. } => {
                let renamed = rename_utf8_descriptor(constants, *type_name, renames)?;
                let changed = renamed != *type_name;
                *type_name = renamed;
                Ok(changed)
            }
            ElementValue::Class(class) => {
                let renamed = rename_utf8_descriptor(constants, *class, renames)?;
                let changed = renamed != *class;
                *class = renamed;
                Ok(changed)
            }
            ElementValue::Annotation(annotation) => annotation.rename_classes(constants, renames),
            ElementValue::Array(values) => {
                let mut changed = false;
                for value in values {
                    changed |= value.rename_classes(constants, renames)?;
                }
                Ok(changed)
            }
        }
    }
}

impl Serialize for ElementValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            ElementValue::Const { value, .. } => value.serialize(writer)?,
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                type_name.serialize(writer)?;
                const_name.serialize(writer)?;
            }
            ElementValue::Class(class) => class.serialize(writer)?,
            ElementValue::Annotation(annotation) => annotation.serialize(writer)?,
            ElementValue::Array(values) => values.serialize(writer)?,
        }
        Ok(())
    }
}

impl Deserialize for ElementValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let value = match u8::deserialize(reader)? {
            tag @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's') => {
                ElementValue::Const {
                    tag,
                    value: ConstantIndex::deserialize(reader)?,
                }
            }
            b'e' => ElementValue::Enum {
                type_name: Utf8ConstantIndex::deserialize(reader)?,
                const_name: Utf8ConstantIndex::deserialize(reader)?,
            },
            b'c' => ElementValue::Class(Utf8ConstantIndex::deserialize(reader)?),
            b'@' => ElementValue::Annotation(Annotation::deserialize(reader)?),
            b'[' => ElementValue::Array(Vec::deserialize(reader)?),
            other => {
                return Err(Error::MalformedInput(format!(
                    "invalid element value tag {:#04x}",
                    other
                )))
            }
        };
        Ok(value)
    }
}

fn copy_annotations(
    annotations: &[Annotation],
    src: &ConstantPool,
    dest: &mut ConstantPool,
    renames: &ClassRenames,
) -> Result<Vec<Annotation>, Error> {
    annotations
        .iter()
        .map(|annotation| annotation.copy(src, dest, renames))
        .collect()
}

fn rename_annotations(
    annotations: &mut [Annotation],
    constants: &mut ConstantPool,
    renames: &ClassRenames,
) -> Result<bool, Error> {
    let mut changed = false;
    for annotation in annotations {
        changed |= annotation.rename_classes(constants, renames)?;
    }
    Ok(changed)
}

macro_rules! annotations_attribute {
    ($(#[$meta:meta])* $attribute:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $attribute(pub Vec<Annotation>);

        impl AttributeLike for $attribute {
            const NAME: &'static str = stringify!($attribute);

            fn copy(
                &self,
                src: &ConstantPool,
                dest: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<Self, Error> {
                Ok($attribute(copy_annotations(&self.0, src, dest, renames)?))
            }

            fn rename_classes(
                &mut self,
                constants: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<bool, Error> {
                rename_annotations(&mut self.0, constants, renames)
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

/// Parameter annotations are prefixed with a `u8` parameter count
macro_rules! parameter_annotations_attribute {
    ($(#[$meta:meta])* $attribute:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $attribute(pub Vec<Vec<Annotation>>);

        impl AttributeLike for $attribute {
            const NAME: &'static str = stringify!($attribute);

            fn copy(
                &self,
                src: &ConstantPool,
                dest: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<Self, Error> {
                let parameters = self
                    .0
                    .iter()
                    .map(|annotations| copy_annotations(annotations, src, dest, renames))
                    .collect::<Result<_, _>>()?;
                Ok($attribute(parameters))
            }

            fn rename_classes(
                &mut self,
                constants: &mut ConstantPool,
                renames: &ClassRenames,
            ) -> Result<bool, Error> {
                let mut changed = false;
                for annotations in &mut self.0 {
                    changed |= rename_annotations(annotations, constants, renames)?;
                }
                Ok(changed)
            }
        }

        impl Serialize for $attribute {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                serialize_len::<u8, W>(self.0.len(), writer)?;
                for annotations in &self.0 {
                    annotations.serialize(writer)?;
                }
                Ok(())
            }
        }

        impl Deserialize for $attribute {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                let count = u8::deserialize(reader)?;
                let mut parameters = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    parameters.push(Vec::deserialize(reader)?);
                }
                Ok($attribute(parameters))
            }
        }
    };
}

annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
    RuntimeVisibleAnnotations
);
annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.17
    RuntimeInvisibleAnnotations
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.18
    RuntimeVisibleParameterAnnotations
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.19
    RuntimeInvisibleParameterAnnotations
);

/// Default value of an annotation interface element
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.22
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDefault(pub ElementValue);

impl AttributeLike for AnnotationDefault {
    const NAME: &'static str = "AnnotationDefault";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        Ok(AnnotationDefault(self.0.copy(src, dest, renames)?))
    }

    fn rename_classes(
        &mut self,
        constants: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<bool, Error> {
        self.0.rename_classes(constants, renames)
    }
}

impl Serialize for AnnotationDefault {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for AnnotationDefault {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(AnnotationDefault(ElementValue::deserialize(reader)?))
    }
}
