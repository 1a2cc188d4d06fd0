use crate::jvm::class_file::{read_bytes, Deserialize, Serialize};
use crate::jvm::descriptors::{
    class_names_in_descriptor, rename_class_name, rename_descriptor, ClassRenames,
};
use crate::jvm::Error;
use crate::util::Width;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::result::Result;

/// Class file constant pool
///
/// Indices start at 1 (index 0 is reserved and never addressable) and `Long`/`Double` constants
/// take up two consecutive slots, the second of which holds a [`Constant::Padding`].
///
/// Adding constants is value-interned: adding a constant structurally equal to one the pool
/// already knows about returns the existing index. The interning map is only trusted while the
/// pool is built up through `add_*` methods. Decoding, renaming, and compacting leave it
/// [`InternState::Invalidated`], in which case the next `add_*` rebuilds it from the current
/// entries (when there are duplicate entries, the first one wins).
#[derive(Clone, Debug)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    interning: Interning,
}

#[derive(Clone, Debug)]
enum Interning {
    Active(HashMap<Constant, ConstantIndex>),
    Invalidated,
}

/// Whether the interning map of a [`ConstantPool`] is currently usable
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InternState {
    Active,
    Invalidated,
}

/// Resolved field or method reference
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemberRef<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

impl Default for ConstantPool {
    fn default() -> ConstantPool {
        ConstantPool::new()
    }
}

impl ConstantPool {
    /// Make a fresh empty constant pool
    pub fn new() -> ConstantPool {
        ConstantPool {
            constants: vec![Constant::Padding],
            interning: Interning::Active(HashMap::new()),
        }
    }

    /// Next free index (this is also the `constant_pool_count` in the binary format)
    pub fn size(&self) -> u16 {
        self.constants.len() as u16
    }

    pub fn intern_state(&self) -> InternState {
        match self.interning {
            Interning::Active(_) => InternState::Active,
            Interning::Invalidated => InternState::Invalidated,
        }
    }

    /// Mark the interning map as stale
    pub fn invalidate_interning(&mut self) {
        self.interning = Interning::Invalidated;
    }

    /// Iterate over all addressable constants (padding slots are skipped)
    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> + '_ {
        self.constants
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, constant)| !matches!(constant, Constant::Padding))
            .map(|(idx, constant)| (ConstantIndex(idx as u16), constant))
    }

    /// Look up a constant, failing on index 0, padding slots, and indices past the end
    pub fn get(&self, index: impl Into<ConstantIndex>) -> Result<&Constant, Error> {
        let index = index.into();
        match self.constants.get(index.0 as usize) {
            Some(Constant::Padding) | None => Err(Error::IndexOutOfRange(index)),
            Some(constant) => Ok(constant),
        }
    }

    /// Look up the string in a `CONSTANT_Utf8_info`
    pub fn utf8(&self, index: impl Into<ConstantIndex>) -> Result<&str, Error> {
        let index = index.into();
        match self.get(index)? {
            Constant::Utf8(string) => Ok(string),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Look up the name in a `CONSTANT_Class_info`
    pub fn class_name(&self, index: impl Into<ConstantIndex>) -> Result<&str, Error> {
        let index = index.into();
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "Class",
            }),
        }
    }

    /// Look up the contents of a `CONSTANT_String_info`
    pub fn string(&self, index: impl Into<ConstantIndex>) -> Result<&str, Error> {
        let index = index.into();
        match self.get(index)? {
            Constant::String(value) => self.utf8(*value),
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "String",
            }),
        }
    }

    /// Look up the name and descriptor in a `CONSTANT_NameAndType_info`
    pub fn name_and_type(&self, index: impl Into<ConstantIndex>) -> Result<(&str, &str), Error> {
        let index = index.into();
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Look up a field, method, or interface method reference
    pub fn member_ref(&self, index: impl Into<ConstantIndex>) -> Result<MemberRef<'_>, Error> {
        let index = index.into();
        let (class, name_and_type) = match self.get(index)? {
            Constant::FieldRef(class, name_and_type) => (*class, *name_and_type),
            Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => (*class, *name_and_type),
            _ => {
                return Err(Error::ConstantTypeMismatch {
                    index,
                    expected: "Fieldref or Methodref",
                })
            }
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            class_name: self.class_name(class)?,
            name,
            descriptor,
        })
    }

    /// Look up the bootstrap method index, name, and descriptor of a dynamic constant or call site
    pub fn dynamic(&self, index: impl Into<ConstantIndex>) -> Result<(u16, &str, &str), Error> {
        let index = index.into();
        match self.get(index)? {
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor: name_and_type,
            }
            | Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((*bootstrap_method, name, descriptor))
            }
            _ => Err(Error::ConstantTypeMismatch {
                index,
                expected: "InvokeDynamic or Dynamic",
            }),
        }
    }

    /// Names of all classes mentioned in `CONSTANT_Class_info` entries
    ///
    /// Array classes contribute their element class (if any).
    pub fn referenced_class_names(&self) -> Result<Vec<String>, Error> {
        let mut names = vec![];
        for (_, constant) in self.iter() {
            if let Constant::Class(name) = constant {
                let name = self.utf8(*name)?;
                if name.starts_with('[') {
                    names.extend(class_names_in_descriptor(name));
                } else {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65534, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.constants.len();
        if offset + constant.width() > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }
        let width = constant.width();
        self.constants.push(constant);
        if width == 2 {
            self.constants.push(Constant::Padding);
        }
        Ok(ConstantIndex(offset as u16))
    }

    /// Interning map, rebuilt from the current entries if it was invalidated
    fn interning_map(&mut self) -> &mut HashMap<Constant, ConstantIndex> {
        if let Interning::Invalidated = self.interning {
            log::trace!("Rebuilding interning map over {} slots", self.constants.len());
            let mut map = HashMap::new();
            for (idx, entry) in self.constants.iter().enumerate().skip(1) {
                if !matches!(entry, Constant::Padding) {
                    map.entry(entry.clone())
                        .or_insert(ConstantIndex(idx as u16));
                }
            }
            self.interning = Interning::Active(map);
        }
        match &mut self.interning {
            Interning::Active(map) => map,
            Interning::Invalidated => unreachable!("interning map was just rebuilt"),
        }
    }

    /// Get the index of an equal constant or append the constant
    fn intern(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.interning_map().get(&constant) {
            return Ok(*idx);
        }
        let idx = self.push_constant(constant.clone())?;
        self.interning_map().insert(constant, idx);
        Ok(idx)
    }

    pub fn add_utf8(&mut self, string: &str) -> Result<Utf8ConstantIndex, Error> {
        let len = modified_utf8_len(string);
        if len > u16::MAX as usize {
            return Err(Error::UnsupportedConstruct(format!(
                "string constant is {} bytes long in modified UTF-8 (the limit is 65535)",
                len
            )));
        }
        self.intern(Constant::Utf8(string.to_owned()))
            .map(Utf8ConstantIndex)
    }

    pub fn add_integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Integer(integer))
    }

    pub fn add_float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Float(float))
    }

    pub fn add_long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Long(long))
    }

    pub fn add_double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Double(double))
    }

    /// Add a class by binary name (or array descriptor)
    ///
    /// Qualified names are accepted too: `java.lang.String` is stored as `java/lang/String`.
    pub fn add_class(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.add_utf8(&name.replace('.', "/"))?;
        self.add_class_index(name)
    }

    pub fn add_class_index(&mut self, name: Utf8ConstantIndex) -> Result<ClassConstantIndex, Error> {
        self.intern(Constant::Class(name)).map(ClassConstantIndex)
    }

    pub fn add_string(&mut self, value: &str) -> Result<ConstantIndex, Error> {
        let value = self.add_utf8(value)?;
        self.intern(Constant::String(value))
    }

    pub fn add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    pub fn add_field_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        let class = self.add_class(class)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::FieldRef(class, name_and_type))
    }

    pub fn add_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        self.add_method_ref_kind(class, name, descriptor, false)
    }

    pub fn add_interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        self.add_method_ref_kind(class, name, descriptor, true)
    }

    fn add_method_ref_kind(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<ConstantIndex, Error> {
        let class = self.add_class(class)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        })
    }

    pub fn add_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, Error> {
        self.intern(Constant::MethodHandle {
            handle_kind,
            member,
        })
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> Result<ConstantIndex, Error> {
        let descriptor = self.add_utf8(descriptor)?;
        self.intern(Constant::MethodType { descriptor })
    }

    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        let method_descriptor = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::InvokeDynamic {
            bootstrap_method,
            method_descriptor,
        })
    }

    pub fn add_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::Dynamic {
            bootstrap_method,
            name_and_type,
        })
    }

    pub fn add_module(&mut self, name: &str) -> Result<ConstantIndex, Error> {
        let name = self.add_utf8(name)?;
        self.intern(Constant::Module(name))
    }

    pub fn add_package(&mut self, name: &str) -> Result<ConstantIndex, Error> {
        let name = self.add_utf8(name)?;
        self.intern(Constant::Package(name))
    }

    /// Copy a constant (and everything it references) into another pool
    ///
    /// Class names and descriptors go through `renames` on the way. Index 0 (used for "absent"
    /// in several attributes) is copied as 0.
    pub fn copy_entry(
        &self,
        index: impl Into<ConstantIndex>,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<ConstantIndex, Error> {
        let index = index.into();
        if index.0 == 0 {
            return Ok(index);
        }
        let copied = match self.get(index)? {
            Constant::Utf8(string) => dest.add_utf8(string)?.into(),
            Constant::Integer(integer) => dest.add_integer(*integer)?,
            Constant::Float(float) => dest.add_float(*float)?,
            Constant::Long(long) => dest.add_long(*long)?,
            Constant::Double(double) => dest.add_double(*double)?,
            Constant::Class(name) => {
                let name = self.utf8(*name)?;
                dest.add_class(&rename_class_name(name, renames))?.into()
            }
            Constant::String(value) => dest.add_string(self.utf8(*value)?)?,
            Constant::NameAndType { name, descriptor } => {
                let descriptor = self.utf8(*descriptor)?;
                dest.add_name_and_type(self.utf8(*name)?, &rename_descriptor(descriptor, renames))?
                    .into()
            }
            Constant::FieldRef(class, name_and_type) => {
                let class = self.copy_class(*class, dest, renames)?;
                let name_and_type = self.copy_name_and_type(*name_and_type, dest, renames)?;
                dest.intern(Constant::FieldRef(class, name_and_type))?
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let class = self.copy_class(*class, dest, renames)?;
                let name_and_type = self.copy_name_and_type(*name_and_type, dest, renames)?;
                dest.intern(Constant::MethodRef {
                    class,
                    name_and_type,
                    is_interface: *is_interface,
                })?
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                let member = self.copy_entry(*member, dest, renames)?;
                dest.add_method_handle(*handle_kind, member)?
            }
            Constant::MethodType { descriptor } => {
                let descriptor = self.utf8(*descriptor)?;
                dest.add_method_type(&rename_descriptor(descriptor, renames))?
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                let method_descriptor = self.copy_name_and_type(*method_descriptor, dest, renames)?;
                dest.intern(Constant::InvokeDynamic {
                    bootstrap_method: *bootstrap_method,
                    method_descriptor,
                })?
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let name_and_type = self.copy_name_and_type(*name_and_type, dest, renames)?;
                dest.intern(Constant::Dynamic {
                    bootstrap_method: *bootstrap_method,
                    name_and_type,
                })?
            }
            Constant::Module(name) => dest.add_module(self.utf8(*name)?)?,
            Constant::Package(name) => dest.add_package(self.utf8(*name)?)?,
            Constant::Padding => return Err(Error::IndexOutOfRange(index)),
        };
        Ok(copied)
    }

    /// Copy constants into consecutive slots starting at the current end of `dest`
    ///
    /// The constants themselves come first and their dependencies after them, so copying the
    /// operands of every `ldc` into a fresh pool this way keeps them addressable with a one byte
    /// index. Only single-slot constants can be copied like this. On failure, `dest` is left
    /// with unfilled slots and must be discarded.
    pub fn copy_entries_leading(
        &self,
        indices: &[ConstantIndex],
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Vec<ConstantIndex>, Error> {
        for index in indices {
            if self.get(*index)?.width() != 1 {
                return Err(Error::UnsupportedConstruct(format!(
                    "constant #{} takes two slots",
                    index.0
                )));
            }
        }
        let first = dest.constants.len();
        if first + indices.len() > u16::MAX as usize {
            return Err(Error::UnsupportedConstruct(format!(
                "{} leading constants do not fit after #{}",
                indices.len(),
                first
            )));
        }
        dest.constants
            .extend(indices.iter().map(|_| Constant::Padding));

        let mut copied = Vec::with_capacity(indices.len());
        for (slot, index) in (first..).zip(indices) {
            let before = dest.constants.len();
            let appended = self.copy_entry(*index, dest, renames)?;
            let fresh = dest.constants.len() > before
                && appended.0 as usize + 1 == dest.constants.len();
            let constant = if fresh {
                // Move the entry just appended into its reserved slot
                let constant = dest
                    .constants
                    .pop()
                    .ok_or(Error::IndexOutOfRange(appended))?;
                dest.interning_map().remove(&constant);
                constant
            } else {
                dest.get(appended)?.clone()
            };
            let slot = ConstantIndex(slot as u16);
            dest.interning_map().entry(constant.clone()).or_insert(slot);
            dest.constants[slot.0 as usize] = constant;
            copied.push(slot);
        }
        log::trace!(
            "Copied {} leading constants into #{}..#{}",
            indices.len(),
            first,
            first + indices.len()
        );
        Ok(copied)
    }

    /// Copy a `CONSTANT_Utf8_info` into another pool
    pub fn copy_utf8(
        &self,
        index: Utf8ConstantIndex,
        dest: &mut ConstantPool,
    ) -> Result<Utf8ConstantIndex, Error> {
        dest.add_utf8(self.utf8(index)?)
    }

    /// Copy a `CONSTANT_Class_info` into another pool
    pub fn copy_class(
        &self,
        index: ClassConstantIndex,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<ClassConstantIndex, Error> {
        if index.0 .0 == 0 {
            return Ok(index);
        }
        let name = self.class_name(index)?;
        dest.add_class(&rename_class_name(name, renames))
    }

    fn copy_name_and_type(
        &self,
        index: NameAndTypeConstantIndex,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let (name, descriptor) = self.name_and_type(index)?;
        dest.add_name_and_type(name, &rename_descriptor(descriptor, renames))
    }

    /// Rename a single class (names can be binary or qualified)
    pub fn rename_class(&mut self, old_name: &str, new_name: &str) -> Result<(), Error> {
        let mut renames = ClassRenames::new();
        renames.insert(old_name.replace('.', "/"), new_name.replace('.', "/"));
        self.rename_classes(&renames)
    }

    /// Rename classes in `Class`, `NameAndType`, and `MethodType` entries
    ///
    /// Renamed names/descriptors are stored in fresh `Utf8` entries: existing `Utf8` entries are
    /// never modified since the same text may also be used as a member name or string literal.
    /// Nothing happens if none of the classes being renamed are mentioned.
    pub fn rename_classes(&mut self, renames: &ClassRenames) -> Result<(), Error> {
        if renames.is_empty() {
            return Ok(());
        }

        // Only `Utf8` constants get added during the pass, and those are never modified, so the
        // `Utf8` keys of the interning map stay accurate until the pass is done.
        self.interning_map();

        // Utf8 entries already fixed during this pass, keyed by whether they are used as a class
        // name (as opposed to a descriptor)
        let mut fixed: HashMap<(Utf8ConstantIndex, bool), Utf8ConstantIndex> = HashMap::new();
        let fresh_start = self.size();
        let mut changed = false;

        for idx in 1..fresh_start {
            let utf8_idx = match &self.constants[idx as usize] {
                Constant::Class(name) => *name,
                Constant::NameAndType { descriptor, .. } => *descriptor,
                Constant::MethodType { descriptor } => *descriptor,
                _ => continue,
            };
            let is_class = matches!(self.constants[idx as usize], Constant::Class(_));

            let renamed_idx = match fixed.entry((utf8_idx, is_class)) {
                Entry::Occupied(occupied) => *occupied.get(),
                Entry::Vacant(vacant) => {
                    let renamed: Option<String> = {
                        let text = match &self.constants[utf8_idx.0 .0 as usize] {
                            Constant::Utf8(text) => text,
                            _ => {
                                return Err(Error::ConstantTypeMismatch {
                                    index: utf8_idx.0,
                                    expected: "Utf8",
                                })
                            }
                        };
                        let renamed = if is_class {
                            rename_class_name(text, renames)
                        } else {
                            rename_descriptor(text, renames)
                        };
                        if renamed.as_ref() == text.as_str() {
                            None
                        } else {
                            log::trace!("Renaming #{}: {:?} to {:?}", idx, text, renamed);
                            Some(renamed.into_owned())
                        }
                    };
                    let renamed_idx = match renamed {
                        None => utf8_idx,
                        Some(renamed) => self.add_utf8(&renamed)?,
                    };
                    *vacant.insert(renamed_idx)
                }
            };

            if renamed_idx != utf8_idx {
                changed = true;
                match &mut self.constants[idx as usize] {
                    Constant::Class(name) => *name = renamed_idx,
                    Constant::NameAndType { descriptor, .. } => *descriptor = renamed_idx,
                    Constant::MethodType { descriptor } => *descriptor = renamed_idx,
                    _ => (),
                }
            }
        }

        if changed {
            log::debug!("Renamed classes in constant pool: {:?}", renames);
            self.invalidate_interning();
        }
        Ok(())
    }
}

impl Serialize for ConstantPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.size().serialize(writer)?;
        for (_, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for ConstantPool {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let count = u16::deserialize(reader)? as usize;
        if count == 0 {
            return Err(Error::MalformedInput(String::from(
                "constant pool count must be at least 1",
            )));
        }
        let mut constants = Vec::with_capacity(count);
        constants.push(Constant::Padding);
        while constants.len() < count {
            let constant = Constant::deserialize(reader)?;
            let width = constant.width();
            if constants.len() + width > count {
                return Err(Error::MalformedInput(format!(
                    "{:?} at #{} overflows the constant pool count {}",
                    constant,
                    constants.len(),
                    count
                )));
            }
            constants.push(constant);
            if width == 2 {
                constants.push(Constant::Padding);
            }
        }
        log::trace!("Decoded constant pool with {} slots", count);
        Ok(ConstantPool {
            constants,
            interning: Interning::Invalidated,
        })
    }
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed constant
    Dynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    Module(Utf8ConstantIndex),

    Package(Utf8ConstantIndex),

    /// Unusable slot following a `Long` or `Double` (also used for the reserved index 0)
    Padding,
}

impl Constant {
    /// Binary tag of the constant
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::FieldRef(_, _) => 9,
            Constant::MethodRef {
                is_interface: false,
                ..
            } => 10,
            Constant::MethodRef {
                is_interface: true, ..
            } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module(_) => 19,
            Constant::Package(_) => 20,
            Constant::Padding => 0,
        }
    }
}

/// Structural equality, with floating point constants compared by bit pattern
impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Class(a), Constant::Class(b)) => a == b,
            (Constant::FieldRef(c1, n1), Constant::FieldRef(c2, n2)) => c1 == c2 && n1 == n2,
            (
                Constant::MethodRef {
                    class: c1,
                    name_and_type: n1,
                    is_interface: i1,
                },
                Constant::MethodRef {
                    class: c2,
                    name_and_type: n2,
                    is_interface: i2,
                },
            ) => c1 == c2 && n1 == n2 && i1 == i2,
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::Integer(a), Constant::Integer(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (
                Constant::NameAndType {
                    name: n1,
                    descriptor: d1,
                },
                Constant::NameAndType {
                    name: n2,
                    descriptor: d2,
                },
            ) => n1 == n2 && d1 == d2,
            (Constant::Utf8(a), Constant::Utf8(b)) => a == b,
            (
                Constant::MethodHandle {
                    handle_kind: k1,
                    member: m1,
                },
                Constant::MethodHandle {
                    handle_kind: k2,
                    member: m2,
                },
            ) => k1 == k2 && m1 == m2,
            (Constant::MethodType { descriptor: a }, Constant::MethodType { descriptor: b }) => {
                a == b
            }
            (
                Constant::InvokeDynamic {
                    bootstrap_method: b1,
                    method_descriptor: m1,
                },
                Constant::InvokeDynamic {
                    bootstrap_method: b2,
                    method_descriptor: m2,
                },
            ) => b1 == b2 && m1 == m2,
            (
                Constant::Dynamic {
                    bootstrap_method: b1,
                    name_and_type: n1,
                },
                Constant::Dynamic {
                    bootstrap_method: b2,
                    name_and_type: n2,
                },
            ) => b1 == b2 && n1 == n2,
            (Constant::Module(a), Constant::Module(b)) => a == b,
            (Constant::Package(a), Constant::Package(b)) => a == b,
            (Constant::Padding, Constant::Padding) => true,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Constant::Class(name) => name.hash(state),
            Constant::FieldRef(class, name_and_type) => {
                class.hash(state);
                name_and_type.hash(state);
            }
            Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                class.hash(state);
                name_and_type.hash(state);
            }
            Constant::String(value) => value.hash(state),
            Constant::Integer(integer) => integer.hash(state),
            Constant::Float(float) => float.to_bits().hash(state),
            Constant::Long(long) => long.hash(state),
            Constant::Double(double) => double.to_bits().hash(state),
            Constant::NameAndType { name, descriptor } => {
                name.hash(state);
                descriptor.hash(state);
            }
            Constant::Utf8(string) => string.hash(state),
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                handle_kind.hash(state);
                member.hash(state);
            }
            Constant::MethodType { descriptor } => descriptor.hash(state),
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                bootstrap_method.hash(state);
                method_descriptor.hash(state);
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                bootstrap_method.hash(state);
                name_and_type.hash(state);
            }
            Constant::Module(name) | Constant::Package(name) => name.hash(state),
            Constant::Padding => (),
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8(string) => {
                let buffer: Vec<u8> = encode_modified_utf8(string);
                if buffer.len() > u16::MAX as usize {
                    let msg = format!("string constant is {} bytes long", buffer.len());
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
                }
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => integer.serialize(writer)?,
            Constant::Float(float) => float.serialize(writer)?,
            Constant::Long(long) => long.serialize(writer)?,
            Constant::Double(double) => double.serialize(writer)?,
            Constant::Class(name) => name.serialize(writer)?,
            Constant::String(bytes) => bytes.serialize(writer)?,
            Constant::FieldRef(class, name_and_type) => {
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => descriptor.serialize(writer)?,
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::Module(name) | Constant::Package(name) => name.serialize(writer)?,
            Constant::Padding => {
                let msg = "padding constants have no binary form";
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, msg));
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let tag = u8::deserialize(reader)?;
        let constant = match tag {
            1 => {
                let len = u16::deserialize(reader)?;
                let bytes = read_bytes(reader, len as usize)?;
                Constant::Utf8(decode_modified_utf8(&bytes)?)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                method_descriptor: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => {
                return Err(Error::MalformedInput(format!(
                    "invalid constant pool tag {}",
                    other
                )))
            }
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for c in string.chars() {
        match c as u32 {
            code @ 0x01..=0x7F => buffer.push(code as u8),
            code @ (0x00 | 0x80..=0x7FF) => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                // Supplementary characters become two surrogates, each encoded on 3 bytes
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let code = *unit as u32;
                    buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                    buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                    buffer.push((code & 0x3F) as u8 | 0b1000_0000);
                }
            }
        }
    }
    buffer
}

/// Length of a string once encoded in modified UTF-8
pub fn modified_utf8_len(string: &str) -> usize {
    string
        .chars()
        .map(|c| match c as u32 {
            0x01..=0x7F => 1,
            0x00 | 0x80..=0x7FF => 2,
            0x800..=0xFFFF => 3,
            _ => 6,
        })
        .sum()
}

/// Inverse of [`encode_modified_utf8`]
///
/// Unpaired surrogates cannot be represented in a Rust string, so they are rejected along with
/// truncated or invalid byte sequences.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, Error> {
    let malformed = |at: usize| Error::MalformedInput(format!("invalid modified UTF-8 at byte {}", at));
    let continuation = |at: usize| -> Result<u16, Error> {
        match bytes.get(at) {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Ok((b & 0x3F) as u16),
            _ => Err(malformed(at)),
        }
    };

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0b1000_0000 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0b1110_0000 == 0b1100_0000 {
            units.push(((b & 0x1F) as u16) << 6 | continuation(i + 1)?);
            i += 2;
        } else if b & 0b1111_0000 == 0b1110_0000 {
            units.push(((b & 0x0F) as u16) << 12 | continuation(i + 1)? << 6 | continuation(i + 2)?);
            i += 3;
        } else {
            return Err(malformed(i));
        }
    }

    String::from_utf16(&units)
        .map_err(|_| Error::MalformedInput(String::from("unpaired surrogate in modified UTF-8")))
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

/// Conversions and binary format for the typed index wrappers
macro_rules! typed_index {
    ($index:ident) => {
        impl From<$index> for ConstantIndex {
            fn from(index: $index) -> ConstantIndex {
                index.0
            }
        }

        impl Serialize for $index {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $index {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                Ok($index(ConstantIndex::deserialize(reader)?))
            }
        }
    };
}

typed_index!(Utf8ConstantIndex);
typed_index!(ClassConstantIndex);
typed_index!(NameAndTypeConstantIndex);

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let kind = match u8::deserialize(reader)? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => {
                return Err(Error::MalformedInput(format!(
                    "invalid method handle kind {}",
                    other
                )))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod encode_modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(
            encode_modified_utf8("hel10_World"),
            vec![104, 101, 108, 49, 48, 95, 87, 111, 114, 108, 100]
        );
    }

    #[test]
    fn two_and_three_byte_encodings() {
        assert_eq!(
            encode_modified_utf8("ĄǍǞǠǺȀȂȦȺӐӒ"),
            vec![
                196, 132, 199, 141, 199, 158, 199, 160, 199, 186, 200, 128, 200, 130, 200, 166,
                200, 186, 211, 144, 211, 146
            ]
        );
        assert_eq!(
            encode_modified_utf8("ऄअॲঅਅઅଅஅఅಅഅะະ༁ཨ"),
            vec![
                224, 164, 132, 224, 164, 133, 224, 165, 178, 224, 166, 133, 224, 168, 133, 224,
                170, 133, 224, 172, 133, 224, 174, 133, 224, 176, 133, 224, 178, 133, 224, 180,
                133, 224, 184, 176, 224, 186, 176, 224, 188, 129, 224, 189, 168
            ]
        );
    }

    #[test]
    fn supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"), encoded);
        assert_eq!(modified_utf8_len("\u{10000}\u{dffff}\u{10FFFF}"), encoded.len());
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
    }

    #[test]
    fn malformed_sequences() {
        assert!(matches!(decode_modified_utf8(&[0xC0]), Err(Error::MalformedInput(_))));
        assert!(matches!(decode_modified_utf8(&[0xE0, 0x80, 0x41]), Err(Error::MalformedInput(_))));
        assert!(matches!(decode_modified_utf8(&[0xF0, 0x90, 0x80, 0x80]), Err(Error::MalformedInput(_))));
        // lone high surrogate
        assert!(matches!(decode_modified_utf8(&[237, 160, 128]), Err(Error::MalformedInput(_))));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn long_and_double_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.add_long(1).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(pool.size(), 3);
        assert!(matches!(pool.get(ConstantIndex(2)), Err(Error::IndexOutOfRange(_))));

        let double = pool.add_double(1.5).unwrap();
        assert_eq!(double, ConstantIndex(3));
        let int = pool.add_integer(7).unwrap();
        assert_eq!(int, ConstantIndex(5));
        assert_eq!(pool.size(), 6);
        assert!(matches!(pool.get(ConstantIndex(0)), Err(Error::IndexOutOfRange(_))));
        assert!(matches!(pool.get(ConstantIndex(6)), Err(Error::IndexOutOfRange(_))));
    }

    #[test]
    fn constants_are_interned() {
        let mut pool = ConstantPool::new();
        let a = pool.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let size = pool.size();
        let b = pool.add_method_ref("java.lang.Object", "<init>", "()V").unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.size(), size);

        // Interface method references are distinct from method references
        let c = pool.add_interface_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_ne!(a, c);
        assert_eq!(pool.size(), size + 1);

        // NaN compares equal to itself by bit pattern
        let nan1 = pool.add_float(f32::NAN).unwrap();
        let nan2 = pool.add_float(f32::NAN).unwrap();
        assert_eq!(nan1, nan2);
        assert_ne!(pool.add_double(0.0).unwrap(), pool.add_double(-0.0).unwrap());
    }

    #[test]
    fn typed_accessors() {
        let mut pool = ConstantPool::new();
        let field = pool.add_field_ref("foo/Bar", "baz", "J").unwrap();
        let member = pool.member_ref(field).unwrap();
        assert_eq!(member.class_name, "foo/Bar");
        assert_eq!(member.name, "baz");
        assert_eq!(member.descriptor, "J");

        let string = pool.add_string("hello").unwrap();
        assert_eq!(pool.string(string).unwrap(), "hello");
        assert!(matches!(
            pool.class_name(string),
            Err(Error::ConstantTypeMismatch { expected: "Class", .. })
        ));
        assert!(matches!(
            pool.utf8(field),
            Err(Error::ConstantTypeMismatch { expected: "Utf8", .. })
        ));
    }

    #[test]
    fn pool_round_trip() {
        let mut pool = ConstantPool::new();
        pool.add_class("foo/Bar").unwrap();
        pool.add_long(-3).unwrap();
        pool.add_string("a\u{0}b\u{1F600}").unwrap();
        pool.add_float(2.5).unwrap();
        let member = pool.add_method_ref("foo/Bar", "run", "()V").unwrap();
        pool.add_method_handle(HandleKind::InvokeVirtual, member).unwrap();
        pool.add_method_type("(I)J").unwrap();
        pool.add_invoke_dynamic(0, "apply", "()Ljava/util/function/Function;").unwrap();
        pool.add_dynamic(1, "CONST", "I").unwrap();
        pool.add_module("java.base").unwrap();
        pool.add_package("java/lang").unwrap();

        let bytes = pool.to_bytes().unwrap();
        let decoded = ConstantPool::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.size(), pool.size());
        assert_eq!(decoded.intern_state(), InternState::Invalidated);
        let original: Vec<_> = pool.iter().collect();
        let round_tripped: Vec<_> = decoded.iter().collect();
        assert_eq!(original, round_tripped);
        assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_bad_tags() {
        assert!(matches!(
            ConstantPool::from_bytes(&[0, 2, 2, 0, 0]),
            Err(Error::MalformedInput(_))
        ));
        // A long in the last slot does not fit
        assert!(matches!(
            ConstantPool::from_bytes(&[0, 2, 5, 0, 0, 0, 0, 0, 0, 0, 1]),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            ConstantPool::from_bytes(&[0, 2, 15, 10, 0, 1]),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn interning_rebuilds_after_decode() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("x").unwrap();
        let mut decoded = ConstantPool::from_bytes(&pool.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.add_utf8("x").unwrap(), utf8);
        assert_eq!(decoded.intern_state(), InternState::Active);
        assert_eq!(decoded.size(), pool.size());
    }

    #[test]
    fn rename_uses_fresh_utf8_entries() {
        let mut pool = ConstantPool::new();
        let class = pool.add_class("foo/A").unwrap();
        // Same text used as a string literal must not be renamed
        let string = pool.add_string("foo/A").unwrap();
        let method = pool.add_method_ref("foo/A", "make", "(Lfoo/A;)[Lfoo/A;").unwrap();

        pool.rename_class("foo.A", "bar.B").unwrap();
        assert_eq!(pool.class_name(class).unwrap(), "bar/B");
        assert_eq!(pool.string(string).unwrap(), "foo/A");
        let member = pool.member_ref(method).unwrap();
        assert_eq!(member.class_name, "bar/B");
        assert_eq!(member.descriptor, "(Lbar/B;)[Lbar/B;");
        assert_eq!(pool.intern_state(), InternState::Invalidated);

        // Renaming again is a no-op
        let size = pool.size();
        let bytes = pool.to_bytes().unwrap();
        pool.rename_class("foo/A", "bar/B").unwrap();
        assert_eq!(pool.size(), size);
        assert_eq!(pool.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rename_array_classes() {
        let mut pool = ConstantPool::new();
        let array = pool.add_class("[[Lfoo/A;").unwrap();
        let ints = pool.add_class("[I").unwrap();
        pool.rename_class("foo/A", "bar/B").unwrap();
        assert_eq!(pool.class_name(array).unwrap(), "[[Lbar/B;");
        assert_eq!(pool.class_name(ints).unwrap(), "[I");
        assert_eq!(
            pool.referenced_class_names().unwrap(),
            vec![String::from("bar/B")]
        );
    }

    #[test]
    fn swap_renames_do_not_chain() {
        let mut pool = ConstantPool::new();
        let a = pool.add_class("A").unwrap();
        let b = pool.add_class("B").unwrap();
        let mut renames = ClassRenames::new();
        renames.insert(String::from("A"), String::from("B"));
        renames.insert(String::from("B"), String::from("A"));
        pool.rename_classes(&renames).unwrap();
        assert_eq!(pool.class_name(a).unwrap(), "B");
        assert_eq!(pool.class_name(b).unwrap(), "A");
    }

    #[test]
    fn copy_entries_between_pools() {
        let mut src = ConstantPool::new();
        src.add_utf8("padding").unwrap();
        let field = src.add_field_ref("foo/A", "next", "Lfoo/A;").unwrap();

        let mut dest = ConstantPool::new();
        let mut renames = ClassRenames::new();
        renames.insert(String::from("foo/A"), String::from("bar/B"));
        let copied = src.copy_entry(field, &mut dest, &renames).unwrap();
        let member = dest.member_ref(copied).unwrap();
        assert_eq!(member.class_name, "bar/B");
        assert_eq!(member.name, "next");
        assert_eq!(member.descriptor, "Lbar/B;");

        // Copying twice interns
        let size = dest.size();
        assert_eq!(src.copy_entry(field, &mut dest, &renames).unwrap(), copied);
        assert_eq!(dest.size(), size);

        assert_eq!(
            src.copy_entry(ConstantIndex(0), &mut dest, &renames).unwrap(),
            ConstantIndex(0)
        );
    }

    #[test]
    fn copy_leading_entries() {
        let mut src = ConstantPool::new();
        for i in 0..300 {
            src.add_utf8(&format!("filler {}", i)).unwrap();
        }
        let a = src.add_string("a").unwrap();
        let b = src.add_string("b").unwrap();
        let five = src.add_integer(5).unwrap();
        let long = src.add_long(5).unwrap();

        let mut dest = ConstantPool::new();
        let renames = ClassRenames::new();
        let copied = src
            .copy_entries_leading(&[a, b, five], &mut dest, &renames)
            .unwrap();
        assert_eq!(copied, vec![ConstantIndex(1), ConstantIndex(2), ConstantIndex(3)]);
        assert_eq!(dest.string(ConstantIndex(1)).unwrap(), "a");
        assert_eq!(dest.string(ConstantIndex(2)).unwrap(), "b");
        assert_eq!(dest.get(ConstantIndex(3)).unwrap(), &Constant::Integer(5));
        assert_eq!(dest.size(), 6);

        // Later copies and additions find the leading entries
        assert_eq!(src.copy_entry(b, &mut dest, &renames).unwrap(), ConstantIndex(2));
        assert_eq!(dest.add_string("a").unwrap(), ConstantIndex(1));
        assert_eq!(dest.size(), 6);

        assert!(matches!(
            src.copy_entries_leading(&[long], &mut dest, &renames),
            Err(Error::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn utf8_length_limit() {
        let mut pool = ConstantPool::new();
        let long_string = "\u{0}".repeat(40000);
        assert!(matches!(
            pool.add_utf8(&long_string),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert!(pool.add_utf8(&"a".repeat(65535)).is_ok());
    }
}
