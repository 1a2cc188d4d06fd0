use crate::util::{total_width, Width};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Class renaming map, from old binary name to new binary name (eg. `foo/Bar` to `baz/Qux`)
pub type ClassRenames = HashMap<String, String>;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Byte
            | BaseType::Char
            | BaseType::Float
            | BaseType::Int
            | BaseType::Short
            | BaseType::Boolean => 1,
            BaseType::Double | BaseType::Long => 2,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                let msg = format!("Invalid base type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing base type character";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        };
        Ok(typ)
    }
}

/// Reference type (class names are binary names such as `java/lang/String`)
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(String),
    ObjectArray(ArrayType<String>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T> ArrayType<T> {
    /// Total number of dimensions in the array type
    ///
    /// This is always just `additional_dimensions + 1`
    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(name) => {
                write_to.push('L');
                write_to.push_str(name);
                write_to.push(';');
            }
            RefType::ObjectArray(arr) => {
                for _ in 0..arr.dimensions() {
                    write_to.push('[');
                }
                write_to.push('L');
                write_to.push_str(&arr.element_type);
                write_to.push(';');
            }
            RefType::PrimitiveArray(arr) => {
                for _ in 0..arr.dimensions() {
                    write_to.push('[');
                }
                arr.element_type.render_to(write_to);
            }
        }
    }
}

fn parse_class_name(source: &mut Peekable<Chars>) -> Result<String> {
    match source.next() {
        Some('L') => (),
        _ => {
            let msg = "Expected object type to start with `L`";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }
    }
    let mut class_name = String::new();
    loop {
        let c: char = source.next().ok_or_else(|| {
            let msg = format!("Missing terminator for 'L{}'", class_name);
            Error::new(ErrorKind::UnexpectedEof, msg)
        })?;
        if c == ';' {
            if class_name.is_empty() {
                return Err(Error::new(ErrorKind::InvalidInput, "Empty class name"));
            }
            return Ok(class_name);
        }
        class_name.push(c)
    }
}

impl ParseDescriptor for RefType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let mut dimensions = 0;
        while source.next_if_eq(&'[').is_some() {
            dimensions += 1;
        }
        if dimensions == 0 {
            return Ok(RefType::Object(parse_class_name(source)?));
        }
        let additional_dimensions = dimensions - 1;
        if let Some('L') = source.peek() {
            Ok(RefType::ObjectArray(ArrayType {
                additional_dimensions,
                element_type: parse_class_name(source)?,
            }))
        } else {
            Ok(RefType::PrimitiveArray(ArrayType {
                additional_dimensions,
                element_type: BaseType::parse_from(source)?,
            }))
        }
    }
}

/// Field type (the type of a local, field, or value on the stack)
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl FieldType {
    pub fn object(name: impl Into<String>) -> FieldType {
        FieldType::Ref(RefType::Object(name.into()))
    }
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base) => base.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base) => base.render_to(write_to),
            FieldType::Ref(ref_type) => ref_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek() {
            Some('L') | Some('[') => Ok(FieldType::Ref(RefType::parse_from(source)?)),
            _ => Ok(FieldType::Base(BaseType::parse_from(source)?)),
        }
    }
}

/// Method descriptor
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// Return type (`None` is `void`)
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Number of local slots taken up by the parameters (not counting any receiver)
    pub fn parameter_width(&self) -> usize {
        total_width(&self.parameters)
    }

    /// Number of stack slots taken up by the returned value
    pub fn return_width(&self) -> usize {
        self.return_type.as_ref().map_or(0, Width::width)
    }

    /// Change in stack height from calling the method (not counting any receiver)
    pub fn stack_delta(&self) -> isize {
        self.return_width() as isize - self.parameter_width() as isize
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(return_type) => return_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if source.next_if_eq(&'(').is_none() {
            let msg = "Expected method descriptor to start with `(`";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }
        let mut parameters = vec![];
        while source.next_if_eq(&')').is_none() {
            if source.peek().is_none() {
                let msg = "Missing `)` in method descriptor";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
            parameters.push(FieldType::parse_from(source)?);
        }
        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

/// Convert a qualified name (`java.lang.String`) into a binary name (`java/lang/String`)
pub fn to_binary_name(qualified_name: &str) -> String {
    qualified_name.replace('.', "/")
}

/// Convert a binary name (`java/lang/String`) into a qualified name (`java.lang.String`)
pub fn to_qualified_name(binary_name: &str) -> String {
    binary_name.replace('/', ".")
}

/// Rename classes mentioned in a field descriptor, method descriptor, or generic signature
///
/// The input is returned unchanged (and borrowed) if none of its classes are renamed. Input that
/// does not follow the descriptor/signature grammar is also returned unchanged.
pub fn rename_descriptor<'a>(descriptor: &'a str, renames: &ClassRenames) -> Cow<'a, str> {
    if renames.is_empty() {
        return Cow::Borrowed(descriptor);
    }
    let mut walker = SignatureWalker::new(descriptor, |name: &str| renames.get(name).cloned());
    match walker.walk() {
        Ok(()) if walker.changed => Cow::Owned(walker.output),
        Ok(()) => Cow::Borrowed(descriptor),
        Err(msg) => {
            log::warn!("Not renaming in malformed descriptor {:?}: {}", descriptor, msg);
            Cow::Borrowed(descriptor)
        }
    }
}

/// Rename the name stored in a `CONSTANT_Class_info`
///
/// These are usually plain binary names, except for array classes which use a descriptor.
pub fn rename_class_name<'a>(name: &'a str, renames: &ClassRenames) -> Cow<'a, str> {
    if name.starts_with('[') {
        rename_descriptor(name, renames)
    } else {
        match renames.get(name) {
            Some(renamed) => Cow::Owned(renamed.clone()),
            None => Cow::Borrowed(name),
        }
    }
}

/// Collect all of the class names mentioned in a descriptor or signature
pub fn class_names_in_descriptor(descriptor: &str) -> Vec<String> {
    let mut names = vec![];
    let mut walker = SignatureWalker::new(descriptor, |name: &str| {
        names.push(name.to_owned());
        None
    });
    if let Err(msg) = walker.walk() {
        log::warn!("Malformed descriptor {:?}: {}", descriptor, msg);
    }
    names
}

/// Walker over the shared grammar of descriptors and generic signatures
///
/// Recognizes:
///
///   - method descriptors/signatures `<T:..>(params)ret^throws`
///   - field descriptors/signatures and class signatures (a sequence of types)
///   - array prefixes `[`, type variables `TName;`, wildcards `*`, `+`, `-`
///   - class types `Lpkg/Name<args>.Inner<args>;`
///
/// Each class name (only the outer name in a `.Inner` chain) is passed to `on_class_name`, which
/// can return a replacement. The output is the input with replacements substituted.
struct SignatureWalker<'a, F> {
    source: &'a str,
    position: usize,
    output: String,
    changed: bool,
    on_class_name: F,
}

impl<'a, F: FnMut(&str) -> Option<String>> SignatureWalker<'a, F> {
    fn new(source: &'a str, on_class_name: F) -> Self {
        SignatureWalker {
            source,
            position: 0,
            output: String::with_capacity(source.len()),
            changed: false,
            on_class_name,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.position).copied()
    }

    fn expect(&mut self, expected: u8) -> std::result::Result<(), String> {
        match self.peek() {
            Some(b) if b == expected => {
                self.output.push(expected as char);
                self.position += 1;
                Ok(())
            }
            Some(b) => Err(format!(
                "expected '{}' but found '{}' at {}",
                expected as char, b as char, self.position
            )),
            None => Err(format!("expected '{}' but input ended", expected as char)),
        }
    }

    /// Read up to (but not including) one of the terminators
    fn identifier(&mut self, terminators: &[u8]) -> std::result::Result<&'a str, String> {
        let start = self.position;
        let bytes = self.source.as_bytes();
        while self.position < bytes.len() && !terminators.contains(&bytes[self.position]) {
            self.position += 1;
        }
        if self.position >= bytes.len() {
            return Err(format!("unterminated identifier at {}", start));
        }
        Ok(&self.source[start..self.position])
    }

    fn walk(&mut self) -> std::result::Result<(), String> {
        if self.peek() == Some(b'<') {
            self.formal_type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.expect(b'(')?;
            while self.peek() != Some(b')') {
                self.field_type()?;
            }
            self.expect(b')')?;
            if self.peek() == Some(b'V') {
                self.expect(b'V')?;
            } else {
                self.field_type()?;
            }
            while self.peek() == Some(b'^') {
                self.expect(b'^')?;
                self.field_type()?;
            }
            if self.peek().is_some() {
                return Err(format!("leftover input at {}", self.position));
            }
        } else {
            if self.peek().is_none() {
                return Err(String::from("empty descriptor"));
            }
            while self.peek().is_some() {
                self.field_type()?;
            }
        }
        Ok(())
    }

    fn formal_type_parameters(&mut self) -> std::result::Result<(), String> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":>")?;
            if name.is_empty() {
                return Err(format!("empty type parameter name at {}", self.position));
            }
            self.output.push_str(name);
            if self.peek() != Some(b':') {
                return Err(format!("missing bound for type parameter '{}'", name));
            }
            while self.peek() == Some(b':') {
                self.expect(b':')?;
                if let Some(b'L') | Some(b'[') | Some(b'T') = self.peek() {
                    self.field_type()?;
                }
            }
        }
        self.expect(b'>')
    }

    fn field_type(&mut self) -> std::result::Result<(), String> {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => self.expect(b),
            Some(b'[') => {
                self.expect(b'[')?;
                self.field_type()
            }
            Some(b'T') => {
                self.expect(b'T')?;
                let name = self.identifier(b";")?;
                self.output.push_str(name);
                self.expect(b';')
            }
            Some(b'L') => self.class_type(),
            Some(b) => Err(format!("unexpected '{}' at {}", b as char, self.position)),
            None => Err(String::from("expected a type but input ended")),
        }
    }

    fn class_type(&mut self) -> std::result::Result<(), String> {
        self.expect(b'L')?;
        let name = self.identifier(b"<.;")?;
        if name.is_empty() {
            return Err(format!("empty class name at {}", self.position));
        }
        match (self.on_class_name)(name) {
            Some(renamed) if renamed != name => {
                self.output.push_str(&renamed);
                self.changed = true;
            }
            _ => self.output.push_str(name),
        }
        loop {
            match self.peek() {
                Some(b'<') => self.type_arguments()?,
                Some(b'.') => {
                    self.expect(b'.')?;
                    let inner = self.identifier(b"<.;")?;
                    self.output.push_str(inner);
                }
                Some(b';') => return self.expect(b';'),
                _ => return Err(format!("unterminated class type at {}", self.position)),
            }
        }
    }

    fn type_arguments(&mut self) -> std::result::Result<(), String> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.expect(b'*')?,
                Some(b @ (b'+' | b'-')) => {
                    self.expect(b)?;
                    self.field_type()?;
                }
                _ => self.field_type()?,
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn renames(pairs: &[(&str, &str)]) -> ClassRenames {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn parse_method_descriptors() {
        let desc = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)Ljava/lang/Object;").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(desc.parameter_width(), 6);
        assert_eq!(desc.return_width(), 1);
        assert_eq!(desc.stack_delta(), -5);
        assert_eq!(desc.render(), "(IJ[Ljava/lang/String;D)Ljava/lang/Object;");

        let void = MethodDescriptor::parse("()V").unwrap();
        assert_eq!(void.return_type, None);
        assert_eq!(void.stack_delta(), 0);

        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(FieldType::parse("Ljava/lang/String").is_err());
    }

    #[test]
    fn parse_field_descriptors() {
        assert_eq!(FieldType::parse("J").unwrap().width(), 2);
        assert_eq!(
            FieldType::parse("[[I").unwrap(),
            FieldType::Ref(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 1,
                element_type: BaseType::Int,
            }))
        );
        assert_eq!(
            FieldType::parse("Lfoo/Bar;").unwrap(),
            FieldType::object("foo/Bar")
        );
    }

    #[test]
    fn rename_plain_descriptors() {
        let map = renames(&[("foo/A", "bar/B")]);
        assert_eq!(rename_descriptor("Lfoo/A;", &map), "Lbar/B;");
        assert_eq!(rename_descriptor("[[Lfoo/A;", &map), "[[Lbar/B;");
        assert_eq!(
            rename_descriptor("(ILfoo/A;[Lfoo/A;)Lfoo/AB;", &map),
            "(ILbar/B;[Lbar/B;)Lfoo/AB;"
        );
        assert!(matches!(rename_descriptor("(IJ)V", &map), Cow::Borrowed(_)));
    }

    #[test]
    fn rename_generic_signatures() {
        let map = renames(&[("foo/A", "bar/B"), ("java/util/List", "my/List")]);
        assert_eq!(
            rename_descriptor("Ljava/util/List<Lfoo/A;>;", &map),
            "Lmy/List<Lbar/B;>;"
        );
        assert_eq!(
            rename_descriptor("<T:Lfoo/A;U::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;", &map),
            "<T:Lbar/B;U::Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;"
        );
        assert_eq!(
            rename_descriptor("<A:Ljava/lang/Object;>(TA;Ljava/util/List<+Lfoo/A;>;)V^Lfoo/A;", &map),
            "<A:Ljava/lang/Object;>(TA;Lmy/List<+Lbar/B;>;)V^Lbar/B;"
        );
        assert_eq!(
            rename_descriptor("Lfoo/A<*>.Inner<-Lfoo/A;>;", &map),
            "Lbar/B<*>.Inner<-Lbar/B;>;"
        );
    }

    #[test]
    fn type_variables_are_not_classes() {
        // `TLfoo/A;` would be a type variable named `Lfoo/A`, which is not a class reference
        let map = renames(&[("Lkey", "oops")]);
        assert_eq!(
            rename_descriptor("<Lkey:Ljava/lang/Object;>(TLkey;)V", &map),
            "<Lkey:Ljava/lang/Object;>(TLkey;)V"
        );
    }

    #[test]
    fn malformed_descriptors_are_left_alone() {
        let map = renames(&[("foo/A", "bar/B")]);
        assert_eq!(rename_descriptor("Lfoo/A", &map), "Lfoo/A");
        assert_eq!(rename_descriptor("(Lfoo/A;", &map), "(Lfoo/A;");
    }

    #[test]
    fn rename_class_constant_names() {
        let map = renames(&[("foo/A", "bar/B")]);
        assert_eq!(rename_class_name("foo/A", &map), "bar/B");
        assert_eq!(rename_class_name("[Lfoo/A;", &map), "[Lbar/B;");
        assert_eq!(rename_class_name("foo/C", &map), "foo/C");
    }

    #[test]
    fn collect_class_names() {
        assert_eq!(
            class_names_in_descriptor("(Ljava/util/Map<Ljava/lang/String;[Lfoo/A;>;I)V"),
            vec!["java/util/Map", "java/lang/String", "foo/A"]
        );
    }
}
