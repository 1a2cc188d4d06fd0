use classedit::jvm::class_file::{
    ClassFile, ConstantPool, Deserialize, EditState, Field, InternState, Method, Serialize,
    SourceFile,
};
use classedit::jvm::class_file::{Attribute, ConstantIndex};
use classedit::jvm::class_source::MemoryClassSource;
use classedit::jvm::code::{compute_max_stack, opcodes, Bytecode};
use classedit::jvm::descriptors::ClassRenames;
use classedit::jvm::*;

/// `public class Min` with no members, extending nothing, and a two entry constant pool
const MINIMAL_CLASS: [u8; 31] = [
    0xCA, 0xFE, 0xBA, 0xBE, // magic
    0x00, 0x00, 0x00, 0x34, // version 52.0
    0x00, 0x03, // constant pool count
    0x07, 0x00, 0x02, // #1 = Class #2
    0x01, 0x00, 0x03, b'M', b'i', b'n', // #2 = Utf8 "Min"
    0x00, 0x21, // public super
    0x00, 0x01, // this class
    0x00, 0x00, // no superclass
    0x00, 0x00, // interfaces
    0x00, 0x00, // fields
    0x00, 0x00, // methods
];

fn minimal_class_bytes() -> Vec<u8> {
    let mut bytes = MINIMAL_CLASS.to_vec();
    bytes.extend_from_slice(&[0x00, 0x00]); // attributes
    bytes
}

/// Class with a constructor that builds a `foo/A` and a field of type `foo/A`
fn sample_class() -> Result<ClassFile, Error> {
    let mut class = ClassFile::new(ClassAccessFlags::PUBLIC, "foo.Holder", None)?;
    let field = Field::new(&mut class.constants, FieldAccessFlags::PUBLIC, "a", "Lfoo/A;")?;
    class.add_field(field)?;

    let mut code = Bytecode::new(&mut class.constants, false, "()V")?;
    code.add_opcode(opcodes::ALOAD_0);
    code.add_invokespecial("java/lang/Object", "<init>", "()V")?;
    code.add_opcode(opcodes::ALOAD_0);
    code.add_new("foo/A")?;
    code.add_opcode(opcodes::DUP);
    code.add_invokespecial("foo/A", "<init>", "()V")?;
    code.add_putfield("foo/Holder", "a", "Lfoo/A;")?;
    code.add_return(None);
    let code = code.finish()?;

    let mut init = Method::new(&mut class.constants, MethodAccessFlags::PUBLIC, "<init>", "()V")?;
    init.set_code(&mut class.constants, &code)?;
    class.add_method(init)?;

    let source = class.constants.add_utf8("Holder.java")?;
    let source = Attribute::new(&mut class.constants, &SourceFile(source))?;
    class.add_attribute(source)?;
    Ok(class)
}

#[test]
fn minimal_class_fixture() {
    let bytes = minimal_class_bytes();
    let class = ClassFile::parse(&bytes).unwrap();

    // Count includes the reserved index 0
    assert_eq!(class.constants.size(), 3);
    assert_eq!(class.constants.intern_state(), InternState::Invalidated);
    assert_eq!(class.name().unwrap(), "Min");
    assert_eq!(class.super_class_name().unwrap(), None);
    assert_eq!(class.version, classedit::jvm::class_file::Version::JAVA8);
    assert!(class.fields.is_empty());
    assert!(class.methods.is_empty());
    assert_eq!(class.to_bytes().unwrap(), bytes);

    assert!(matches!(
        ClassFile::parse(&MINIMAL_CLASS),
        Err(Error::MalformedInput(_))
    ));
}

#[test]
fn constant_pool_interning() {
    let mut first = ConstantPool::new();
    let x1 = first.add_utf8("x").unwrap();
    let x2 = first.add_utf8("x").unwrap();
    assert_eq!(x1, x2);
    first.add_class("x").unwrap();

    let mut second = ConstantPool::new();
    second.add_class("x").unwrap();
    second.add_utf8("x").unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());

    let before = first.size();
    first.add_long(7).unwrap();
    first.add_double(0.5).unwrap();
    assert_eq!(first.size(), before + 4);

    let decoded = ConstantPool::from_bytes(&first.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.size(), first.size());
    assert_eq!(decoded.to_bytes().unwrap(), first.to_bytes().unwrap());
}

#[test]
fn max_stack_of_arithmetic() {
    let constants = ConstantPool::new();
    let code = [
        opcodes::ICONST_1,
        opcodes::ICONST_2,
        opcodes::IADD,
        opcodes::IRETURN,
    ];
    assert_eq!(compute_max_stack(&code, &[], &constants).unwrap(), 2);
}

#[test]
fn max_stack_of_construction() {
    let mut constants = ConstantPool::new();
    let class = constants.add_class("C").unwrap();
    let init = constants.add_method_ref("C", "<init>", "()V").unwrap();
    let [class_hi, class_lo] = class.0 .0.to_be_bytes();
    let [init_hi, init_lo] = init.0.to_be_bytes();
    let code = [
        opcodes::NEW,
        class_hi,
        class_lo,
        opcodes::DUP,
        opcodes::INVOKESPECIAL,
        init_hi,
        init_lo,
        opcodes::ASTORE_0,
    ];
    assert_eq!(compute_max_stack(&code, &[], &constants).unwrap(), 2);
}

#[test]
fn generated_class_round_trip() {
    let class = sample_class().unwrap();
    let bytes = class.to_bytes().unwrap();
    let decoded = ClassFile::parse(&bytes).unwrap();
    assert_eq!(decoded.to_bytes().unwrap(), bytes);
    assert_eq!(decoded.source_file().unwrap(), Some("Holder.java"));

    let init = decoded.method("<init>", "()V").unwrap().unwrap();
    let code = init.code(&decoded.constants).unwrap().unwrap();
    assert_eq!(code.max_stack, 3);
    assert_eq!(code.max_locals, 1);
    assert_eq!(code.compute_max_stack(&decoded.constants).unwrap(), 3);
    assert_eq!(
        decoded.referenced_classes().unwrap(),
        vec!["foo/A", "foo/Holder", "java/lang/Object"]
    );
}

#[test]
fn rename_is_idempotent() {
    let mut class = sample_class().unwrap();
    let original = class.to_bytes().unwrap();

    class.rename_class("x.Absent", "x.Other").unwrap();
    assert_eq!(class.to_bytes().unwrap(), original);

    class.rename_class("foo.A", "bar.B").unwrap();
    let renamed = class.to_bytes().unwrap();
    assert_ne!(renamed, original);
    class.rename_class("foo.A", "bar.B").unwrap();
    assert_eq!(class.to_bytes().unwrap(), renamed);

    let field = class.field("a").unwrap().unwrap();
    assert_eq!(field.descriptor(&class.constants).unwrap(), "Lbar/B;");
    let classes = class.referenced_classes().unwrap();
    assert!(classes.contains(&String::from("bar/B")));
    assert!(!classes.contains(&String::from("foo/A")));

    let mut renames = ClassRenames::new();
    renames.insert(String::from("foo/Holder"), String::from("foo/Renamed"));
    renames.insert(String::from("bar/B"), String::from("foo/Holder"));
    class.rename_classes(&renames).unwrap();
    assert_eq!(class.name().unwrap(), "foo/Renamed");
    let field = class.field("a").unwrap().unwrap();
    assert_eq!(field.descriptor(&class.constants).unwrap(), "Lfoo/Holder;");
}

#[test]
fn compaction_freezes_until_defrosted() {
    let mut class = sample_class().unwrap();
    class.constants.add_string("never used").unwrap();
    let before = class.constants.size();
    class.compact().unwrap();
    assert!(class.constants.size() < before);
    assert_eq!(class.constants.intern_state(), InternState::Invalidated);
    assert_eq!(class.edit_state(), EditState::Compacted);

    let frozen = class.to_bytes().unwrap();
    let method = Method::new(&mut class.constants, MethodAccessFlags::PUBLIC, "m", "()V").unwrap();
    assert!(matches!(class.add_method(method), Err(Error::Frozen)));
    assert!(matches!(
        class.rename_class("foo.A", "bar.B"),
        Err(Error::Frozen)
    ));
    assert_eq!(class.methods.len(), 1);

    class.defrost().unwrap();
    assert_eq!(class.edit_state(), EditState::Editable);
    class.rename_class("foo.A", "bar.B").unwrap();
    assert_ne!(class.to_bytes().unwrap(), frozen);

    let decoded = ClassFile::parse(&frozen).unwrap();
    let init = decoded.method("<init>", "()V").unwrap().unwrap();
    let code = init.code(&decoded.constants).unwrap().unwrap();
    assert_eq!(code.compute_max_stack(&decoded.constants).unwrap(), 3);
}

#[test]
fn pruned_class_has_no_bodies() {
    let mut class = sample_class().unwrap();
    class.prune().unwrap();
    assert_eq!(class.edit_state(), EditState::Pruned);

    let decoded = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded.source_file().unwrap(), None);
    assert!(decoded.attributes.is_empty());
    let init = decoded.method("<init>", "()V").unwrap().unwrap();
    assert!(init.code(&decoded.constants).unwrap().is_none());
    assert_eq!(decoded.field("a").unwrap().unwrap().descriptor(&decoded.constants).unwrap(), "Lfoo/A;");
    assert_eq!(
        decoded.referenced_classes().unwrap(),
        vec!["foo/Holder", "java/lang/Object"]
    );

    assert!(matches!(class.defrost(), Err(Error::Frozen)));
    assert!(matches!(class.compact(), Err(Error::Frozen)));
}

#[test]
fn load_from_source() {
    let mut source = MemoryClassSource::new();
    source.insert("Min", minimal_class_bytes());
    let class = ClassFile::load(&source, "Min").unwrap();
    assert_eq!(class.name().unwrap(), "Min");
    assert!(matches!(
        ClassFile::load(&source, "foo.Missing"),
        Err(Error::ClassNotFound(_))
    ));
}

/// Class with 100 static methods each loading their own string with `ldc`
///
/// The strings are added up front, so every `ldc` operand fits in one byte even though the pool
/// ends up with more than 256 slots.
fn many_strings_class() -> Result<ClassFile, Error> {
    let mut class = ClassFile::new(ClassAccessFlags::PUBLIC, "foo.Strings", None)?;
    for i in 0..100 {
        class.constants.add_string(&format!("string {}", i))?;
    }
    for i in 0..100 {
        let descriptor = "()Ljava/lang/String;";
        let mut code = Bytecode::new(&mut class.constants, true, descriptor)?;
        code.add_string_constant(&format!("string {}", i))?;
        code.add_opcode(opcodes::ARETURN);
        let code = code.finish()?;

        let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
        let name = format!("get{}", i);
        let mut method = Method::new(&mut class.constants, flags, &name, descriptor)?;
        method.set_code(&mut class.constants, &code)?;
        class.add_method(method)?;
    }
    Ok(class)
}

fn assert_loads_own_string(class: &ClassFile) {
    for (i, method) in class.methods.iter().enumerate() {
        let code = method.code(&class.constants).unwrap().unwrap();
        let bytes = &code.code_array.0;
        assert_eq!(bytes[0], opcodes::LDC);
        let string = class.constants.string(ConstantIndex(bytes[1] as u16)).unwrap();
        assert_eq!(string, format!("string {}", i));
    }
}

#[test]
fn compact_large_pool_with_ldc() {
    let mut class = many_strings_class().unwrap();
    assert!(class.constants.size() > 300);
    assert_loads_own_string(&class);

    class.compact().unwrap();
    assert!(class.constants.size() > 256);
    assert_loads_own_string(&class);

    let decoded = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
    assert_loads_own_string(&decoded);
    let code = decoded.methods[99].code(&decoded.constants).unwrap().unwrap();
    assert_eq!(code.compute_max_stack(&decoded.constants).unwrap(), 1);
}

#[test]
fn prune_large_pool_with_ldc() {
    let mut class = many_strings_class().unwrap();
    class.prune().unwrap();
    assert_eq!(class.methods.len(), 100);
    assert!(class
        .methods
        .iter()
        .all(|method| method.code(&class.constants).unwrap().is_none()));
    // Only the strings loaded from the dropped bodies went away
    assert!(class.constants.size() < 256);
}
