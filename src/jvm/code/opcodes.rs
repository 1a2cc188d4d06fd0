//! Opcode numbering and static properties of JVM instructions
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html

use crate::jvm::class_file::{ConstantIndex, ConstantPool};
use crate::jvm::descriptors::{FieldType, MethodDescriptor, ParseDescriptor};
use crate::jvm::{Error, VerifierErrorKind};
use crate::util::Width;

pub const NOP: u8 = 0;
pub const ACONST_NULL: u8 = 1;
pub const ICONST_M1: u8 = 2;
pub const ICONST_0: u8 = 3;
pub const ICONST_1: u8 = 4;
pub const ICONST_2: u8 = 5;
pub const ICONST_3: u8 = 6;
pub const ICONST_4: u8 = 7;
pub const ICONST_5: u8 = 8;
pub const LCONST_0: u8 = 9;
pub const LCONST_1: u8 = 10;
pub const FCONST_0: u8 = 11;
pub const FCONST_1: u8 = 12;
pub const FCONST_2: u8 = 13;
pub const DCONST_0: u8 = 14;
pub const DCONST_1: u8 = 15;
pub const BIPUSH: u8 = 16;
pub const SIPUSH: u8 = 17;
pub const LDC: u8 = 18;
pub const LDC_W: u8 = 19;
pub const LDC2_W: u8 = 20;
pub const ILOAD: u8 = 21;
pub const LLOAD: u8 = 22;
pub const FLOAD: u8 = 23;
pub const DLOAD: u8 = 24;
pub const ALOAD: u8 = 25;
pub const ILOAD_0: u8 = 26;
pub const ILOAD_1: u8 = 27;
pub const ILOAD_2: u8 = 28;
pub const ILOAD_3: u8 = 29;
pub const LLOAD_0: u8 = 30;
pub const LLOAD_1: u8 = 31;
pub const LLOAD_2: u8 = 32;
pub const LLOAD_3: u8 = 33;
pub const FLOAD_0: u8 = 34;
pub const FLOAD_1: u8 = 35;
pub const FLOAD_2: u8 = 36;
pub const FLOAD_3: u8 = 37;
pub const DLOAD_0: u8 = 38;
pub const DLOAD_1: u8 = 39;
pub const DLOAD_2: u8 = 40;
pub const DLOAD_3: u8 = 41;
pub const ALOAD_0: u8 = 42;
pub const ALOAD_1: u8 = 43;
pub const ALOAD_2: u8 = 44;
pub const ALOAD_3: u8 = 45;
pub const IALOAD: u8 = 46;
pub const LALOAD: u8 = 47;
pub const FALOAD: u8 = 48;
pub const DALOAD: u8 = 49;
pub const AALOAD: u8 = 50;
pub const BALOAD: u8 = 51;
pub const CALOAD: u8 = 52;
pub const SALOAD: u8 = 53;
pub const ISTORE: u8 = 54;
pub const LSTORE: u8 = 55;
pub const FSTORE: u8 = 56;
pub const DSTORE: u8 = 57;
pub const ASTORE: u8 = 58;
pub const ISTORE_0: u8 = 59;
pub const ISTORE_1: u8 = 60;
pub const ISTORE_2: u8 = 61;
pub const ISTORE_3: u8 = 62;
pub const LSTORE_0: u8 = 63;
pub const LSTORE_1: u8 = 64;
pub const LSTORE_2: u8 = 65;
pub const LSTORE_3: u8 = 66;
pub const FSTORE_0: u8 = 67;
pub const FSTORE_1: u8 = 68;
pub const FSTORE_2: u8 = 69;
pub const FSTORE_3: u8 = 70;
pub const DSTORE_0: u8 = 71;
pub const DSTORE_1: u8 = 72;
pub const DSTORE_2: u8 = 73;
pub const DSTORE_3: u8 = 74;
pub const ASTORE_0: u8 = 75;
pub const ASTORE_1: u8 = 76;
pub const ASTORE_2: u8 = 77;
pub const ASTORE_3: u8 = 78;
pub const IASTORE: u8 = 79;
pub const LASTORE: u8 = 80;
pub const FASTORE: u8 = 81;
pub const DASTORE: u8 = 82;
pub const AASTORE: u8 = 83;
pub const BASTORE: u8 = 84;
pub const CASTORE: u8 = 85;
pub const SASTORE: u8 = 86;
pub const POP: u8 = 87;
pub const POP2: u8 = 88;
pub const DUP: u8 = 89;
pub const DUP_X1: u8 = 90;
pub const DUP_X2: u8 = 91;
pub const DUP2: u8 = 92;
pub const DUP2_X1: u8 = 93;
pub const DUP2_X2: u8 = 94;
pub const SWAP: u8 = 95;
pub const IADD: u8 = 96;
pub const LADD: u8 = 97;
pub const FADD: u8 = 98;
pub const DADD: u8 = 99;
pub const ISUB: u8 = 100;
pub const LSUB: u8 = 101;
pub const FSUB: u8 = 102;
pub const DSUB: u8 = 103;
pub const IMUL: u8 = 104;
pub const LMUL: u8 = 105;
pub const FMUL: u8 = 106;
pub const DMUL: u8 = 107;
pub const IDIV: u8 = 108;
pub const LDIV: u8 = 109;
pub const FDIV: u8 = 110;
pub const DDIV: u8 = 111;
pub const IREM: u8 = 112;
pub const LREM: u8 = 113;
pub const FREM: u8 = 114;
pub const DREM: u8 = 115;
pub const INEG: u8 = 116;
pub const LNEG: u8 = 117;
pub const FNEG: u8 = 118;
pub const DNEG: u8 = 119;
pub const ISHL: u8 = 120;
pub const LSHL: u8 = 121;
pub const ISHR: u8 = 122;
pub const LSHR: u8 = 123;
pub const IUSHR: u8 = 124;
pub const LUSHR: u8 = 125;
pub const IAND: u8 = 126;
pub const LAND: u8 = 127;
pub const IOR: u8 = 128;
pub const LOR: u8 = 129;
pub const IXOR: u8 = 130;
pub const LXOR: u8 = 131;
pub const IINC: u8 = 132;
pub const I2L: u8 = 133;
pub const I2F: u8 = 134;
pub const I2D: u8 = 135;
pub const L2I: u8 = 136;
pub const L2F: u8 = 137;
pub const L2D: u8 = 138;
pub const F2I: u8 = 139;
pub const F2L: u8 = 140;
pub const F2D: u8 = 141;
pub const D2I: u8 = 142;
pub const D2L: u8 = 143;
pub const D2F: u8 = 144;
pub const I2B: u8 = 145;
pub const I2C: u8 = 146;
pub const I2S: u8 = 147;
pub const LCMP: u8 = 148;
pub const FCMPL: u8 = 149;
pub const FCMPG: u8 = 150;
pub const DCMPL: u8 = 151;
pub const DCMPG: u8 = 152;
pub const IFEQ: u8 = 153;
pub const IFNE: u8 = 154;
pub const IFLT: u8 = 155;
pub const IFGE: u8 = 156;
pub const IFGT: u8 = 157;
pub const IFLE: u8 = 158;
pub const IF_ICMPEQ: u8 = 159;
pub const IF_ICMPNE: u8 = 160;
pub const IF_ICMPLT: u8 = 161;
pub const IF_ICMPGE: u8 = 162;
pub const IF_ICMPGT: u8 = 163;
pub const IF_ICMPLE: u8 = 164;
pub const IF_ACMPEQ: u8 = 165;
pub const IF_ACMPNE: u8 = 166;
pub const GOTO: u8 = 167;
pub const JSR: u8 = 168;
pub const RET: u8 = 169;
pub const TABLESWITCH: u8 = 170;
pub const LOOKUPSWITCH: u8 = 171;
pub const IRETURN: u8 = 172;
pub const LRETURN: u8 = 173;
pub const FRETURN: u8 = 174;
pub const DRETURN: u8 = 175;
pub const ARETURN: u8 = 176;
pub const RETURN: u8 = 177;
pub const GETSTATIC: u8 = 178;
pub const PUTSTATIC: u8 = 179;
pub const GETFIELD: u8 = 180;
pub const PUTFIELD: u8 = 181;
pub const INVOKEVIRTUAL: u8 = 182;
pub const INVOKESPECIAL: u8 = 183;
pub const INVOKESTATIC: u8 = 184;
pub const INVOKEINTERFACE: u8 = 185;
pub const INVOKEDYNAMIC: u8 = 186;
pub const NEW: u8 = 187;
pub const NEWARRAY: u8 = 188;
pub const ANEWARRAY: u8 = 189;
pub const ARRAYLENGTH: u8 = 190;
pub const ATHROW: u8 = 191;
pub const CHECKCAST: u8 = 192;
pub const INSTANCEOF: u8 = 193;
pub const MONITORENTER: u8 = 194;
pub const MONITOREXIT: u8 = 195;
pub const WIDE: u8 = 196;
pub const MULTIANEWARRAY: u8 = 197;
pub const IFNULL: u8 = 198;
pub const IFNONNULL: u8 = 199;
pub const GOTO_W: u8 = 200;
pub const JSR_W: u8 = 201;

/// Static properties of an opcode
#[derive(Copy, Clone, Debug)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,

    /// Instruction length in bytes, including the opcode (`0` for `tableswitch`, `lookupswitch`,
    /// and `wide`, which have variable length)
    pub length: u8,

    /// Change in stack depth (`None` when it depends on a descriptor or operand)
    pub stack_grow: Option<i8>,
}

#[rustfmt::skip]
pub const OPCODES: [OpcodeInfo; 202] = [
    OpcodeInfo { mnemonic: "nop", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "aconst_null", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_m1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_0", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_3", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_4", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iconst_5", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "lconst_0", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "lconst_1", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "fconst_0", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "fconst_1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "fconst_2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dconst_0", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dconst_1", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "bipush", length: 2, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "sipush", length: 3, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "ldc", length: 2, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "ldc_w", length: 3, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "ldc2_w", length: 3, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "iload", length: 2, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "lload", length: 2, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "fload", length: 2, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dload", length: 2, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "aload", length: 2, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iload_0", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iload_1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iload_2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iload_3", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "lload_0", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "lload_1", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "lload_2", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "lload_3", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "fload_0", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "fload_1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "fload_2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "fload_3", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dload_0", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dload_1", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dload_2", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dload_3", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "aload_0", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "aload_1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "aload_2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "aload_3", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "iaload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "laload", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "faload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "daload", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "aaload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "baload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "caload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "saload", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "istore", length: 2, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lstore", length: 2, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fstore", length: 2, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dstore", length: 2, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "astore", length: 2, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "istore_0", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "istore_1", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "istore_2", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "istore_3", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lstore_0", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "lstore_1", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "lstore_2", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "lstore_3", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fstore_0", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "fstore_1", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "fstore_2", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "fstore_3", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dstore_0", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "dstore_1", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "dstore_2", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "dstore_3", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "astore_0", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "astore_1", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "astore_2", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "astore_3", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "iastore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "lastore", length: 1, stack_grow: Some(-4) },
    OpcodeInfo { mnemonic: "fastore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "dastore", length: 1, stack_grow: Some(-4) },
    OpcodeInfo { mnemonic: "aastore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "bastore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "castore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "sastore", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "pop", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "pop2", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "dup", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dup_x1", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dup_x2", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "dup2", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dup2_x1", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "dup2_x2", length: 1, stack_grow: Some(2) },
    OpcodeInfo { mnemonic: "swap", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "iadd", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ladd", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fadd", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dadd", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "isub", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lsub", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fsub", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dsub", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "imul", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lmul", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fmul", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dmul", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "idiv", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ldiv", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "fdiv", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ddiv", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "irem", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lrem", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "frem", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "drem", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "ineg", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "lneg", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "fneg", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "dneg", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "ishl", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lshl", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ishr", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lshr", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "iushr", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lushr", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "iand", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "land", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "ior", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lor", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "ixor", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lxor", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "iinc", length: 3, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "i2l", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "i2f", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "i2d", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "l2i", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "l2f", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "l2d", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "f2i", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "f2l", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "f2d", length: 1, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "d2i", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "d2l", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "d2f", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "i2b", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "i2c", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "i2s", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "lcmp", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "fcmpl", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "fcmpg", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dcmpl", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "dcmpg", length: 1, stack_grow: Some(-3) },
    OpcodeInfo { mnemonic: "ifeq", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ifne", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "iflt", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ifge", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ifgt", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ifle", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "if_icmpeq", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_icmpne", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_icmplt", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_icmpge", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_icmpgt", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_icmple", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_acmpeq", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "if_acmpne", length: 3, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "goto", length: 3, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "jsr", length: 3, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "ret", length: 2, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "tableswitch", length: 0, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lookupswitch", length: 0, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ireturn", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "lreturn", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "freturn", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "dreturn", length: 1, stack_grow: Some(-2) },
    OpcodeInfo { mnemonic: "areturn", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "return", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "getstatic", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "putstatic", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "getfield", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "putfield", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "invokevirtual", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "invokespecial", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "invokestatic", length: 3, stack_grow: None },
    OpcodeInfo { mnemonic: "invokeinterface", length: 5, stack_grow: None },
    OpcodeInfo { mnemonic: "invokedynamic", length: 5, stack_grow: None },
    OpcodeInfo { mnemonic: "new", length: 3, stack_grow: Some(1) },
    OpcodeInfo { mnemonic: "newarray", length: 2, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "anewarray", length: 3, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "arraylength", length: 1, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "athrow", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "checkcast", length: 3, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "instanceof", length: 3, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "monitorenter", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "monitorexit", length: 1, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "wide", length: 0, stack_grow: None },
    OpcodeInfo { mnemonic: "multianewarray", length: 4, stack_grow: None },
    OpcodeInfo { mnemonic: "ifnull", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "ifnonnull", length: 3, stack_grow: Some(-1) },
    OpcodeInfo { mnemonic: "goto_w", length: 5, stack_grow: Some(0) },
    OpcodeInfo { mnemonic: "jsr_w", length: 5, stack_grow: Some(1) },
];

/// Look up the static properties of an opcode
pub fn info(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.get(opcode as usize)
}

/// Mnemonic of an opcode, eg. `invokevirtual`
pub fn mnemonic(opcode: u8) -> &'static str {
    info(opcode).map_or("<unknown>", |info| info.mnemonic)
}

/// Instructions after which control never falls through to the next instruction
pub fn is_terminal(opcode: u8) -> bool {
    matches!(
        opcode,
        IRETURN..=RETURN | ATHROW | GOTO | GOTO_W | TABLESWITCH | LOOKUPSWITCH | RET
    )
}

/// Padding bytes after a `tableswitch` or `lookupswitch` opcode at `offset`
pub fn switch_padding(offset: usize) -> usize {
    3 - offset % 4
}

pub fn read_u8(code: &[u8], at: usize) -> Result<u8, VerifierErrorKind> {
    code.get(at)
        .copied()
        .ok_or(VerifierErrorKind::TruncatedInstruction)
}

pub fn read_u16(code: &[u8], at: usize) -> Result<u16, VerifierErrorKind> {
    Ok(u16::from_be_bytes([read_u8(code, at)?, read_u8(code, at + 1)?]))
}

pub fn read_i16(code: &[u8], at: usize) -> Result<i16, VerifierErrorKind> {
    Ok(read_u16(code, at)? as i16)
}

pub fn read_i32(code: &[u8], at: usize) -> Result<i32, VerifierErrorKind> {
    let bytes = code
        .get(at..at + 4)
        .ok_or(VerifierErrorKind::TruncatedInstruction)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Length in bytes of the instruction starting at `offset`
pub fn instruction_length(code: &[u8], offset: usize) -> Result<usize, VerifierErrorKind> {
    let opcode = read_u8(code, offset)?;
    let info = info(opcode).ok_or(VerifierErrorKind::UnknownOpcode(opcode))?;
    let length = match opcode {
        TABLESWITCH => {
            let operands = offset + 1 + switch_padding(offset);
            let low = read_i32(code, operands + 4)? as i64;
            let high = read_i32(code, operands + 8)? as i64;
            if high < low {
                return Err(VerifierErrorKind::TruncatedInstruction);
            }
            (operands - offset) + 12 + 4 * (high - low + 1) as usize
        }
        LOOKUPSWITCH => {
            let operands = offset + 1 + switch_padding(offset);
            let pairs = read_i32(code, operands + 4)?;
            if pairs < 0 {
                return Err(VerifierErrorKind::TruncatedInstruction);
            }
            (operands - offset) + 8 + 8 * pairs as usize
        }
        WIDE => {
            if read_u8(code, offset + 1)? == IINC {
                6
            } else {
                4
            }
        }
        _ => info.length as usize,
    };
    if offset + length > code.len() {
        return Err(VerifierErrorKind::TruncatedInstruction);
    }
    Ok(length)
}

/// Absolute branch targets of the instruction at `offset` (empty for non-branching instructions)
///
/// Targets are not range checked, so they may be negative or past the end of the code.
pub fn branch_targets(code: &[u8], offset: usize) -> Result<Vec<i64>, VerifierErrorKind> {
    let base = offset as i64;
    let targets = match read_u8(code, offset)? {
        IFEQ..=JSR | IFNULL | IFNONNULL => vec![base + read_i16(code, offset + 1)? as i64],
        GOTO_W | JSR_W => vec![base + read_i32(code, offset + 1)? as i64],
        TABLESWITCH => {
            let operands = offset + 1 + switch_padding(offset);
            let low = read_i32(code, operands + 4)?;
            let high = read_i32(code, operands + 8)?;
            let mut targets = vec![base + read_i32(code, operands)? as i64];
            for i in 0..(high as i64 - low as i64 + 1).max(0) as usize {
                targets.push(base + read_i32(code, operands + 12 + 4 * i)? as i64);
            }
            targets
        }
        LOOKUPSWITCH => {
            let operands = offset + 1 + switch_padding(offset);
            let pairs = read_i32(code, operands + 4)?.max(0) as usize;
            let mut targets = vec![base + read_i32(code, operands)? as i64];
            for i in 0..pairs {
                targets.push(base + read_i32(code, operands + 8 + 8 * i + 4)? as i64);
            }
            targets
        }
        _ => vec![],
    };
    Ok(targets)
}

/// Change in stack depth caused by the instruction at `offset`
///
/// Field and method instructions look up their descriptor in the constant pool.
pub fn stack_delta(code: &[u8], offset: usize, constants: &ConstantPool) -> Result<isize, Error> {
    let fail = |kind: VerifierErrorKind| Error::VerificationError { offset, kind };
    let opcode = read_u8(code, offset).map_err(fail)?;
    let info = info(opcode).ok_or_else(|| fail(VerifierErrorKind::UnknownOpcode(opcode)))?;
    if let Some(grow) = info.stack_grow {
        return Ok(grow as isize);
    }

    let delta = match opcode {
        GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => {
            let index = read_u16(code, offset + 1).map_err(fail)?;
            let member = constants.member_ref(ConstantIndex(index))?;
            let size = field_size(member.descriptor).map_err(fail)?;
            match opcode {
                GETSTATIC => size,
                PUTSTATIC => -size,
                GETFIELD => size - 1,
                _ => -(size + 1),
            }
        }
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
            let index = read_u16(code, offset + 1).map_err(fail)?;
            let member = constants.member_ref(ConstantIndex(index))?;
            let data_size = method_data_size(member.descriptor).map_err(fail)?;
            if opcode == INVOKESTATIC {
                data_size
            } else {
                data_size - 1
            }
        }
        INVOKEDYNAMIC => {
            let index = read_u16(code, offset + 1).map_err(fail)?;
            let (_, _, descriptor) =
                constants.dynamic(ConstantIndex(index))?;
            method_data_size(descriptor).map_err(fail)?
        }
        MULTIANEWARRAY => 1 - read_u8(code, offset + 3).map_err(fail)? as isize,
        WIDE => {
            let wrapped = read_u8(code, offset + 1).map_err(fail)?;
            match wrapped {
                ILOAD..=ALOAD | ISTORE..=ASTORE | IINC | RET => {
                    OPCODES[wrapped as usize].stack_grow.unwrap_or(0) as isize
                }
                _ => return Err(fail(VerifierErrorKind::UnknownOpcode(wrapped))),
            }
        }
        _ => return Err(fail(VerifierErrorKind::UnknownOpcode(opcode))),
    };
    Ok(delta)
}

/// Number of stack slots taken up by a value of a field descriptor
pub fn field_size(descriptor: &str) -> Result<isize, VerifierErrorKind> {
    FieldType::parse(descriptor)
        .map(|field_type| field_type.width() as isize)
        .map_err(|_| VerifierErrorKind::BadDescriptor(descriptor.to_owned()))
}

/// Size of the returned value minus the size of the arguments of a method descriptor
pub fn method_data_size(descriptor: &str) -> Result<isize, VerifierErrorKind> {
    MethodDescriptor::parse(descriptor)
        .map(|method| method.stack_delta())
        .map_err(|_| VerifierErrorKind::BadDescriptor(descriptor.to_owned()))
}

/// Iterator over the offsets and opcodes of a code array
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [u8]) -> Instructions<'a> {
        Instructions { code, offset: 0 }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<(usize, u8), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.code.len() {
            return None;
        }
        let offset = self.offset;
        match instruction_length(self.code, offset) {
            Ok(length) => {
                self.offset += length;
                Some(Ok((offset, self.code[offset])))
            }
            Err(kind) => {
                self.offset = self.code.len();
                Some(Err(Error::VerificationError { offset, kind }))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_is_indexed_by_opcode() {
        assert_eq!(mnemonic(NOP), "nop");
        assert_eq!(mnemonic(LADD), "ladd");
        assert_eq!(mnemonic(IINC), "iinc");
        assert_eq!(mnemonic(LCMP), "lcmp");
        assert_eq!(mnemonic(GOTO), "goto");
        assert_eq!(mnemonic(RETURN), "return");
        assert_eq!(mnemonic(INVOKEDYNAMIC), "invokedynamic");
        assert_eq!(mnemonic(JSR_W), "jsr_w");
        assert_eq!(mnemonic(202), "<unknown>");
        assert_eq!(OPCODES[LCONST_1 as usize].stack_grow, Some(2));
        assert_eq!(OPCODES[DASTORE as usize].stack_grow, Some(-4));
    }

    #[test]
    fn variable_length_instructions() {
        // tableswitch at offset 1: 2 bytes of padding, default, low = 0, high = 1, 2 targets
        let mut code = vec![NOP, TABLESWITCH, 0, 0];
        code.extend_from_slice(&[0, 0, 0, 20, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 30, 0, 0, 0, 40]);
        assert_eq!(instruction_length(&code, 1), Ok(3 + 20));
        assert_eq!(branch_targets(&code, 1), Ok(vec![21, 31, 41]));

        // lookupswitch at offset 0: 3 bytes of padding, default, 1 pair
        let mut code = vec![LOOKUPSWITCH, 0, 0, 0];
        code.extend_from_slice(&[0, 0, 0, 8, 0, 0, 0, 1, 0, 0, 0, 5, 0, 0, 0, 12]);
        assert_eq!(instruction_length(&code, 0), Ok(20));
        assert_eq!(branch_targets(&code, 0), Ok(vec![8, 12]));

        assert_eq!(instruction_length(&[WIDE, IINC, 1, 0, 0, 1], 0), Ok(6));
        assert_eq!(instruction_length(&[WIDE, ILOAD, 1, 0], 0), Ok(4));
        assert_eq!(
            instruction_length(&[SIPUSH, 1], 0),
            Err(VerifierErrorKind::TruncatedInstruction)
        );
        assert_eq!(
            instruction_length(&[0xFE], 0),
            Err(VerifierErrorKind::UnknownOpcode(0xFE))
        );
    }

    #[test]
    fn iterate_instructions() {
        let code = [ICONST_1, BIPUSH, 7, IADD, GOTO, 0xFF, 0xFC];
        let offsets: Vec<(usize, u8)> = Instructions::new(&code)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(offsets, vec![(0, ICONST_1), (1, BIPUSH), (3, IADD), (4, GOTO)]);
        assert_eq!(branch_targets(&code, 4), Ok(vec![0]));
    }

    #[test]
    fn descriptor_dependent_deltas() {
        let mut pool = ConstantPool::new();
        let field = pool.add_field_ref("A", "f", "J").unwrap();
        let method = pool.add_method_ref("A", "m", "(IJ)D").unwrap();
        let [f1, f2] = field.0.to_be_bytes();
        let [m1, m2] = method.0.to_be_bytes();

        assert_eq!(stack_delta(&[GETFIELD, f1, f2], 0, &pool).unwrap(), 1);
        assert_eq!(stack_delta(&[PUTFIELD, f1, f2], 0, &pool).unwrap(), -3);
        assert_eq!(stack_delta(&[GETSTATIC, f1, f2], 0, &pool).unwrap(), 2);
        assert_eq!(stack_delta(&[PUTSTATIC, f1, f2], 0, &pool).unwrap(), -2);
        assert_eq!(stack_delta(&[INVOKESTATIC, m1, m2], 0, &pool).unwrap(), -1);
        assert_eq!(stack_delta(&[INVOKEVIRTUAL, m1, m2], 0, &pool).unwrap(), -2);
        assert_eq!(stack_delta(&[MULTIANEWARRAY, 0, 1, 3], 0, &pool).unwrap(), -2);
        assert_eq!(stack_delta(&[WIDE, DSTORE, 1, 0], 0, &pool).unwrap(), -2);
        assert!(matches!(
            stack_delta(&[GETFIELD, m1, m2], 0, &pool),
            Err(Error::VerificationError {
                kind: VerifierErrorKind::BadDescriptor(_),
                ..
            })
        ));
    }
}
