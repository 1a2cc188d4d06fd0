use super::VerificationType;
use crate::jvm::class_file::{AttributeLike, ConstantPool, Deserialize, Serialize};
use crate::jvm::descriptors::ClassRenames;
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackMapTable(pub Vec<StackMapFrame>);

impl AttributeLike for StackMapTable {
    const NAME: &'static str = "StackMapTable";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let frames = self
            .0
            .iter()
            .map(|frame| frame.copy(src, dest, renames))
            .collect::<Result<_, _>>()?;
        Ok(StackMapTable(frames))
    }
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMapTable {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMapTable(Vec::deserialize(reader)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationType,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl StackMapFrame {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    fn offset_delta_mut(&mut self) -> &mut u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => offset_delta,
        }
    }

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<StackMapFrame, Error> {
        let copy_all = |types: &[VerificationType], dest: &mut ConstantPool| {
            types
                .iter()
                .map(|typ| typ.copy(src, dest, renames))
                .collect::<Result<Vec<_>, _>>()
        };
        let frame = match self {
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => StackMapFrame::SameLocalsOneStack {
                offset_delta: *offset_delta,
                stack: stack.copy(src, dest, renames)?,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => StackMapFrame::AppendLocalsNoStack {
                offset_delta: *offset_delta,
                locals: copy_all(locals, dest)?,
            },
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => StackMapFrame::Full {
                offset_delta: *offset_delta,
                locals: copy_all(locals, dest)?,
                stack: copy_all(stack, dest)?,
            },
            other => other.clone(),
        };
        Ok(frame)
    }
}

impl Serialize for StackMapFrame {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                if !(1..=3).contains(chopped_k) {
                    let msg = format!("chop frame removes {} locals (must be 1 to 3)", chopped_k);
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
                }
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                let added_k = locals.len();
                if !(1..=3).contains(&added_k) {
                    let msg = format!("append frame adds {} locals (must be 1 to 3)", added_k);
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg));
                }
                (251 + added_k as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        let frame_type = u8::deserialize(reader)?;
        let frame = match frame_type {
            0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: frame_type as u16,
            },
            64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: frame_type as u16 - 64,
                stack: VerificationType::deserialize(reader)?,
            },
            128..=246 => {
                return Err(Error::MalformedInput(format!(
                    "reserved stack map frame type {}",
                    frame_type
                )))
            }
            247 => StackMapFrame::SameLocalsOneStack {
                offset_delta: u16::deserialize(reader)?,
                stack: VerificationType::deserialize(reader)?,
            },
            248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
                chopped_k: 251 - frame_type,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: u16::deserialize(reader)?,
            },
            252..=254 => {
                let offset_delta = u16::deserialize(reader)?;
                let mut locals = vec![];
                for _ in 0..(frame_type - 251) {
                    locals.push(VerificationType::deserialize(reader)?);
                }
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => StackMapFrame::Full {
                offset_delta: u16::deserialize(reader)?,
                locals: Vec::deserialize(reader)?,
                stack: Vec::deserialize(reader)?,
            },
        };
        Ok(frame)
    }
}

/// Splice a new local into a full list of locals
///
/// `long` and `double` are followed by a `top` entry. Lists shorter than `index` are unchanged.
fn insert_into_locals(locals: &mut Vec<VerificationType>, index: usize, local: VerificationType) {
    if locals.len() < index {
        return;
    }
    match local {
        VerificationType::Long | VerificationType::Double => {
            locals.splice(index..index, [local, VerificationType::Top]);
        }
        _ => locals.insert(index, local),
    }
}

/// Should a bytecode offset move when shifting at `at`?
pub fn is_shifted(offset: usize, at: usize, inclusive: bool) -> bool {
    offset > at || (inclusive && offset == at)
}

pub fn shifted_offset(offset: usize, gap: i32) -> Result<usize, Error> {
    let shifted = offset as i64 + gap as i64;
    if shifted < 0 || shifted > u16::MAX as i64 {
        return Err(Error::UnsupportedConstruct(format!(
            "shifting offset {} by {} leaves the code array",
            offset, gap
        )));
    }
    Ok(shifted as usize)
}

impl StackMapTable {
    /// Absolute bytecode offset of each frame
    ///
    /// The first frame's delta is absolute, subsequent ones are relative to the previous frame's
    /// offset plus one.
    pub fn absolute_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.0.len());
        let mut previous: Option<usize> = None;
        for frame in &self.0 {
            let offset = match previous {
                None => frame.offset_delta() as usize,
                Some(previous) => previous + frame.offset_delta() as usize + 1,
            };
            offsets.push(offset);
            previous = Some(offset);
        }
        offsets
    }

    /// Insert a local variable at `index` in every full frame
    ///
    /// This assumes the type of the new local never changes across the method. Other frame kinds
    /// only describe locals relative to the previous frame and are left alone.
    pub fn insert_local(&mut self, index: usize, local: VerificationType) {
        for frame in &mut self.0 {
            if let StackMapFrame::Full { locals, .. } = frame {
                insert_into_locals(locals, index, local);
            }
        }
    }

    /// Remove every `Uninitialized(offset)` entry (eg. after deleting the `new` at `offset`)
    pub fn remove_new(&mut self, offset: u16) {
        let target = VerificationType::Uninitialized(offset);
        for frame in &mut self.0 {
            let replacement = match frame {
                StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack,
                } if *stack == target => Some(StackMapFrame::SameLocalsNoStack {
                    offset_delta: *offset_delta,
                }),
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                } => {
                    locals.retain(|local| *local != target);
                    if locals.is_empty() {
                        Some(StackMapFrame::SameLocalsNoStack {
                            offset_delta: *offset_delta,
                        })
                    } else {
                        None
                    }
                }
                StackMapFrame::Full { locals, stack, .. } => {
                    locals.retain(|local| *local != target);
                    stack.retain(|item| *item != target);
                    None
                }
                _ => None,
            };
            if let Some(replacement) = replacement {
                *frame = replacement;
            }
        }
    }

    /// Shift the offsets of frames after `at` by `gap` bytes (frames at `at` move only when
    /// `inclusive` is set)
    ///
    /// Deltas get re-encoded compactly or in extended form on serialization, which is what keeps
    /// the attribute length consistent. A negative `gap` models deleted bytes: it is an error for
    /// frames to end up out of order.
    pub fn shift_offsets(&mut self, at: usize, gap: i32, inclusive: bool) -> Result<(), Error> {
        let mut offsets = self.absolute_offsets();
        for offset in &mut offsets {
            if is_shifted(*offset, at, inclusive) {
                *offset = shifted_offset(*offset, gap)?;
            }
        }

        let mut deltas = Vec::with_capacity(offsets.len());
        let mut previous: Option<usize> = None;
        for offset in offsets {
            let delta = match previous {
                None => offset,
                Some(previous) if offset > previous => offset - previous - 1,
                Some(previous) => {
                    return Err(Error::UnsupportedConstruct(format!(
                        "stack map frame shifted to {} is not after the previous frame at {}",
                        offset, previous
                    )))
                }
            };
            deltas.push(delta as u16);
            previous = Some(offset);
        }
        for (frame, delta) in self.0.iter_mut().zip(deltas) {
            *frame.offset_delta_mut() = delta;
        }
        log::trace!("Shifted stack map frames after {} by {}", at, gap);
        Ok(())
    }
}

/// Legacy stack map attribute used by CLDC (every entry is a full frame at an absolute offset)
///
/// [0]: https://docs.oracle.com/javame/config/cldc/opt-pkgs/api/cldc/api/index.html
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackMap(pub Vec<StackMapEntry>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapEntry {
    pub offset: u16,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

impl AttributeLike for StackMap {
    const NAME: &'static str = "StackMap";

    fn copy(
        &self,
        src: &ConstantPool,
        dest: &mut ConstantPool,
        renames: &ClassRenames,
    ) -> Result<Self, Error> {
        let mut entries = Vec::with_capacity(self.0.len());
        for entry in &self.0 {
            let mut copy_all = |types: &[VerificationType]| {
                types
                    .iter()
                    .map(|typ| typ.copy(src, dest, renames))
                    .collect::<Result<Vec<_>, _>>()
            };
            entries.push(StackMapEntry {
                offset: entry.offset,
                locals: copy_all(&entry.locals)?,
                stack: copy_all(&entry.stack)?,
            });
        }
        Ok(StackMap(entries))
    }
}

impl Serialize for StackMap {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMap {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMap(Vec::deserialize(reader)?))
    }
}

impl Serialize for StackMapEntry {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.offset.serialize(writer)?;
        self.locals.serialize(writer)?;
        self.stack.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for StackMapEntry {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
        Ok(StackMapEntry {
            offset: u16::deserialize(reader)?,
            locals: Vec::deserialize(reader)?,
            stack: Vec::deserialize(reader)?,
        })
    }
}

impl StackMap {
    pub fn insert_local(&mut self, index: usize, local: VerificationType) {
        for entry in &mut self.0 {
            insert_into_locals(&mut entry.locals, index, local);
        }
    }

    pub fn remove_new(&mut self, offset: u16) {
        let target = VerificationType::Uninitialized(offset);
        for entry in &mut self.0 {
            entry.locals.retain(|local| *local != target);
            entry.stack.retain(|item| *item != target);
        }
    }

    pub fn shift_offsets(&mut self, at: usize, gap: i32, inclusive: bool) -> Result<(), Error> {
        let mut previous: Option<usize> = None;
        let mut shifted = Vec::with_capacity(self.0.len());
        for entry in &self.0 {
            let mut offset = entry.offset as usize;
            if is_shifted(offset, at, inclusive) {
                offset = shifted_offset(offset, gap)?;
            }
            if let Some(previous) = previous {
                if offset <= previous {
                    return Err(Error::UnsupportedConstruct(format!(
                        "stack map entry shifted to {} is not after the previous entry at {}",
                        offset, previous
                    )));
                }
            }
            shifted.push(offset as u16);
            previous = Some(offset);
        }
        for (entry, offset) in self.0.iter_mut().zip(shifted) {
            entry.offset = offset;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ClassConstantIndex, ConstantIndex};

    fn round_trip(frame: StackMapFrame) -> Vec<u8> {
        let table = StackMapTable(vec![frame]);
        let bytes = table.to_bytes().unwrap();
        assert_eq!(StackMapTable::from_bytes(&bytes).unwrap(), table);
        bytes
    }

    #[test]
    fn boundary_deltas_round_trip() {
        let object = VerificationType::Object(ClassConstantIndex(ConstantIndex(3)));
        for delta in [0u16, 63, 64, 127, 128] {
            let same = round_trip(StackMapFrame::SameLocalsNoStack {
                offset_delta: delta,
            });
            let one_stack = round_trip(StackMapFrame::SameLocalsOneStack {
                offset_delta: delta,
                stack: object,
            });
            if delta <= 63 {
                assert_eq!(same, vec![0, 1, delta as u8]);
                assert_eq!(one_stack, vec![0, 1, 64 + delta as u8, 7, 0, 3]);
            } else {
                assert_eq!(same, vec![0, 1, 251, 0, delta as u8]);
                assert_eq!(one_stack, vec![0, 1, 247, 0, delta as u8, 7, 0, 3]);
            }

            let chop = round_trip(StackMapFrame::ChopLocalsNoStack {
                offset_delta: delta,
                chopped_k: 2,
            });
            assert_eq!(chop, vec![0, 1, 249, 0, delta as u8]);

            let append = round_trip(StackMapFrame::AppendLocalsNoStack {
                offset_delta: delta,
                locals: vec![VerificationType::Long, VerificationType::Uninitialized(9)],
            });
            assert_eq!(append, vec![0, 1, 253, 0, delta as u8, 4, 8, 0, 9]);

            let full = round_trip(StackMapFrame::Full {
                offset_delta: delta,
                locals: vec![VerificationType::Top, VerificationType::UninitializedThis],
                stack: vec![VerificationType::Null],
            });
            assert_eq!(full, vec![0, 1, 255, 0, delta as u8, 0, 2, 0, 6, 0, 1, 5]);
        }
    }

    #[test]
    fn reserved_frame_types_are_rejected() {
        for frame_type in [128u8, 200, 246] {
            assert!(matches!(
                StackMapTable::from_bytes(&[0, 1, frame_type]),
                Err(Error::MalformedInput(_))
            ));
        }
    }

    #[test]
    fn offsets_are_relative_after_first_frame() {
        let table = StackMapTable(vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 5 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 0 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 10 },
        ]);
        assert_eq!(table.absolute_offsets(), vec![5, 6, 17]);
    }

    #[test]
    fn shift_re_encodes_frames() {
        let mut table = StackMapTable(vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 10 },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 60,
                stack: VerificationType::Integer,
            },
        ]);
        let before = table.to_bytes().unwrap();
        assert_eq!(before.len(), 2 + 1 + 2);

        // Insert 10 bytes at offset 20: only the second frame (at 71) moves
        table.shift_offsets(20, 10, false).unwrap();
        assert_eq!(table.absolute_offsets(), vec![10, 81]);
        let after = table.to_bytes().unwrap();
        assert_eq!(after, vec![0, 2, 10, 247, 0, 70, 1]);

        // Delete them again
        table.shift_offsets(20, -10, false).unwrap();
        assert_eq!(table.to_bytes().unwrap(), before);
    }

    #[test]
    fn shift_inclusive_boundary() {
        let frames = vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 4 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 3 },
        ];
        let mut exclusive = StackMapTable(frames.clone());
        exclusive.shift_offsets(4, 2, false).unwrap();
        assert_eq!(exclusive.absolute_offsets(), vec![4, 10]);

        let mut inclusive = StackMapTable(frames);
        inclusive.shift_offsets(4, 2, true).unwrap();
        assert_eq!(inclusive.absolute_offsets(), vec![6, 10]);
    }

    #[test]
    fn shift_out_of_order_fails() {
        let mut table = StackMapTable(vec![
            StackMapFrame::SameLocalsNoStack { offset_delta: 4 },
            StackMapFrame::SameLocalsNoStack { offset_delta: 1 },
        ]);
        assert!(matches!(
            table.shift_offsets(5, -3, false),
            Err(Error::UnsupportedConstruct(_))
        ));
        assert!(matches!(
            table.shift_offsets(0, -10, true),
            Err(Error::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn insert_local_only_touches_full_frames() {
        let mut table = StackMapTable(vec![
            StackMapFrame::Full {
                offset_delta: 0,
                locals: vec![VerificationType::Integer, VerificationType::Float],
                stack: vec![],
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![VerificationType::Integer],
            },
            StackMapFrame::Full {
                offset_delta: 1,
                locals: vec![],
                stack: vec![],
            },
        ]);
        table.insert_local(1, VerificationType::Long);
        assert_eq!(
            table.0[0],
            StackMapFrame::Full {
                offset_delta: 0,
                locals: vec![
                    VerificationType::Integer,
                    VerificationType::Long,
                    VerificationType::Top,
                    VerificationType::Float,
                ],
                stack: vec![],
            }
        );
        assert_eq!(
            table.0[1],
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 3,
                locals: vec![VerificationType::Integer],
            }
        );
        // Fewer locals than the insertion index
        assert_eq!(
            table.0[2],
            StackMapFrame::Full {
                offset_delta: 1,
                locals: vec![],
                stack: vec![],
            }
        );
    }

    #[test]
    fn remove_new_degrades_frames() {
        let uninit = VerificationType::Uninitialized(4);
        let mut table = StackMapTable(vec![
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 70,
                stack: uninit,
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 1,
                stack: VerificationType::Uninitialized(5),
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 2,
                locals: vec![uninit],
            },
            StackMapFrame::Full {
                offset_delta: 3,
                locals: vec![uninit, VerificationType::Integer],
                stack: vec![uninit, uninit],
            },
        ]);
        table.remove_new(4);
        assert_eq!(
            table.0,
            vec![
                StackMapFrame::SameLocalsNoStack { offset_delta: 70 },
                StackMapFrame::SameLocalsOneStack {
                    offset_delta: 1,
                    stack: VerificationType::Uninitialized(5),
                },
                StackMapFrame::SameLocalsNoStack { offset_delta: 2 },
                StackMapFrame::Full {
                    offset_delta: 3,
                    locals: vec![VerificationType::Integer],
                    stack: vec![],
                },
            ]
        );
    }

    #[test]
    fn legacy_stack_map_edits() {
        let mut map = StackMap(vec![
            StackMapEntry {
                offset: 3,
                locals: vec![VerificationType::Integer],
                stack: vec![VerificationType::Uninitialized(0)],
            },
            StackMapEntry {
                offset: 8,
                locals: vec![],
                stack: vec![],
            },
        ]);
        let bytes = map.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0, 2, 0, 3, 0, 1, 1, 0, 1, 8, 0, 0, 0, 8, 0, 0, 0, 0]
        );
        assert_eq!(StackMap::from_bytes(&bytes).unwrap(), map);

        map.insert_local(0, VerificationType::Double);
        map.remove_new(0);
        map.shift_offsets(3, 4, true).unwrap();
        assert_eq!(
            map.0[0],
            StackMapEntry {
                offset: 7,
                locals: vec![
                    VerificationType::Double,
                    VerificationType::Top,
                    VerificationType::Integer
                ],
                stack: vec![],
            }
        );
        assert_eq!(map.0[1].offset, 12);
        assert_eq!(map.0[1].locals, vec![VerificationType::Double, VerificationType::Top]);
    }
}
