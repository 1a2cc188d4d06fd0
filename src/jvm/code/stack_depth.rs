use crate::jvm::class_file::{ConstantPool, ExceptionHandler};
use crate::jvm::code::opcodes::*;
use crate::jvm::{Error, VerifierErrorKind};
use std::collections::HashMap;

/// Compute the maximum operand stack depth of a method body
///
/// This is a dataflow pass over the bytecode: every offset which is a possible start of control
/// flow (the entry point, exception handlers, branch targets) gets a required stack depth. Each
/// required offset is walked forward, propagating depths to successors, until nothing is left to
/// visit. Since two paths reaching the same offset must agree on the depth, each offset is walked
/// at most once and the analysis always terminates.
///
/// Falling off of the end of the code array is not rejected.
pub fn compute_max_stack(
    code: &[u8],
    exception_table: &[ExceptionHandler],
    constants: &ConstantPool,
) -> Result<u16, Error> {
    if code.is_empty() {
        return Err(Error::VerificationError {
            offset: 0,
            kind: VerifierErrorKind::EmptyCode,
        });
    }

    let mut analyzer = StackDepthAnalyzer {
        code,
        constants,
        depths: vec![0; code.len()],
        owners: vec![None; code.len()],
        subroutines: HashMap::new(),
    };

    analyzer.require(0, 0, 1, None)?;
    for handler in exception_table {
        // The thrown exception is on the stack
        let handler_pc = handler.handler_pc.0 as usize;
        analyzer.require(handler_pc, handler_pc as i64, 2, None)?;
    }

    let mut sweeps = 0;
    loop {
        let mut repeat = false;
        for offset in 0..code.len() {
            if analyzer.depths[offset] < 0 {
                repeat = true;
                analyzer.walk(offset)?;
            }
        }
        sweeps += 1;
        if !repeat {
            break;
        }
    }

    let max = analyzer.depths.iter().copied().max().unwrap_or(1).max(1);
    log::trace!("Computed max stack {} in {} sweeps", max - 1, sweeps);
    u16::try_from(max - 1).map_err(|_| {
        Error::UnsupportedConstruct(format!("max stack of {} does not fit in a u16", max - 1))
    })
}

/// Depths are stored with a bias of one: `0` is unvisited, `-(depth + 1)` is a required depth at
/// an offset not yet walked, and `depth + 1` is the depth at an offset already walked.
struct StackDepthAnalyzer<'a> {
    code: &'a [u8],
    constants: &'a ConstantPool,
    depths: Vec<i32>,

    /// Subroutine (identified by its entry offset) to which each offset belongs
    owners: Vec<Option<usize>>,

    /// Biased stack depth right after the `jsr` for each subroutine entry
    subroutines: HashMap<usize, i32>,
}

impl<'a> StackDepthAnalyzer<'a> {
    fn target(&self, offset: usize, target: i64) -> Result<usize, Error> {
        if target < 0 || target >= self.code.len() as i64 {
            return Err(Error::VerificationError {
                offset,
                kind: VerifierErrorKind::InvalidBranchTarget(target),
            });
        }
        Ok(target as usize)
    }

    /// Require a biased `depth` at `target`, reached from the instruction at `offset`
    fn require(
        &mut self,
        offset: usize,
        target: i64,
        depth: i32,
        owner: Option<usize>,
    ) -> Result<(), Error> {
        let target = self.target(offset, target)?;
        let recorded = self.depths[target];
        if recorded == 0 {
            self.depths[target] = -depth;
            if self.owners[target].is_none() {
                self.owners[target] = owner;
            }
        } else if recorded.abs() != depth {
            return Err(Error::VerificationError {
                offset,
                kind: VerifierErrorKind::ConflictingDepths {
                    expected: (recorded.abs() - 1) as usize,
                    found: (depth - 1) as usize,
                },
            });
        }
        Ok(())
    }

    /// Walk forward from an offset with a required depth until control flow stops
    fn walk(&mut self, start: usize) -> Result<(), Error> {
        let owner = if self.subroutines.contains_key(&start) {
            Some(start)
        } else {
            self.owners[start]
        };
        let mut depth = -self.depths[start];
        self.depths[start] = depth;

        let mut offset = start;
        while offset < self.code.len() {
            let fail = move |kind: VerifierErrorKind| Error::VerificationError { offset, kind };

            if offset != start {
                let recorded = self.depths[offset];
                if recorded != 0 && recorded.abs() != depth {
                    return Err(fail(VerifierErrorKind::ConflictingDepths {
                        expected: (recorded.abs() - 1) as usize,
                        found: (depth - 1) as usize,
                    }));
                } else if recorded > 0 {
                    return Ok(());
                }
                self.depths[offset] = depth;
            }
            if self.owners[offset].is_none() {
                self.owners[offset] = owner;
            }

            let opcode = self.code[offset];
            let length = instruction_length(self.code, offset).map_err(fail)?;
            depth += stack_delta(self.code, offset, self.constants)? as i32;
            if depth < 1 {
                return Err(fail(VerifierErrorKind::StackUnderflow));
            }

            match opcode {
                JSR | JSR_W => {
                    for target in branch_targets(self.code, offset).map_err(fail)? {
                        self.call_subroutine(offset, target, depth)?;
                    }

                    // Execution resumes after the `jsr` once the return address is consumed
                    depth -= 1;
                }
                RET => return self.check_return(offset, owner, depth),
                _ => {
                    for target in branch_targets(self.code, offset).map_err(fail)? {
                        self.require(offset, target, depth, owner)?;
                    }
                    if is_terminal(opcode) {
                        return Ok(());
                    }
                }
            }
            offset += length;
        }
        Ok(())
    }

    fn call_subroutine(&mut self, offset: usize, target: i64, depth: i32) -> Result<(), Error> {
        let entry = self.target(offset, target)?;
        match self.subroutines.get(&entry) {
            Some(&expected) if expected != depth => {
                return Err(Error::VerificationError {
                    offset,
                    kind: VerifierErrorKind::SubroutineDepth {
                        expected: (expected - 1) as usize,
                        found: (depth - 1) as usize,
                    },
                })
            }
            Some(_) => (),
            None => {
                log::trace!("Subroutine at {} called with depth {}", entry, depth - 1);
                self.subroutines.insert(entry, depth);
            }
        }
        self.require(offset, target, depth, Some(entry))
    }

    /// `ret` must leave the stack as it was before the `jsr` pushed the return address
    fn check_return(&self, offset: usize, owner: Option<usize>, depth: i32) -> Result<(), Error> {
        let call_depth = match owner.and_then(|entry| self.subroutines.get(&entry)) {
            Some(&call_depth) => call_depth,
            None => return Ok(()),
        };
        if depth != call_depth - 1 {
            return Err(Error::VerificationError {
                offset,
                kind: VerifierErrorKind::SubroutineDepth {
                    expected: (call_depth - 2) as usize,
                    found: (depth - 1) as usize,
                },
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{BytecodeIndex, ClassConstantIndex, ConstantIndex};

    fn max_stack(code: &[u8]) -> Result<u16, Error> {
        compute_max_stack(code, &[], &ConstantPool::new())
    }

    fn kind(result: Result<u16, Error>) -> VerifierErrorKind {
        match result {
            Err(Error::VerificationError { kind, .. }) => kind,
            other => panic!("expected verification error, got {:?}", other),
        }
    }

    #[test]
    fn straight_line() {
        assert_eq!(max_stack(&[ICONST_1, ICONST_2, IADD, IRETURN]).unwrap(), 2);
        assert_eq!(max_stack(&[RETURN]).unwrap(), 0);
        assert_eq!(max_stack(&[LCONST_1, DCONST_0, POP2, POP2, RETURN]).unwrap(), 4);
    }

    #[test]
    fn object_construction() {
        let mut pool = ConstantPool::new();
        let class = pool.add_class("foo/C").unwrap();
        let init = pool.add_method_ref("foo/C", "<init>", "()V").unwrap();
        let mut code = vec![NEW];
        code.extend_from_slice(&class.0 .0.to_be_bytes());
        code.push(DUP);
        code.push(INVOKESPECIAL);
        code.extend_from_slice(&init.0.to_be_bytes());
        code.push(ASTORE_0);
        assert_eq!(compute_max_stack(&code, &[], &pool).unwrap(), 2);
    }

    #[test]
    fn branches_merge() {
        // iload_0; ifeq +7; iconst_1; goto +4; iconst_2; ireturn
        let code = [ILOAD_0, IFEQ, 0, 7, ICONST_1, GOTO, 0, 4, ICONST_2, IRETURN];
        assert_eq!(max_stack(&code).unwrap(), 1);
    }

    #[test]
    fn conflicting_depths() {
        // iload_0; ifeq +4; iconst_1; iconst_2; ireturn
        let code = [ILOAD_0, IFEQ, 0, 4, ICONST_1, ICONST_2, IRETURN];
        assert_eq!(
            kind(max_stack(&code)),
            VerifierErrorKind::ConflictingDepths {
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn bad_code() {
        assert_eq!(kind(max_stack(&[POP, RETURN])), VerifierErrorKind::StackUnderflow);
        assert_eq!(
            kind(max_stack(&[GOTO, 0, 10])),
            VerifierErrorKind::InvalidBranchTarget(10)
        );
        assert_eq!(
            kind(max_stack(&[BIPUSH])),
            VerifierErrorKind::TruncatedInstruction
        );
        assert_eq!(kind(max_stack(&[0xCB])), VerifierErrorKind::UnknownOpcode(0xCB));
        assert_eq!(kind(max_stack(&[])), VerifierErrorKind::EmptyCode);
    }

    #[test]
    fn exception_handlers() {
        // handler at 2 for [0, 2) starts with the exception on the stack
        let code = [ICONST_1, IRETURN, POP, ICONST_0, ICONST_0, POP, IRETURN];
        let handler = ExceptionHandler {
            start_pc: BytecodeIndex(0),
            end_pc: BytecodeIndex(2),
            handler_pc: BytecodeIndex(2),
            catch_type: ClassConstantIndex(ConstantIndex(0)),
        };
        let max = compute_max_stack(&code, &[handler], &ConstantPool::new()).unwrap();
        assert_eq!(max, 2);
    }

    #[test]
    fn subroutines() {
        // 0: jsr +7; 3: jsr +4; 6: return; 7: astore_1; 8: ret 1
        let code = [JSR, 0, 7, JSR, 0, 4, RETURN, ASTORE_1, RET, 1];
        assert_eq!(max_stack(&code).unwrap(), 1);

        // second call happens with an extra value on the stack
        // 0: jsr +8; 3: iconst_0; 4: jsr +4; 7: return; 8: astore_1; 9: ret 1
        let code = [JSR, 0, 8, ICONST_0, JSR, 0, 4, RETURN, ASTORE_1, RET, 1];
        assert_eq!(
            kind(max_stack(&code)),
            VerifierErrorKind::SubroutineDepth {
                expected: 1,
                found: 2
            }
        );

        // subroutine returns with its return address still on the stack
        // 0: jsr +4; 3: return; 4: astore_1; 5: aload_1; 6: ret 1
        let code = [JSR, 0, 4, RETURN, ASTORE_1, ALOAD_1, RET, 1];
        assert_eq!(
            kind(max_stack(&code)),
            VerifierErrorKind::SubroutineDepth {
                expected: 0,
                found: 1
            }
        );
    }
}
