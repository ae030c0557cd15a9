//! Linear memory for one kernel instance.

use std::sync::Arc;

use log::trace;

use crate::kernel::Kernel;
use crate::task::{Param, Step, Task};
use crate::{Error, Result};

/// Growth granularity of an arena.
pub const PAGE_SIZE: usize = 1 << 16;

const ALIGN: usize = 8;

/// A contiguous region with bump allocation.
///
/// Allocations are never freed individually. [`Arena::reset`] rewinds to
/// the base mark and [`Arena::restore`] to any earlier [`Arena::mark`].
/// Growth extends the region in place, so offsets stay valid.
pub struct Arena {
    memory: Vec<u8>,
    next: usize,
    base: usize,
    max_len: usize,
}

impl Arena {
    pub fn new(pages: usize, max_pages: usize) -> Arena {
        let max_len = max_pages.max(1) * PAGE_SIZE;
        Arena {
            memory: vec![0; (pages.max(1) * PAGE_SIZE).min(max_len)],
            next: 0,
            base: 0,
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn alloc(&mut self, len: usize) -> Result<u32> {
        let offset = self.next;
        let end = offset
            .checked_add((len + ALIGN - 1) & !(ALIGN - 1))
            .ok_or(Error::OutOfMemory)?;
        if end > u32::MAX as usize {
            return Err(Error::OutOfMemory);
        }
        if end > self.memory.len() {
            self.grow(end)?;
        }
        self.next = end;
        Ok(offset as u32)
    }

    fn grow(&mut self, required: usize) -> Result<()> {
        if required > self.max_len {
            return Err(Error::OutOfMemory);
        }
        let paged = (required + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;
        let new_len = paged.max(self.memory.len() * 2).min(self.max_len);
        trace!("arena grows from {} to {} bytes", self.memory.len(), new_len);
        self.memory.resize(new_len, 0);
        Ok(())
    }

    pub fn mark(&self) -> usize {
        self.next
    }

    pub fn restore(&mut self, mark: usize) {
        self.next = mark.max(self.base);
    }

    /// Makes everything allocated so far permanent.
    pub fn set_base(&mut self) {
        self.base = self.next;
    }

    pub fn reset(&mut self) {
        self.next = self.base;
    }

    fn range(&self, offset: u32, len: usize) -> Result<std::ops::Range<usize>> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.memory.len() => Ok(start..end),
            _ => Err(Error::InvalidLength {
                expected: self.memory.len().saturating_sub(start),
                actual: len,
            }),
        }
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read(&self, offset: u32, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.memory[range])
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

/// A kernel bound to its own arena.
pub struct Instance {
    kernel: Arc<dyn Kernel>,
    arena: Arena,
}

impl Instance {
    pub fn new(kernel: Arc<dyn Kernel>, pages: usize, max_pages: usize) -> Instance {
        Instance {
            kernel,
            arena: Arena::new(pages, max_pages),
        }
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn alloc(&mut self, len: usize) -> Result<u32> {
        self.arena.alloc(len)
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.arena.write(offset, bytes)
    }

    pub fn read(&self, offset: u32, len: usize) -> Result<Vec<u8>> {
        Ok(self.arena.read(offset, len)?.to_vec())
    }

    /// Allocates a buffer holding `bytes`.
    pub fn alloc_set(&mut self, bytes: &[u8]) -> Result<u32> {
        let offset = self.alloc(bytes.len())?;
        self.write(offset, bytes)?;
        Ok(offset)
    }

    pub fn invoke(&mut self, func: &str, args: &[u32]) -> Result<u32> {
        Ok(self.kernel.invoke(self.arena.memory_mut(), func, args)?)
    }

    /// Runs every step of `task` in order and returns the buffers its `Get`
    /// steps name. The arena is rewound afterwards whether or not the task
    /// succeeded.
    pub fn execute(&mut self, task: &Task) -> Result<Vec<Vec<u8>>> {
        let mark = self.arena.mark();
        let result = self.run(task);
        self.arena.restore(mark);
        result
    }

    fn run(&mut self, task: &Task) -> Result<Vec<Vec<u8>>> {
        let mut vars: Vec<Option<u32>> = vec![None; task.num_vars()];
        let mut outputs = Vec::with_capacity(task.num_outputs());

        fn lookup(vars: &[Option<u32>], var: usize) -> Result<u32> {
            vars.get(var)
                .copied()
                .flatten()
                .ok_or_else(|| Error::Task(format!("buffer {} is not allocated", var)))
        }

        fn slot(vars: &mut [Option<u32>], var: usize) -> Result<&mut Option<u32>> {
            vars.get_mut(var)
                .ok_or_else(|| Error::Task(format!("buffer {} is out of range", var)))
        }

        for step in task.steps() {
            match *step {
                Step::Alloc { var, len } => {
                    let offset = self.alloc(len)?;
                    *slot(&mut vars, var)? = Some(offset);
                }
                Step::Set { var, ref data } => {
                    let offset = lookup(&vars, var)?;
                    self.write(offset, data)?;
                }
                Step::AllocSet { var, ref data } => {
                    let offset = self.alloc_set(data)?;
                    *slot(&mut vars, var)? = Some(offset);
                }
                Step::Call {
                    ref func,
                    ref params,
                } => {
                    let args = params
                        .iter()
                        .map(|p| match *p {
                            Param::Var(var) => lookup(&vars, var),
                            Param::Val(v) => Ok(v),
                        })
                        .collect::<Result<Vec<u32>>>()?;
                    self.invoke(func, &args)?;
                }
                Step::Get { var, len } => {
                    let offset = lookup(&vars, var)?;
                    outputs.push(self.read(offset, len)?);
                }
            }
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::CurveId;
    use crate::kernel::Trap;

    #[test]
    fn allocation_is_aligned_and_grows() {
        let mut arena = Arena::new(1, 4);
        assert_eq!(arena.alloc(3).unwrap(), 0);
        assert_eq!(arena.alloc(8).unwrap(), 8);

        let big = arena.alloc(PAGE_SIZE).unwrap();
        assert_eq!(big, 16);
        assert_eq!(arena.len(), 2 * PAGE_SIZE);

        arena.write(big, &[7; 4]).unwrap();
        assert_eq!(arena.read(big, 4).unwrap(), &[7; 4]);
    }

    #[test]
    fn allocation_respects_cap() {
        let mut arena = Arena::new(1, 2);
        assert!(matches!(
            arena.alloc(2 * PAGE_SIZE + 1),
            Err(Error::OutOfMemory)
        ));
    }

    #[test]
    fn reset_rewinds_to_base() {
        let mut arena = Arena::new(1, 1);
        arena.alloc(16).unwrap();
        arena.set_base();
        let mark = arena.mark();
        arena.alloc(32).unwrap();
        arena.reset();
        assert_eq!(arena.mark(), mark);
        assert_eq!(arena.alloc(8).unwrap(), 16);
    }

    #[test]
    fn execute_runs_steps_in_order() {
        let mut instance = Instance::new(CurveId::Bn128.kernel(), 1, 16);

        let mut task = Task::new();
        let mut two = vec![0u8; 32];
        two[0] = 2;
        let plain = task.alloc_set(two);
        let a = task.alloc(32);
        let r = task.alloc(32);
        task.call("frm_toMontgomery", &[plain, a])
            .call("frm_square", &[a, r])
            .call("frm_fromMontgomery", &[r, plain])
            .get(plain, 32);

        let before = instance.arena().mark();
        let out = instance.execute(&task).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0][0], 4);
        assert!(out[0][1..].iter().all(|b| *b == 0));
        assert_eq!(instance.arena().mark(), before);
    }

    #[test]
    fn execute_reports_traps() {
        let mut instance = Instance::new(CurveId::Bn128.kernel(), 1, 16);
        let mut task = Task::new();
        let a = task.alloc(32);
        task.call("frm_inverse", &[a, a]);
        assert!(matches!(
            instance.execute(&task),
            Err(Error::Kernel(Trap::NotInvertible))
        ));

        let mut task = Task::new();
        task.get(Param::Var(3), 32);
        assert!(matches!(instance.execute(&task), Err(Error::Task(_))));
    }
}
