//! Task stacks and the stack allocation policy
//!
//! A task exclusively owns its [`Stack`] from creation until it is reaped
//! after exit. Stacks come either from the caller (`task_create`) or from a
//! [`StackAlloc`] installed with `Kernel::set_stack_pool` (`task_spawn`).

use crate::types::OsStkElement;

/// Exclusively owned task stack memory
pub struct Stack(&'static mut [OsStkElement]);

impl Stack {
    pub fn new(mem: &'static mut [OsStkElement]) -> Self {
        Stack(mem)
    }

    /// Size in words
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut OsStkElement {
        self.0.as_mut_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[OsStkElement] {
        &self.0[..]
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Stack({} words @ {:p})", self.0.len(), self.0.as_ptr())
    }
}

/// Stack allocation policy
pub trait StackAlloc {
    /// Hand out a stack of at least `words` words
    fn alloc(&mut self, words: usize) -> Option<Stack>;

    /// Take back a stack of a reaped task
    fn free(&mut self, stack: Stack);

    /// Number of stacks currently available
    fn available(&self) -> usize;
}

/// Fixed pool of equally sized stacks
pub struct StackPool<const N: usize> {
    free: [Option<Stack>; N],
}

impl<const N: usize> StackPool<N> {
    /// Split static memory into `N` stacks of `W` words.
    ///
    /// On Cortex-M the memory usually comes from
    /// `cortex_m::singleton!(: [[OsStkElement; W]; N] = [[0; W]; N])`.
    pub fn new<const W: usize>(mem: &'static mut [[OsStkElement; W]; N]) -> Self {
        let mut chunks = IntoIterator::into_iter(mem);
        StackPool {
            free: core::array::from_fn(|_| chunks.next().map(|c| Stack(&mut c[..]))),
        }
    }
}

impl<const N: usize> StackAlloc for StackPool<N> {
    fn alloc(&mut self, words: usize) -> Option<Stack> {
        self.free
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|s| s.len() >= words))
            .and_then(Option::take)
    }

    fn free(&mut self, stack: Stack) {
        if let Some(slot) = self.free.iter_mut().find(|s| s.is_none()) {
            *slot = Some(stack);
        }
    }

    fn available(&self) -> usize {
        self.free.iter().filter(|s| s.is_some()).count()
    }
}
