use core::mem::size_of;

use crate::addressing::Va;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmConfig {
    /// The stack grows downwards from this (exclusive) address
    pub user_stack_top: Va,

    /// Maximum size of the stack in bytes
    pub stack_limit: usize,

    /// How far below the recorded stack pointer a fault may be and still
    /// count as stack access (`push` faults before the pointer moves)
    pub stack_margin: usize,

    /// Everything at or above this address belongs to the kernel
    pub kernel_base: Va,
}

impl VmConfig {
    /// Lowest address the stack may grow to
    pub fn stack_bottom(&self) -> Va {
        Va::new(
            self.user_stack_top
                .into_usize()
                .saturating_sub(self.stack_limit),
        )
    }

    #[inline]
    pub fn is_user_address(&self, va: Va) -> bool {
        va < self.kernel_base
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            user_stack_top: Va::new(0x4748_0000),
            stack_limit: 1 << 20,
            stack_margin: size_of::<usize>(),
            kernel_base: Va::new(0x80_0400_0000),
        }
    }
}
