//! Instruction-stream serialization point.
//!
//! Out-of-order cores can retire instructions adjacent to a counter enable or
//! disable inside the measured window. Placing a serializing instruction right
//! after enabling and right before disabling keeps the window tight:
//! - x86_64: `cpuid` (architecturally serializing)
//! - aarch64: `isb`
//! - Other targets: compiler fence only

use std::sync::atomic::{compiler_fence, Ordering};

/// Wait until all preceding instructions have completed before continuing.
///
/// Also acts as a compiler barrier so the optimizer cannot move memory
/// accesses across it.
#[inline(always)]
pub fn serialize() {
    compiler_fence(Ordering::SeqCst);

    #[cfg(target_arch = "x86_64")]
    {
        // cpuid leaf 0 is available on every x86_64 CPU
        #[allow(unused_unsafe)]
        let leaf = unsafe { std::arch::x86_64::__cpuid(0) };
        std::hint::black_box(leaf);
    }

    #[cfg(target_arch = "aarch64")]
    unsafe {
        std::arch::asm!("isb", options(nostack, preserves_flags));
    }

    compiler_fence(Ordering::SeqCst);
}
