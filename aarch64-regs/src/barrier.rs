// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! AArch64 barrier instructions.
//!
//! Conventions follow the architecture: ISH* orders against other CPUs in
//! the inner-shareable domain (normal cacheable memory), OSH* orders against
//! devices and DMA, and DSB implies stronger completion than DMB. ISB flushes
//! the pipeline so that later instructions observe completed context changes.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
use core::arch::asm;

// Safety: barrier instructions do not access memory; their only side effect
// is to order or complete surrounding accesses.

/// Data synchronization barrier, full system.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dsb_sy() {
    unsafe { asm!("dsb sy") };
}

/// Data synchronization barrier, inner-shareable.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dsb_ish() {
    unsafe { asm!("dsb ish") };
}

/// Data synchronization barrier, inner-shareable, stores only.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dsb_ishst() {
    unsafe { asm!("dsb ishst") };
}

/// Data memory barrier, inner-shareable.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dmb_ish() {
    unsafe { asm!("dmb ish") };
}

/// Data memory barrier, inner-shareable, stores only.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dmb_ishst() {
    unsafe { asm!("dmb ishst") };
}

/// Data memory barrier, outer-shareable. Orders against DMA observers.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn dmb_osh() {
    unsafe { asm!("dmb osh") };
}

/// Instruction synchronization barrier.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn isb() {
    unsafe { asm!("isb") };
}

// Make barrier instructions a no-op for testing.
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dsb_sy() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dsb_ish() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dsb_ishst() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dmb_ish() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dmb_ishst() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn dmb_osh() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn isb() {}
