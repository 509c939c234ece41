// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The CPU contract consumed by the translation-table engine.

use aarch64_pages::{GuestPhysAddr, SupervisorVirtAddr};

use crate::tlb;

/// CPU-level primitives the engine depends on: whether the MMU is on, the
/// barriers that order descriptor stores against hardware walks, and the
/// broadcast (inner-shareable) TLB invalidation instructions.
///
/// The MMU state is a context value captured when the implementor is
/// constructed rather than a process-wide global; a caller that enables the
/// MMU builds a new handle for subsequent tables.
pub trait CpuOps {
    /// Returns `true` if the MMU is translating for this regime. With the
    /// MMU off, descriptor updates are plain stores with no maintenance.
    fn mmu_enabled(&self) -> bool;

    /// Data synchronization barrier, inner-shareable, stores.
    fn dsb_ishst(&self);

    /// Data synchronization barrier, inner-shareable.
    fn dsb_ish(&self);

    /// Data memory barrier, inner-shareable, stores.
    fn dmb_ishst(&self);

    /// Instruction synchronization barrier.
    fn isb(&self);

    /// Invalidates all EL2 stage-1 translations, inner-shareable.
    fn tlbi_alle2is(&self);

    /// Invalidates EL2 stage-1 translations for `va` tagged with `asid`,
    /// inner-shareable.
    fn tlbi_vae2is(&self, va: SupervisorVirtAddr, asid: u16);

    /// Invalidates all stage-1 and stage-2 translations for the current
    /// VMID, inner-shareable.
    fn tlbi_vmalls12e1is(&self);

    /// Invalidates stage-2 translations for `ipa` under the current VMID,
    /// inner-shareable.
    fn tlbi_ipas2e1is(&self, ipa: GuestPhysAddr);
}

/// `CpuOps` backed by the real barrier and TLBI instructions.
#[derive(Clone, Copy, Debug, Default)]
pub struct HwCpu {
    mmu_on: bool,
}

impl HwCpu {
    /// Creates a handle for a CPU whose MMU state is `mmu_on`.
    pub const fn new(mmu_on: bool) -> Self {
        Self { mmu_on }
    }
}

impl CpuOps for HwCpu {
    fn mmu_enabled(&self) -> bool {
        self.mmu_on
    }

    fn dsb_ishst(&self) {
        aarch64_regs::dsb_ishst();
    }

    fn dsb_ish(&self) {
        aarch64_regs::dsb_ish();
    }

    fn dmb_ishst(&self) {
        aarch64_regs::dmb_ishst();
    }

    fn isb(&self) {
        aarch64_regs::isb();
    }

    fn tlbi_alle2is(&self) {
        tlb::tlbi_alle2is();
    }

    fn tlbi_vae2is(&self, va: SupervisorVirtAddr, asid: u16) {
        tlb::tlbi_vae2is(va, asid);
    }

    fn tlbi_vmalls12e1is(&self) {
        tlb::tlbi_vmalls12e1is();
    }

    fn tlbi_ipas2e1is(&self, ipa: GuestPhysAddr) {
        tlb::tlbi_ipas2e1is(ipa);
    }
}
