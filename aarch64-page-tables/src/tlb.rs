// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Low-level TLB management operations.
//!
//! Every sequence that retires a translation follows the same discipline:
//! the descriptor store happens first, a `DSB ISHST` makes it visible to the
//! other walkers, the invalidation is broadcast, a `DSB ISH` waits for it to
//! complete everywhere, and an `ISB` resynchronizes this CPU's pipeline.
//! The helpers here bracket the TLBI instructions accordingly; raw
//! instruction wrappers are at the bottom.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
use core::arch::asm;

use aarch64_pages::{AddrRange, GuestPhysAddr, SupervisorVirtAddr};

use crate::cpu::CpuOps;

/// Invalidates all EL2 stage-1 translations.
pub fn invalidate_all_stage1<C: CpuOps>(cpu: &C) {
    cpu.dsb_ishst();
    cpu.tlbi_alle2is();
    cpu.dsb_ish();
    cpu.isb();
}

/// Invalidates EL2 stage-1 translations for the VA range
/// `[va, va + size)` tagged with `asid`, one granule at a time. The range is
/// expanded outward to granule boundaries.
pub fn invalidate_va_range<C: CpuOps>(
    cpu: &C,
    va: SupervisorVirtAddr,
    size: u64,
    asid: u16,
    granule_size: u64,
) {
    let start = va.align_down(granule_size);
    // Round the end up to the granule; ranges that would pass the top of the
    // address space are clamped there instead.
    let end = va
        .checked_increment(size)
        .and_then(|e| e.checked_increment(granule_size - 1))
        .map(|e| e.align_down(granule_size))
        .unwrap_or(SupervisorVirtAddr::supervisor_virt(u64::MAX));

    cpu.dsb_ishst();
    for it in AddrRange::new(start, end, granule_size) {
        cpu.tlbi_vae2is(it, asid);
    }
    cpu.dsb_ish();
    cpu.isb();
}

/// Invalidates all stage-2 (and associated stage-1) translations reachable
/// from EL2 for the current VMID.
pub fn invalidate_all_stage2<C: CpuOps>(cpu: &C) {
    cpu.dsb_ishst();
    cpu.tlbi_vmalls12e1is();
    cpu.dsb_ish();
    cpu.isb();
}

/// Invalidates stage-2 translations for the IPA range `[ipa, ipa + size)`,
/// one granule at a time. The range is expanded outward to granule
/// boundaries.
pub fn invalidate_ipa_range<C: CpuOps>(
    cpu: &C,
    ipa: GuestPhysAddr,
    size: u64,
    granule_size: u64,
) {
    let start = ipa.align_down(granule_size);
    let end = ipa
        .checked_increment(size)
        .and_then(|e| e.checked_increment(granule_size - 1))
        .map(|e| e.align_down(granule_size))
        .unwrap_or(GuestPhysAddr::guest_phys(u64::MAX));

    cpu.dsb_ishst();
    for it in AddrRange::new(start, end, granule_size) {
        cpu.tlbi_ipas2e1is(it);
    }
    cpu.dsb_ish();
    cpu.isb();
}

/* Raw instruction wrappers. */

// Safety: TLBI instructions are well-defined and their only side effect is
// to invalidate address-translation caches.

/// Executes a `TLBI ALLE2IS`: all EL2 stage-1 entries, inner-shareable.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn tlbi_alle2is() {
    unsafe { asm!("tlbi alle2is") };
}

/// Executes a `TLBI VAE2IS` for `va` tagged with `asid`. The operand packs
/// VA[55:12] into bits [43:0] and the ASID into bits [63:48].
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn tlbi_vae2is(va: SupervisorVirtAddr, asid: u16) {
    let op = ((va.bits() >> 12) & 0xfff_ffff_ffff) | ((asid as u64) << 48);
    unsafe { asm!("tlbi vae2is, {rt}", rt = in(reg) op) };
}

/// Executes a `TLBI VMALLS12E1IS`: all stage-1 and stage-2 entries for the
/// current VMID, inner-shareable.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn tlbi_vmalls12e1is() {
    unsafe { asm!("tlbi vmalls12e1is") };
}

/// Executes a `TLBI IPAS2E1IS` for `ipa` under the current VMID. The operand
/// packs IPA[51:12] into bits [39:0].
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub fn tlbi_ipas2e1is(ipa: GuestPhysAddr) {
    let op = (ipa.bits() >> 12) & 0xff_ffff_ffff;
    unsafe { asm!("tlbi ipas2e1is, {rt}", rt = in(reg) op) };
}

// Make TLBI instructions a no-op for testing.
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn tlbi_alle2is() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn tlbi_vae2is(_va: SupervisorVirtAddr, _asid: u16) {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn tlbi_vmalls12e1is() {}
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
pub fn tlbi_ipas2e1is(_ipa: GuestPhysAddr) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::{CpuEvent, RecordingCpu};

    #[test]
    fn va_range_rounds_to_granules() {
        let cpu = RecordingCpu::new(true);
        invalidate_va_range(
            &cpu,
            SupervisorVirtAddr::supervisor_virt(0x1234),
            0x2000,
            7,
            0x1000,
        );
        assert_eq!(
            cpu.events(),
            vec![
                CpuEvent::DsbIshst,
                CpuEvent::TlbiVaE2Is { va: 0x1000, asid: 7 },
                CpuEvent::TlbiVaE2Is { va: 0x2000, asid: 7 },
                CpuEvent::TlbiVaE2Is { va: 0x3000, asid: 7 },
                CpuEvent::DsbIsh,
                CpuEvent::Isb,
            ]
        );
    }

    #[test]
    fn ipa_range_single_granule() {
        let cpu = RecordingCpu::new(true);
        invalidate_ipa_range(&cpu, GuestPhysAddr::guest_phys(0x4000_0000), 1, 0x4000);
        assert_eq!(
            cpu.events(),
            vec![
                CpuEvent::DsbIshst,
                CpuEvent::TlbiIpaS2E1Is { ipa: 0x4000_0000 },
                CpuEvent::DsbIsh,
                CpuEvent::Isb,
            ]
        );
    }

    #[test]
    fn full_invalidations_are_bracketed() {
        let cpu = RecordingCpu::new(true);
        invalidate_all_stage1(&cpu);
        invalidate_all_stage2(&cpu);
        assert_eq!(
            cpu.events(),
            vec![
                CpuEvent::DsbIshst,
                CpuEvent::TlbiAllE2Is,
                CpuEvent::DsbIsh,
                CpuEvent::Isb,
                CpuEvent::DsbIshst,
                CpuEvent::TlbiVmAllS12E1Is,
                CpuEvent::DsbIsh,
                CpuEvent::Isb,
            ]
        );
    }
}
