// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Enable-time MMU programming: PA-range discovery, MAIR/TCR/VTCR
//! composition, TTBR/VTTBR installation, and the SCTLR_EL2 enable sequence.
//!
//! None of this runs during range operations; the engine consumes only the
//! [`crate::CpuOps`] contract. These routines exist for the boot path that
//! owns the registers. The value builders are pure so they can be checked
//! bit-for-bit off target; only the thin `mrs`/`msr` wrappers need the real
//! CPU.

use aarch64_pages::SupervisorPhysAddr;
use aarch64_regs::{
    id_aa64mmfr0_el1, id_aa64mmfr1_el1, mair_el2, sctlr_el2, tcr_el2, ttbr0_el2, ttbr1_el2,
    vtcr_el2, vttbr_el2, ID_AA64MMFR0_EL1, MAIR_EL2, SCTLR_EL2, TCR_EL2, TTBR0_EL2, TTBR1_EL2,
    VTCR_EL2, VTTBR_EL2,
};
use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::LocalRegisterCopy;

use crate::geometry::TableGeometry;

/// A snapshot of ID_AA64MMFR0_EL1.
pub type Mmfr0 = LocalRegisterCopy<u64, id_aa64mmfr0_el1::Register>;
/// A snapshot of ID_AA64MMFR1_EL1.
pub type Mmfr1 = LocalRegisterCopy<u64, id_aa64mmfr1_el1::Register>;

/// The physical address width reported by `mmfr0`, capped to 48 bits.
/// 52- and 56-bit output addressing is not supported by this engine.
pub fn pa_range_bits(mmfr0: Mmfr0) -> u32 {
    match mmfr0.read(id_aa64mmfr0_el1::pa_range) {
        0 => 32,
        1 => 36,
        2 => 40,
        3 => 42,
        4 => 44,
        _ => 48,
    }
}

/// Reads this CPU's physical address width, capped to 48 bits.
pub fn discover_pa_range() -> u32 {
    pa_range_bits(LocalRegisterCopy::new(ID_AA64MMFR0_EL1.get()))
}

/// Stage-1 support for the geometry's granule per `mmfr0`.
pub fn stage1_granule_supported(mmfr0: Mmfr0, geometry: TableGeometry) -> bool {
    match geometry.granule_shift() {
        12 => mmfr0.read(id_aa64mmfr0_el1::t_gran4) != 0xf,
        14 => mmfr0.read(id_aa64mmfr0_el1::t_gran16) != 0,
        _ => false,
    }
}

/// Stage-2 support for the geometry's granule per `mmfr0`. A `_2` field of
/// zero defers to the stage-1 field.
pub fn stage2_granule_supported(mmfr0: Mmfr0, geometry: TableGeometry) -> bool {
    let field = match geometry.granule_shift() {
        12 => id_aa64mmfr0_el1::t_gran4_2,
        14 => id_aa64mmfr0_el1::t_gran16_2,
        _ => return false,
    };
    match mmfr0.read(field) {
        0 => stage1_granule_supported(mmfr0, geometry),
        1 => false,
        _ => true,
    }
}

/// Whether the CPU implements the Virtualization Host Extensions.
pub fn vhe_supported(mmfr1: Mmfr1) -> bool {
    mmfr1.read(id_aa64mmfr1_el1::vh) != 0
}

// Encoding shared by TCR_EL2.IPS and VTCR_EL2.PS.
fn ps_for_bits(bits: u32) -> u64 {
    if bits <= 32 {
        0b000
    } else if bits <= 36 {
        0b001
    } else if bits <= 40 {
        0b010
    } else if bits <= 42 {
        0b011
    } else if bits <= 44 {
        0b100
    } else {
        0b101
    }
}

fn tcr_tg0(geometry: TableGeometry) -> FieldValue<u64, tcr_el2::Register> {
    match geometry.granule_shift() {
        12 => tcr_el2::tg0::Granule4k,
        _ => tcr_el2::tg0::Granule16k,
    }
}

fn tcr_tg1(geometry: TableGeometry) -> FieldValue<u64, tcr_el2::Register> {
    match geometry.granule_shift() {
        12 => tcr_el2::tg1::Granule4k,
        _ => tcr_el2::tg1::Granule16k,
    }
}

fn vtcr_tg0(geometry: TableGeometry) -> FieldValue<u64, vtcr_el2::Register> {
    match geometry.granule_shift() {
        12 => vtcr_el2::tg0::Granule4k,
        _ => vtcr_el2::tg0::Granule16k,
    }
}

/// VTCR_EL2.SL0 for the walk's starting hardware level (D8.1.4). The
/// encodings with 4KB root level 3 need FEAT_TTST and are not used by the
/// supported geometries.
fn vtcr_sl0(geometry: TableGeometry) -> u64 {
    match (geometry.granule_shift(), geometry.root_hw_level()) {
        (12, 0) => 0b10,
        (12, 1) => 0b01,
        (12, 2) => 0b00,
        (14, 1) => 0b10,
        (14, 2) => 0b01,
        (14, 3) => 0b00,
        _ => unreachable!(),
    }
}

/// D24.2.122 MAIR_EL2, Memory Attribute Indirection Register. Attr0 is
/// Normal write-back write-allocate, Attr1 is Device-nGnRnE, matching the
/// AttrIndx conventions used by the stage-1 descriptor encoder.
pub fn make_mair_el2() -> u64 {
    let mut mair = LocalRegisterCopy::<u64, mair_el2::Register>::new(0);
    mair.modify(mair_el2::attr0.val(0xff));
    mair.modify(mair_el2::attr1.val(0x00));
    mair.get()
}

/// D24.2.183 TCR_EL2, Translation Control Register, When ELIsInHost.
/// Both halves use write-back write-allocate, inner-shareable table walks.
pub fn make_tcr_el2(pa_bits: u32, va_bits: u32, geometry: TableGeometry) -> u64 {
    let mut tcr = LocalRegisterCopy::<u64, tcr_el2::Register>::new(0);

    // TTBR0_EL2 attributes.
    tcr.modify(tcr_el2::t0sz.val((64 - va_bits) as u64));
    tcr.modify(tcr_el2::irgn0::WriteBackWriteAlloc);
    tcr.modify(tcr_el2::orgn0::WriteBackWriteAlloc);
    tcr.modify(tcr_el2::sh0::InnerShareable);
    tcr.modify(tcr_tg0(geometry));

    // TTBR1_EL2 attributes.
    tcr.modify(tcr_el2::t1sz.val((64 - va_bits) as u64));
    tcr.modify(tcr_el2::irgn1::WriteBackWriteAlloc);
    tcr.modify(tcr_el2::orgn1::WriteBackWriteAlloc);
    tcr.modify(tcr_el2::sh1::InnerShareable);
    tcr.modify(tcr_tg1(geometry));

    tcr.modify(tcr_el2::ips.val(ps_for_bits(pa_bits)));

    tcr.get()
}

/// D24.2.210 VTCR_EL2, Virtualization Translation Control Register.
/// The IPA width comes from the stage-2 geometry.
pub fn make_vtcr_el2(pa_bits: u32, geometry: TableGeometry) -> u64 {
    let mut vtcr = LocalRegisterCopy::<u64, vtcr_el2::Register>::new(0);

    vtcr.modify(vtcr_el2::t0sz.val((64 - geometry.ia_bits()) as u64));
    vtcr.modify(vtcr_el2::sl0.val(vtcr_sl0(geometry)));
    vtcr.modify(vtcr_el2::irgn0::WriteBackWriteAlloc);
    vtcr.modify(vtcr_el2::orgn0::WriteBackWriteAlloc);
    vtcr.modify(vtcr_el2::sh0::InnerShareable);
    vtcr.modify(vtcr_tg0(geometry));

    vtcr.modify(vtcr_el2::ps.val(ps_for_bits(pa_bits)));

    vtcr.get()
}

/// Programs TTBR0_EL2 with the root table `root` tagged with `asid`.
pub fn install_user_ttbr(root: SupervisorPhysAddr, asid: u16) {
    let mut ttbr = LocalRegisterCopy::<u64, ttbr0_el2::Register>::new(0);
    ttbr.modify(ttbr0_el2::baddr.val(root.bits() >> 1));
    ttbr.modify(ttbr0_el2::asid.val(asid as u64));
    TTBR0_EL2.set(ttbr.get());
}

/// Programs TTBR1_EL2 with the root table `root` tagged with `asid`.
pub fn install_kernel_ttbr(root: SupervisorPhysAddr, asid: u16) {
    let mut ttbr = LocalRegisterCopy::<u64, ttbr1_el2::Register>::new(0);
    ttbr.modify(ttbr1_el2::baddr.val(root.bits() >> 1));
    ttbr.modify(ttbr1_el2::asid.val(asid as u64));
    TTBR1_EL2.set(ttbr.get());
}

/// Programs VTTBR_EL2 with the stage-2 root `root` tagged with `vmid`.
pub fn install_guest_ttbr(root: SupervisorPhysAddr, vmid: u16) {
    let mut vttbr = LocalRegisterCopy::<u64, vttbr_el2::Register>::new(0);
    vttbr.modify(vttbr_el2::baddr.val(root.bits() >> 1));
    vttbr.modify(vttbr_el2::vmid.val(vmid as u64));
    VTTBR_EL2.set(vttbr.get());
}

/// Writes the translation-control state composed by the builders above.
/// Must run before `enable_mmu`, with the roots already installed.
pub fn install_translation_control(mair: u64, tcr: u64, vtcr: u64) {
    MAIR_EL2.set(mair);
    TCR_EL2.set(tcr);
    VTCR_EL2.set(vtcr);
    aarch64_regs::isb();
}

/// Turns on the MMU and both caches (SCTLR_EL2.{M,C,I}).
pub fn enable_mmu() {
    let mut sctlr = LocalRegisterCopy::<u64, sctlr_el2::Register>::new(SCTLR_EL2.get());
    sctlr.modify(sctlr_el2::m::SET + sctlr_el2::c::SET + sctlr_el2::i::SET);
    SCTLR_EL2.set(sctlr.get());
    aarch64_regs::isb();
}
