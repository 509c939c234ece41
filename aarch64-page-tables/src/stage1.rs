// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use aarch64_pages::{RawAddr, SupervisorVirtAddr};

use crate::cpu::CpuOps;
use crate::page_table::TranslationStage;
use crate::pte::{s1, DescriptorOps, Protection};
use crate::tlb;

/// The EL2 stage-1 translation regime (EL2&0 under VHE). Input addresses
/// are virtual and tagged with an ASID; roots are programmed into
/// TTBR0_EL2 or TTBR1_EL2.
#[derive(Clone, Copy, Debug)]
pub enum Stage1 {}

/// A stage-1 input address: a VA plus the ASID that owns it. The ASID rides
/// along so that per-VA TLB invalidation hits only the address space being
/// edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage1Addr {
    pub va: SupervisorVirtAddr,
    pub asid: u16,
}

impl Stage1Addr {
    /// Creates a stage-1 input address.
    pub const fn new(va: SupervisorVirtAddr, asid: u16) -> Self {
        Self { va, asid }
    }
}

impl DescriptorOps for Stage1 {
    fn encode_attrs(p: Protection, device: bool) -> u64 {
        let mut attrs = s1::attrindx(if device {
            s1::MAIR_IDX_DEVICE
        } else {
            s1::MAIR_IDX_NORMAL
        });
        attrs |= s1::AF;
        attrs |= if p.contains(Protection::SHARED) {
            s1::SH_INNER_SHAREABLE
        } else {
            s1::SH_NON_SHAREABLE
        };

        // D8.4.1.2.1 Stage 1 data accesses using Direct permissions.
        if p.contains(Protection::KERNEL) {
            attrs |= if p.contains(Protection::WRITE) {
                s1::AP_RW_EL2
            } else {
                s1::AP_RO_EL2
            };
        } else {
            attrs |= if p.contains(Protection::WRITE) {
                s1::AP_RW_EL0_EL2
            } else {
                s1::AP_RO_EL0_EL2
            };
            // User page.
            attrs |= s1::NG;
        }

        if !p.contains(Protection::EXEC) {
            attrs |= s1::PXN | s1::UXN;
        }

        attrs
    }
}

impl TranslationStage for Stage1 {
    type InputAddr = Stage1Addr;

    fn addr_bits(a: Self::InputAddr) -> u64 {
        a.va.bits()
    }

    fn with_addr_bits(a: Self::InputAddr, bits: u64) -> Self::InputAddr {
        // New VA, same ASID.
        Stage1Addr::new(RawAddr::supervisor_virt(bits), a.asid)
    }

    fn invalidate_all<C: CpuOps>(cpu: &C) {
        tlb::invalidate_all_stage1(cpu);
    }

    fn invalidate_range<C: CpuOps>(cpu: &C, granule_size: u64, a: Self::InputAddr, size: u64) {
        tlb::invalidate_va_range(cpu, a.va, size, a.asid, granule_size);
    }
}
