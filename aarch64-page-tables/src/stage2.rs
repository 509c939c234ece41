// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use aarch64_pages::{GuestPhysAddr, RawAddr};

use crate::cpu::CpuOps;
use crate::page_table::TranslationStage;
use crate::pte::{s2, DescriptorOps, Protection};
use crate::tlb;

/// The stage-2 translation regime imposed on guests (IPA to PA). Input
/// addresses are intermediate physical; roots are programmed into
/// VTTBR_EL2, and TLB entries are tagged by the VMID that register holds.
#[derive(Clone, Copy, Debug)]
pub enum Stage2 {}

/// A stage-2 input address: a guest IPA. No extra tag is needed; the
/// hardware scopes invalidation to the current VMID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage2Addr {
    pub ipa: GuestPhysAddr,
}

impl Stage2Addr {
    /// Creates a stage-2 input address.
    pub const fn new(ipa: GuestPhysAddr) -> Self {
        Self { ipa }
    }
}

impl DescriptorOps for Stage2 {
    fn encode_attrs(p: Protection, device: bool) -> u64 {
        let mut attrs = s2::memattr(if device {
            s2::MEMATTR_DEVICE_NGNRNE
        } else {
            s2::MEMATTR_NORMAL_WB
        });
        attrs |= s2::AF;

        // D8.4.2.1.1 Stage 2 data accesses using Direct permissions.
        let rd = p.contains(Protection::READ);
        let wr = p.contains(Protection::WRITE);
        if rd && wr {
            attrs |= s2::AP_RDWR;
        } else if rd {
            attrs |= s2::AP_RDONLY;
        } else {
            attrs |= s2::AP_NONE;
        }

        if !p.contains(Protection::EXEC) {
            attrs |= s2::XN_NEVER;
        }

        attrs
    }
}

impl TranslationStage for Stage2 {
    type InputAddr = Stage2Addr;

    fn addr_bits(a: Self::InputAddr) -> u64 {
        a.ipa.bits()
    }

    fn with_addr_bits(_a: Self::InputAddr, bits: u64) -> Self::InputAddr {
        Stage2Addr::new(RawAddr::guest_phys(bits))
    }

    fn invalidate_all<C: CpuOps>(cpu: &C) {
        tlb::invalidate_all_stage2(cpu);
    }

    fn invalidate_range<C: CpuOps>(cpu: &C, granule_size: u64, a: Self::InputAddr, size: u64) {
        tlb::invalidate_ipa_range(cpu, a.ipa, size, granule_size);
    }
}
