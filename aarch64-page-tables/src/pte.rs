// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! VMSAv8-64 descriptor encoding and decoding (D8.3.1).
//!
//! A descriptor is a 64-bit word whose low two bits select its kind:
//!
//! ```text
//!   0b00 / 0b10  fault (not present)
//!   0b01         block (leaf at an upper level)
//!   0b11         table at non-last levels, page at the last level
//! ```
//!
//! The output-address field occupies bits `[granule_shift..oa_bits-1]`; its
//! width therefore depends on the runtime-discovered physical address range,
//! which this engine caps at 48 bits. Attribute fields differ between
//! stage 1 (Figure D8-16) and stage 2 (Figure D8-17); the stage-specific
//! encoders implement [`DescriptorOps`].

use aarch64_pages::{RawAddr, SupervisorPhysAddr};
use bitflags::bitflags;
use static_assertions::const_assert_eq;

// Descriptor type field, bits [1:0].
pub(crate) const PTE_TYPE_MASK: u64 = 0x3;
pub(crate) const PTE_TYPE_FAULT: u64 = 0x0;
pub(crate) const PTE_TYPE_BLOCK: u64 = 0x1;
pub(crate) const PTE_TYPE_PAGE_OR_TABLE: u64 = 0x3;

// Tables are walked as arrays of raw descriptor words.
const_assert_eq!(core::mem::size_of::<Pte>(), 8);

/// A translation-table descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u64);

impl Pte {
    /// The fault descriptor: not present, no address, no attributes.
    pub const FAULT: Pte = Pte(PTE_TYPE_FAULT);

    /// Creates a descriptor from its raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Pte(bits)
    }

    /// Returns the raw bits that make up the descriptor.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Returns `true` if the descriptor is a fault entry (valid bit clear).
    pub const fn is_fault(&self) -> bool {
        self.0 & 0x1 == 0
    }

    /// Returns `true` if the descriptor is a block mapping.
    pub const fn is_block(&self) -> bool {
        self.0 & PTE_TYPE_MASK == PTE_TYPE_BLOCK
    }

    /// Returns `true` if the descriptor is a table or a page; which of the
    /// two depends on the level it was read from.
    pub const fn is_table_or_page(&self) -> bool {
        self.0 & PTE_TYPE_MASK == PTE_TYPE_PAGE_OR_TABLE
    }
}

/// Stage 1 attribute fields in block and page descriptors (Figure D8-16).
pub mod s1 {
    /// AttrIndx[2:0], an index into MAIR_EL2.
    pub const ATTRINDX_SHIFT: u64 = 2;

    /// Encodes a MAIR index into AttrIndx.
    pub const fn attrindx(idx: u64) -> u64 {
        (idx & 0x7) << ATTRINDX_SHIFT
    }

    /// MAIR index conventions; `mmu::make_mair_el2` programs the matching
    /// attribute bytes.
    pub const MAIR_IDX_NORMAL: u64 = 0;
    pub const MAIR_IDX_DEVICE: u64 = 1;

    /// AP[2:1], data access permissions (Table D8-63).
    pub const AP_SHIFT: u64 = 6;
    pub const AP_RW_EL2: u64 = 0 << AP_SHIFT;
    pub const AP_RW_EL0_EL2: u64 = 1 << AP_SHIFT;
    pub const AP_RO_EL2: u64 = 2 << AP_SHIFT;
    pub const AP_RO_EL0_EL2: u64 = 3 << AP_SHIFT;

    /// SH[1:0], shareability (Table D8-95).
    pub const SH_SHIFT: u64 = 8;
    pub const SH_NON_SHAREABLE: u64 = 0 << SH_SHIFT;
    pub const SH_OUTER_SHAREABLE: u64 = 2 << SH_SHIFT;
    pub const SH_INNER_SHAREABLE: u64 = 3 << SH_SHIFT;

    /// The Access flag (D8.5.1). Always set; this engine takes no AF faults.
    pub const AF: u64 = 1 << 10;

    /// Not-global; the entry is tagged with the current ASID (D8.16.3.1).
    pub const NG: u64 = 1 << 11;

    /// Privileged / unprivileged execute-never (D8.4.1.2.3).
    pub const PXN: u64 = 1 << 53;
    pub const UXN: u64 = 1 << 54;
}

/// Stage 2 attribute fields in block and page descriptors (Figure D8-17).
pub mod s2 {
    /// MemAttr[3:0], a direct memory-type encoding, not a MAIR index
    /// (D8.6.5, FWB disabled).
    pub const MEMATTR_SHIFT: u64 = 2;

    /// Encodes a memory type into MemAttr.
    pub const fn memattr(attr: u64) -> u64 {
        (attr & 0xf) << MEMATTR_SHIFT
    }

    pub const MEMATTR_DEVICE_NGNRNE: u64 = 0x0;
    /// Normal memory, outer and inner write-back cacheable.
    pub const MEMATTR_NORMAL_WB: u64 = 0xf;

    /// S2AP[1:0], data access permissions (Table D8-76).
    pub const AP_SHIFT: u64 = 6;
    pub const AP_NONE: u64 = 0 << AP_SHIFT;
    pub const AP_RDONLY: u64 = 1 << AP_SHIFT;
    pub const AP_RDWR: u64 = 3 << AP_SHIFT;

    /// The Access flag (D8.5.1).
    pub const AF: u64 = 1 << 10;

    /// XN[1:0] (D8.4.2.2). `0b10` forbids instruction fetch at both EL1 and
    /// EL0; the other encodings need FEAT_XNX and are not used here.
    pub const XN_SHIFT: u64 = 53;
    pub const XN_NEVER: u64 = 0b10 << XN_SHIFT;
}

bitflags! {
    /// Abstract protection and attribute flags for a mapping. The engine
    /// translates these into stage-specific descriptor bits.
    ///
    /// Unknown bits are dropped at construction: build values with the
    /// constants below or with [`Protection::from_bits_truncate`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Protection: u16 {
        /// Data reads allowed (stage 2 only; stage 1 EL2 mappings are
        /// always readable).
        const READ = 1 << 0;
        /// Data writes allowed.
        const WRITE = 1 << 1;
        /// Instruction fetch allowed.
        const EXEC = 1 << 2;
        /// EL2-only mapping; without it the mapping is also EL0-accessible
        /// and ASID-tagged.
        const KERNEL = 1 << 3;
        /// Device memory (nGnRnE) instead of Normal write-back.
        const DEVICE = 1 << 4;
        /// Inner-shareable instead of non-shareable.
        const SHARED = 1 << 5;
    }
}

/// Stage-specific encoding of leaf-descriptor attribute fields. The generic
/// walker consumes this interface; `Stage1` and `Stage2` implement it.
pub trait DescriptorOps {
    /// Computes the attribute bits for a leaf mapping protections `p`.
    /// Encoding never fails; unknown flags were dropped when `p` was built.
    fn encode_attrs(p: Protection, device: bool) -> u64;
}

/// The output-address field layout shared by every descriptor of one table
/// configuration. OA is capped at 48 bits regardless of what the CPU
/// reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PteFormat {
    phys_mask: u64,
}

impl PteFormat {
    /// Creates the format for an `oa_bits`-wide output address and the given
    /// granule.
    pub const fn new(oa_bits: u32, granule_shift: u32) -> Self {
        let oa_bits = if oa_bits > 48 { 48 } else { oa_bits };
        let addr_mask = (1u64 << oa_bits) - 1;
        let granule_mask = (1u64 << granule_shift) - 1;
        // e.g. 0x0000_ffff_ffff_f000 for a 4KB granule and 48-bit OA.
        Self {
            phys_mask: addr_mask & !granule_mask,
        }
    }

    /// The mask of output-address bits within a descriptor.
    pub const fn phys_field_mask(&self) -> u64 {
        self.phys_mask
    }

    /// The mask of attribute bits: everything that is neither address nor
    /// type. Used to carry a block's attributes onto its split-out children.
    pub const fn attr_field_mask(&self) -> u64 {
        !self.phys_mask & !PTE_TYPE_MASK
    }

    /// Encodes a physical address into the output-address field.
    pub const fn phys_to_pte(&self, pa: SupervisorPhysAddr) -> u64 {
        pa.bits() & self.phys_mask
    }

    /// Extracts the physical address from a descriptor.
    pub const fn pte_to_phys(&self, pte: Pte) -> SupervisorPhysAddr {
        RawAddr::supervisor(pte.bits() & self.phys_mask)
    }

    /// Makes a table descriptor referencing the table page at `pa`.
    pub const fn make_table(&self, pa: SupervisorPhysAddr) -> Pte {
        Pte::from_bits(PTE_TYPE_PAGE_OR_TABLE | self.phys_to_pte(pa))
    }

    /// Makes a block descriptor with pre-encoded attribute bits.
    pub const fn make_leaf_block_attr(&self, pa: SupervisorPhysAddr, attr: u64) -> Pte {
        Pte::from_bits(PTE_TYPE_BLOCK | attr | self.phys_to_pte(pa))
    }

    /// Makes a page descriptor with pre-encoded attribute bits.
    pub const fn make_leaf_page_attr(&self, pa: SupervisorPhysAddr, attr: u64) -> Pte {
        Pte::from_bits(PTE_TYPE_PAGE_OR_TABLE | attr | self.phys_to_pte(pa))
    }

    /// Makes a block descriptor mapping `pa` with protections `p`.
    pub fn make_leaf_block<S: DescriptorOps>(
        &self,
        pa: SupervisorPhysAddr,
        p: Protection,
        device: bool,
    ) -> Pte {
        self.make_leaf_block_attr(pa, S::encode_attrs(p, device))
    }

    /// Makes a page descriptor mapping `pa` with protections `p`.
    pub fn make_leaf_page<S: DescriptorOps>(
        &self,
        pa: SupervisorPhysAddr,
        p: Protection,
        device: bool,
    ) -> Pte {
        self.make_leaf_page_attr(pa, S::encode_attrs(p, device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_kinds() {
        assert!(Pte::FAULT.is_fault());
        assert!(Pte::from_bits(0x2).is_fault());
        assert!(Pte::from_bits(0x1).is_block());
        assert!(Pte::from_bits(0x3).is_table_or_page());
        assert!(!Pte::from_bits(0x3).is_fault());
    }

    #[test]
    fn masks_4k_48bit() {
        let f = PteFormat::new(48, 12);
        assert_eq!(f.phys_field_mask(), 0x0000_ffff_ffff_f000);
        assert_eq!(f.attr_field_mask(), 0xffff_0000_0000_0ffc);
    }

    #[test]
    fn masks_16k_40bit() {
        let f = PteFormat::new(40, 14);
        assert_eq!(f.phys_field_mask(), 0x0000_00ff_ffff_c000);
        assert_eq!(f.attr_field_mask(), 0xffff_ff00_0000_3ffc);
    }

    #[test]
    fn oa_capped_to_48() {
        assert_eq!(PteFormat::new(52, 12), PteFormat::new(48, 12));
    }

    #[test]
    fn table_descriptor() {
        let f = PteFormat::new(48, 12);
        let pte = f.make_table(RawAddr::supervisor(0x8004_3000));
        assert_eq!(pte.bits(), 0x8004_3003);
        assert!(pte.is_table_or_page());
        assert_eq!(f.pte_to_phys(pte).bits(), 0x8004_3000);
    }

    #[test]
    fn phys_round_trip_masks_low_and_high_bits() {
        let f = PteFormat::new(48, 12);
        // Bits below the granule and above the OA width never reach the
        // address field.
        assert_eq!(f.phys_to_pte(RawAddr::supervisor(0xffff_0000_0000_0123)), 0);
        let leaf = f.make_leaf_page_attr(RawAddr::supervisor(0x8000_0000), s1::AF);
        assert_eq!(f.pte_to_phys(leaf).bits(), 0x8000_0000);
    }

    #[test]
    fn protection_drops_unknown_bits() {
        let p = Protection::from_bits_truncate(0xffc0 | Protection::READ.bits());
        assert_eq!(p, Protection::READ);
    }
}
