// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Accessor types for AArch64 system registers.

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
use core::arch::asm;

use tock_registers::interfaces::{Readable, Writeable};

use crate::defs::*;

// Safety: MRS/MSR themselves do not access memory; their only side effect is
// reading or writing the named system register. Callers are responsible for
// any synchronization the architecture requires around the access (e.g. an
// ISB after writes that affect translation).

macro_rules! sysreg_read {
    ($asm_name:literal) => {
        #[cfg(all(target_arch = "aarch64", target_os = "none"))]
        #[inline]
        fn get(&self) -> u64 {
            let r: u64;
            unsafe {
                asm!(concat!("mrs {rd}, ", $asm_name), rd = out(reg) r);
            }
            r
        }

        // Mock implementation so that users of this crate can be unit tested
        // on the build host.
        #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
        fn get(&self) -> u64 {
            unimplemented!("read of {} off target", $asm_name)
        }
    };
}

macro_rules! sysreg_write {
    ($asm_name:literal) => {
        #[cfg(all(target_arch = "aarch64", target_os = "none"))]
        #[inline]
        fn set(&self, val: u64) {
            unsafe {
                asm!(concat!("msr ", $asm_name, ", {rs}"), rs = in(reg) val);
            }
        }

        #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
        fn set(&self, _val: u64) {
            unimplemented!("write of {} off target", $asm_name)
        }
    };
}

/// Defines a read/write system register accessor.
macro_rules! read_write_sysreg {
    ($(#[$attr:meta])* $name:ident, $regname:ident, $asm_name:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone)]
        pub struct $name;

        impl Readable for $name {
            type T = u64;
            type R = $regname::Register;

            sysreg_read!($asm_name);
        }

        impl Writeable for $name {
            type T = u64;
            type R = $regname::Register;

            sysreg_write!($asm_name);
        }
    };
}

/// Defines a read-only system register accessor.
macro_rules! read_only_sysreg {
    ($(#[$attr:meta])* $name:ident, $regname:ident, $asm_name:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone)]
        pub struct $name;

        impl Readable for $name {
            type T = u64;
            type R = $regname::Register;

            sysreg_read!($asm_name);
        }
    };
}

read_write_sysreg!(
    /// System control register for EL2.
    SctlrEl2,
    sctlr_el2,
    "sctlr_el2"
);
read_write_sysreg!(
    /// Translation control register for EL2.
    TcrEl2,
    tcr_el2,
    "tcr_el2"
);
read_write_sysreg!(
    /// Virtualization translation control register.
    VtcrEl2,
    vtcr_el2,
    "vtcr_el2"
);
read_write_sysreg!(
    /// Memory attribute indirection register for EL2.
    MairEl2,
    mair_el2,
    "mair_el2"
);
read_write_sysreg!(
    /// Lower-VA-range translation table base register for EL2.
    Ttbr0El2,
    ttbr0_el2,
    "ttbr0_el2"
);
read_write_sysreg!(
    /// Upper-VA-range translation table base register for EL2.
    Ttbr1El2,
    ttbr1_el2,
    "ttbr1_el2"
);
read_write_sysreg!(
    /// Virtualization translation table base register.
    VttbrEl2,
    vttbr_el2,
    "vttbr_el2"
);
read_only_sysreg!(
    /// Memory model feature register 0.
    IdAa64mmfr0El1,
    id_aa64mmfr0_el1,
    "id_aa64mmfr0_el1"
);
read_only_sysreg!(
    /// Memory model feature register 1.
    IdAa64mmfr1El1,
    id_aa64mmfr1_el1,
    "id_aa64mmfr1_el1"
);
read_only_sysreg!(
    /// Memory model feature register 2.
    IdAa64mmfr2El1,
    id_aa64mmfr2_el1,
    "id_aa64mmfr2_el1"
);

pub const SCTLR_EL2: SctlrEl2 = SctlrEl2;
pub const TCR_EL2: TcrEl2 = TcrEl2;
pub const VTCR_EL2: VtcrEl2 = VtcrEl2;
pub const MAIR_EL2: MairEl2 = MairEl2;
pub const TTBR0_EL2: Ttbr0El2 = Ttbr0El2;
pub const TTBR1_EL2: Ttbr1El2 = Ttbr1El2;
pub const VTTBR_EL2: VttbrEl2 = VttbrEl2;
pub const ID_AA64MMFR0_EL1: IdAa64mmfr0El1 = IdAa64mmfr0El1;
pub const ID_AA64MMFR1_EL1: IdAa64mmfr1El1 = IdAa64mmfr1El1;
pub const ID_AA64MMFR2_EL1: IdAa64mmfr2El1 = IdAa64mmfr2El1;
