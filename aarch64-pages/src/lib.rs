// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! # Strongly-typed addresses for ARMv8-A at EL2.
//!
//! ## Key types
//!
//! - `RawAddr<AS>` is an address in one of four disjoint address spaces:
//!   physical (`SupervisorPhys`), EL2 virtual (`SupervisorVirt`), guest
//!   intermediate physical (`GuestPhys`), and bus (`Bus`). The address space
//!   is a zero-sized type parameter, so mixing spaces is a compile error.
//! - `AddrRange<AS>` walks an address range with a fixed byte stride; it is
//!   used by TLB range maintenance to visit one granule at a time.
//!
//! Addresses support alignment queries and byte arithmetic but no implicit
//! conversion between spaces; crossing a space boundary (e.g. resolving a VA
//! to a PA) is the job of a translation table, not of this crate.
#![no_std]

mod addr;

pub use addr::{
    AddrRange, AddressSpace, Bus, BusAddr, GuestPhys, GuestPhysAddr, RawAddr, SupervisorPhys,
    SupervisorPhysAddr, SupervisorVirt, SupervisorVirtAddr,
};

#[cfg(test)]
#[macro_use]
extern crate std;
