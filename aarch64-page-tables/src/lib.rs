// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! # Translation-table management for ARMv8-A at EL2.
//!
//! ## Key types
//!
//! - `RawAddr` and friends are the strongly-typed addresses provided by the
//!   `aarch64-pages` crate.
//! - `FirstStagePageTable` and `GuestStagePageTable` are the stage-1 (EL2&0
//!   VA) and stage-2 (guest IPA) instantiations of `PageTable`, the engine
//!   that builds and mutates translation trees over contiguous ranges.
//! - `TableGeometry` captures one supported (granule, input-address width)
//!   configuration and answers all level/index arithmetic.
//! - `PagePool` is the contract for allocating and freeing the granule-sized
//!   pages that back the tables; `FreePagePool` is a simple free-list
//!   provider for early boot.
//! - `DirectMap` turns a table page's physical address into a usable
//!   pointer, whether the MMU is off (identity) or on (direct-map window).
//! - `CpuOps` is the CPU contract: the MMU state, barriers, and broadcast
//!   TLB invalidation. `HwCpu` executes the real instructions.
//!
//! ## Maintenance rules
//!
//! When the MMU is on, every transition of a valid descriptor goes through a
//! break-before-make sequence: the slot is faulted, the stale translation is
//! invalidated, and only then is the new descriptor published, followed by a
//! second invalidation. Other CPUs' hardware walkers may race the mutator;
//! BBM is what keeps them from caching a blend of old and new bits. Software
//! callers, however, get no such protection: a `PageTable` has a single
//! owner and all mutators take `&mut self`.
//!
//! ## Ownership
//!
//! Every table page reachable from a root was obtained from the `PagePool`
//! exactly once and is returned exactly once, either when `unmap_range`
//! detaches a subtree or at `deinit`. Leaf pages (the memory being mapped)
//! are never owned by the table; the engine reads and writes only its own
//! table pages.
#![no_std]

mod cpu;
mod direct_map;
mod geometry;
pub mod mmu;
mod page_pool;
mod page_table;
pub mod pte;
mod stage1;
mod stage2;
pub mod tlb;

pub use cpu::{CpuOps, HwCpu};
pub use direct_map::{DirectMap, IdentityMap, LinearMap};
pub use geometry::TableGeometry;
pub use page_pool::{FreePagePool, PagePool};
pub use page_table::Error as PageTableError;
pub use page_table::Result as PageTableResult;
pub use page_table::{
    FirstStagePageTable, GuestStagePageTable, PageTable, Translation, TranslationStage,
};
pub use pte::{DescriptorOps, Protection, Pte, PteFormat};
pub use stage1::{Stage1, Stage1Addr};
pub use stage2::{Stage2, Stage2Addr};

#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(test)]
pub(crate) mod test_stubs;
