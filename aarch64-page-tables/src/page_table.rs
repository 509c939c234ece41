// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The stage-parameterized translation-table engine.

use core::marker::PhantomData;
use core::ptr;

use aarch64_pages::{RawAddr, SupervisorPhysAddr};

use crate::cpu::CpuOps;
use crate::direct_map::DirectMap;
use crate::geometry::TableGeometry;
use crate::page_pool::PagePool;
use crate::pte::{DescriptorOps, Protection, Pte, PteFormat};
use crate::stage1::Stage1;
use crate::stage2::Stage2;

/// Errors returned by translation-table operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// An input or output address is not aligned to the translation
    /// granule, or to the block size a split requires.
    MisalignedAddress,
    /// `addr + size` wraps the end of the address space.
    AddressOverflow,
    /// Part of the requested range is already covered by a valid mapping.
    MappingOverlap,
    /// No mapping exists where the operation requires one.
    NotMapped,
    /// A leaf descriptor was found where a table descriptor is required.
    LeafEntryNotTable,
    /// The page pool could not provide a page-table page.
    InsufficientPtePages,
}

pub type Result<T> = core::result::Result<T, Error>;

/// A translation stage: the pairing of an input-address flavor with the
/// descriptor encoding and TLB maintenance that match it. Implemented by
/// [`Stage1`] (EL2 VA + ASID) and [`Stage2`] (guest IPA).
pub trait TranslationStage: DescriptorOps {
    /// Stage-specific input address for map/unmap/protect operations.
    type InputAddr: Copy;

    /// The raw bits of the input address.
    fn addr_bits(a: Self::InputAddr) -> u64;

    /// Replaces the address bits, preserving any stage tag (the ASID).
    fn with_addr_bits(a: Self::InputAddr, bits: u64) -> Self::InputAddr;

    /// Invalidates all cached translations for this stage.
    fn invalidate_all<C: CpuOps>(cpu: &C);

    /// Invalidates cached translations covering `[a, a + size)`, one
    /// granule at a time.
    fn invalidate_range<C: CpuOps>(cpu: &C, granule_size: u64, a: Self::InputAddr, size: u64);
}

/// Kind of descriptor update performed by `write_pte_and_sync`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UpdateKind {
    /// A new valid descriptor into a FAULT slot.
    Install,
    /// An existing mapping cleared to FAULT.
    Remove,
    /// An existing mapping replaced in place.
    Update,
}

/// The result of a software walk of one input address.
#[derive(Clone, Copy, Debug)]
pub struct Translation {
    /// The physical address the input resolves to.
    pub pa: SupervisorPhysAddr,
    /// The logical level of the leaf descriptor.
    pub level: u32,
    /// The leaf descriptor itself.
    pub pte: Pte,
}

/// A stage-parameterized translation tree: one root table page plus every
/// table page reachable from it, all owned by this value and obtained from
/// its page pool.
///
/// The public mutators operate on contiguous ranges and take `&mut self`;
/// the engine assumes exactly one software mutator but may race hardware
/// walkers on other CPUs, which is what the break-before-make discipline in
/// `write_pte_and_sync` is for. No operation blocks; failures are returned,
/// never thrown, and a failed range operation leaves the already-processed
/// prefix in place.
pub struct PageTable<S, A, D, C>
where
    S: TranslationStage,
    A: PagePool,
    D: DirectMap,
    C: CpuOps,
{
    geometry: TableGeometry,
    format: PteFormat,
    pool: A,
    dmap: D,
    cpu: C,
    root: SupervisorPhysAddr,
    _stage: PhantomData<S>,
}

/// An EL2 stage-1 table, rooted for TTBR0_EL2 or TTBR1_EL2.
pub type FirstStagePageTable<A, D, C> = PageTable<Stage1, A, D, C>;
/// A stage-2 guest table, rooted for VTTBR_EL2.
pub type GuestStagePageTable<A, D, C> = PageTable<Stage2, A, D, C>;

impl<S, A, D, C> PageTable<S, A, D, C>
where
    S: TranslationStage,
    A: PagePool,
    D: DirectMap,
    C: CpuOps,
{
    /// Creates a table for the given geometry, allocating the root page
    /// from `pool`. The root starts entirely FAULT. `oa_bits` is the
    /// CPU-reported physical address width (capped internally to 48).
    pub fn new(geometry: TableGeometry, oa_bits: u32, pool: A, dmap: D, cpu: C) -> Result<Self> {
        let format = PteFormat::new(oa_bits, geometry.granule_shift());
        let mut this = Self {
            geometry,
            format,
            pool,
            dmap,
            cpu,
            root: RawAddr::supervisor(0),
            _stage: PhantomData,
        };
        this.root = this.alloc_table()?;
        Ok(this)
    }

    /// The physical address of the root table, suitable for programming the
    /// stage-appropriate base register.
    pub fn root(&self) -> SupervisorPhysAddr {
        self.root
    }

    /// The geometry this table was built with.
    pub fn geometry(&self) -> TableGeometry {
        self.geometry
    }

    /// Tears the table down, returning every owned page-table page to the
    /// pool. Performs no TLB maintenance and touches no system register;
    /// the caller must have already retired this root from TTBR/VTTBR.
    pub fn deinit(self) {
        self.free_subtree(self.root, 0);
    }

    /// Maps `[a, a + size)` to the contiguous physical range starting at
    /// `pa` with protections `p`, using the largest blocks the alignment of
    /// `a`, `pa` and the remaining size allow. Unlike unmap and protect,
    /// which round a partial trailing granule up, map consumes `size` in
    /// leaf-sized chunks: it must be a whole number of granules.
    ///
    /// Not atomic: on failure, the prefix already mapped remains mapped.
    pub fn map_range(
        &mut self,
        a: S::InputAddr,
        pa: SupervisorPhysAddr,
        size: u64,
        p: Protection,
    ) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let g = self.geometry.granule_size();
        // `a` and `pa` must be granule aligned, and `size` a granule
        // multiple; anything less would silently map physical memory past
        // the requested range.
        if S::addr_bits(a) & (g - 1) != 0 || !pa.is_aligned(g) || size & (g - 1) != 0 {
            return Err(Error::MisalignedAddress);
        }
        if S::addr_bits(a).checked_add(size).is_none() || pa.checked_increment(size).is_none() {
            return Err(Error::AddressOverflow);
        }

        let mut a = a;
        let mut pa = pa;
        let mut size = size;
        while size > 0 {
            // Pick the most suitable level to map at.
            let leaf = self.choose_leaf_level(S::addr_bits(a), pa.bits(), size);
            let map_sz = self.geometry.level_size(leaf);

            self.map_one(a, pa, p, leaf)?;

            a = S::with_addr_bits(a, S::addr_bits(a).wrapping_add(map_sz));
            pa = RawAddr::supervisor(pa.bits().wrapping_add(map_sz));
            size = size.saturating_sub(map_sz);
        }

        Ok(())
    }

    /// Unmaps translations covering `[a, a + size)`; the effective range is
    /// rounded up to the granule. Unmapped holes within the range are
    /// skipped. Blocks that straddle the range boundary are split; regions
    /// wholly covered are removed at the largest alignment-compatible
    /// level, detaching and freeing entire subtrees where one is covered.
    ///
    /// Not atomic: on failure, the prefix already unmapped stays unmapped.
    pub fn unmap_range(&mut self, a: S::InputAddr, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let g = self.geometry.granule_size();
        if S::addr_bits(a) & (g - 1) != 0 {
            return Err(Error::MisalignedAddress);
        }
        if S::addr_bits(a).checked_add(size).is_none() {
            return Err(Error::AddressOverflow);
        }

        let mut a = a;
        let mut size = size;
        while size > 0 {
            // The physical side places no constraint on unmapping.
            let leaf = self.choose_leaf_level(S::addr_bits(a), 0, size);
            let chunk = self.geometry.level_size(leaf);

            self.unmap_one(a, leaf)?;

            a = S::with_addr_bits(a, S::addr_bits(a).wrapping_add(chunk));
            size = size.saturating_sub(chunk);
        }

        Ok(())
    }

    /// Re-encodes the protections of every mapping in `[a, a + size)` to
    /// `p`, preserving each leaf's physical address; the effective range is
    /// rounded up to the granule. Enforced at page granularity, splitting
    /// blocks as needed; an unmapped page fails with `NotMapped`.
    ///
    /// Not atomic: on failure, the prefix already updated stays updated.
    pub fn protect_range(&mut self, a: S::InputAddr, size: u64, p: Protection) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let g = self.geometry.granule_size();
        if S::addr_bits(a) & (g - 1) != 0 {
            return Err(Error::MisalignedAddress);
        }
        if S::addr_bits(a).checked_add(size).is_none() {
            return Err(Error::AddressOverflow);
        }

        // Page granularity is the safest enforcement of protection.
        let leaf = self.geometry.last_level();
        let chunk = self.geometry.level_size(leaf);

        let mut a = a;
        let mut size = size;
        while size > 0 {
            self.protect_one(a, p, leaf)?;

            a = S::with_addr_bits(a, S::addr_bits(a).wrapping_add(chunk));
            size = size.saturating_sub(chunk);
        }

        Ok(())
    }

    /// Software-walks `a` and returns the translation, or `None` if any
    /// level faults.
    pub fn translate(&self, a: S::InputAddr) -> Option<Translation> {
        let mut t = self.table_ptr(self.root);
        for level in 0..self.geometry.levels() {
            let idx = self.geometry.index_at(S::addr_bits(a), level);
            let entry = self.read_entry(t, idx);
            if entry.is_fault() {
                return None;
            }
            if self.entry_is_table(level, entry) {
                t = self.table_ptr(self.format.pte_to_phys(entry));
                continue;
            }
            let offset = S::addr_bits(a) & (self.geometry.level_size(level) - 1);
            let base = self.format.pte_to_phys(entry);
            return Some(Translation {
                pa: RawAddr::supervisor(base.bits() + offset),
                level,
                pte: entry,
            });
        }
        None
    }

    /* Table access. */

    fn table_ptr(&self, pa: SupervisorPhysAddr) -> *mut u64 {
        self.dmap.pa_to_table(pa)
    }

    fn read_entry(&self, t: *mut u64, idx: usize) -> Pte {
        // Safety: `t` references a live table of `entries_per_table`
        // descriptors owned by this engine and `idx` comes from
        // `TableGeometry::index_at`, which masks it into range.
        Pte::from_bits(unsafe { ptr::read_volatile(t.add(idx)) })
    }

    fn write_entry(&self, t: *mut u64, idx: usize, pte: Pte) {
        // Safety: as for `read_entry`; the engine is the only software
        // mutator of its table pages.
        unsafe { ptr::write_volatile(t.add(idx), pte.bits()) };
    }

    /// Allocates a table page. The pool contract hands it over zero-filled,
    /// i.e. entirely FAULT; the `DMB` publishes those contents before the
    /// table can be linked where a hardware walker might reach it.
    fn alloc_table(&self) -> Result<SupervisorPhysAddr> {
        let pa = self.pool.alloc_page().ok_or(Error::InsufficientPtePages)?;
        self.cpu.dmb_ishst();
        Ok(pa)
    }

    /* Geometry helpers. */

    /// A `0b11` descriptor is a table everywhere but the last level, where
    /// it is a page.
    fn entry_is_table(&self, level: u32, pte: Pte) -> bool {
        pte.is_table_or_page() && level + 1 < self.geometry.levels()
    }

    /// Chooses the largest leaf level (smallest numeric level) whose
    /// mapping size fits in `size` with both `addr` and `pa` suitably
    /// aligned, falling back to page granularity. Deterministic; ignores
    /// what is already installed.
    fn choose_leaf_level(&self, addr: u64, pa: u64, size: u64) -> u32 {
        for level in 0..self.geometry.levels() {
            let ls = self.geometry.level_size(level);
            if size >= ls && (addr | pa) & (ls - 1) == 0 {
                return level;
            }
        }
        self.geometry.last_level()
    }

    /// The input address aligned down to the mapping size of `level`, for
    /// TLB maintenance over the full covered range.
    fn addr_at_level(&self, a: S::InputAddr, level: u32) -> S::InputAddr {
        let ls = self.geometry.level_size(level);
        S::with_addr_bits(a, S::addr_bits(a) & !(ls - 1))
    }

    /// The leaf descriptor for `pa` with protections `p` at `level`: a
    /// block above the last level, a page at it.
    fn leaf_at_level(&self, pa: SupervisorPhysAddr, p: Protection, level: u32) -> Pte {
        let device = p.contains(Protection::DEVICE);
        if level + 1 < self.geometry.levels() {
            self.format.make_leaf_block::<S>(pa, p, device)
        } else {
            self.format.make_leaf_page::<S>(pa, p, device)
        }
    }

    /* Descriptor update. */

    /// Writes `value` into slot `idx` of table `t` and performs the TLB
    /// maintenance the update kind requires for the translation range
    /// `[a, a + size)` (`a` aligned to `size`).
    ///
    /// With the MMU off this is a plain store. With it on, `Update` and
    /// `Remove` run the break-before-make sequence: fault the slot,
    /// invalidate, then publish the final value and invalidate again so a
    /// concurrent hardware walker can never cache a blend of the old and
    /// new descriptors. `Install` needs only the trailing half.
    fn write_pte_and_sync(
        &self,
        kind: UpdateKind,
        a: S::InputAddr,
        size: u64,
        t: *mut u64,
        idx: usize,
        value: Pte,
    ) {
        if !self.cpu.mmu_enabled() {
            self.write_entry(t, idx, value);
            return;
        }

        if matches!(kind, UpdateKind::Update | UpdateKind::Remove) {
            // The break.
            self.write_entry(t, idx, Pte::FAULT);
            S::invalidate_range(&self.cpu, self.geometry.granule_size(), a, size);
        }

        // The make (or the trailing FAULT for a removal).
        self.write_entry(t, idx, value);
        S::invalidate_range(&self.cpu, self.geometry.granule_size(), a, size);
    }

    /// Splits the block in slot `idx` of `t` at `level` into a child table
    /// of next-level leaves covering the same range with the same
    /// attributes. No-op success if the slot does not hold a block.
    /// `a` must be aligned to the block being split.
    fn split_block(&mut self, a: S::InputAddr, t: *mut u64, idx: usize, level: u32) -> Result<()> {
        let entry = self.read_entry(t, idx);
        if !entry.is_block() {
            return Ok(());
        }

        let ls = self.geometry.level_size(level);
        if S::addr_bits(a) & (ls - 1) != 0 {
            return Err(Error::MisalignedAddress);
        }

        let table_pa = self.alloc_table()?;
        let child_t = self.table_ptr(table_pa);

        let block_pa = self.format.pte_to_phys(entry);
        let attrs = entry.bits() & self.format.attr_field_mask();
        let sub_sz = self.geometry.level_size(level + 1);

        for i in 0..self.geometry.entries_per_table() {
            let child_pa = RawAddr::supervisor(block_pa.bits() + sub_sz * i as u64);
            let leaf = if level + 2 < self.geometry.levels() {
                self.format.make_leaf_block_attr(child_pa, attrs)
            } else {
                self.format.make_leaf_page_attr(child_pa, attrs)
            };
            self.write_entry(child_t, i, leaf);
        }

        // Publish the child table's contents before linking it.
        self.cpu.dmb_ishst();

        // Replacing a block with a table is a valid-to-valid transition.
        self.write_pte_and_sync(
            UpdateKind::Update,
            a,
            ls,
            t,
            idx,
            self.format.make_table(table_pa),
        );

        Ok(())
    }

    /// Installs one leaf mapping `a -> pa` at `leaf_level`, growing
    /// intermediate tables on demand. The target slot (and every slot on
    /// the way that is not already a table) must be FAULT.
    fn map_one(
        &mut self,
        a: S::InputAddr,
        pa: SupervisorPhysAddr,
        p: Protection,
        leaf_level: u32,
    ) -> Result<()> {
        let mut t = self.table_ptr(self.root);

        for level in 0..leaf_level {
            let idx = self.geometry.index_at(S::addr_bits(a), level);
            let entry = self.read_entry(t, idx);

            if !entry.is_fault() {
                // Overlaps an existing mapping unless it is a table.
                if !self.entry_is_table(level, entry) {
                    return Err(Error::MappingOverlap);
                }
                t = self.table_ptr(self.format.pte_to_phys(entry));
                continue;
            }

            // FAULT above the leaf level; link in a fresh table. This is a
            // FAULT-to-valid transition, so `alloc_table`'s barrier is all
            // the synchronization it needs.
            let child = self.alloc_table()?;
            self.write_entry(t, idx, self.format.make_table(child));
            t = self.table_ptr(child);
        }

        let idx = self.geometry.index_at(S::addr_bits(a), leaf_level);
        if !self.read_entry(t, idx).is_fault() {
            return Err(Error::MappingOverlap);
        }

        let pte = self.leaf_at_level(pa, p, leaf_level);
        self.write_pte_and_sync(
            UpdateKind::Install,
            self.addr_at_level(a, leaf_level),
            self.geometry.level_size(leaf_level),
            t,
            idx,
            pte,
        );

        Ok(())
    }

    /// Removes the translation covering `a` at `leaf_level`. A leaf there
    /// is cleared to FAULT; a table there is detached and its whole subtree
    /// freed. FAULT anywhere on the way means there is nothing to unmap.
    fn unmap_one(&mut self, a: S::InputAddr, leaf_level: u32) -> Result<()> {
        let mut t = self.table_ptr(self.root);

        for level in 0..leaf_level {
            let idx = self.geometry.index_at(S::addr_bits(a), level);
            let entry = self.read_entry(t, idx);

            if entry.is_fault() {
                return Ok(());
            }

            // Break up a block if the walk has to continue below it.
            self.split_block(self.addr_at_level(a, level), t, idx, level)?;

            let entry = self.read_entry(t, idx);
            // Expect a table after the split; checked only to be safe.
            if !self.entry_is_table(level, entry) {
                return Ok(());
            }
            t = self.table_ptr(self.format.pte_to_phys(entry));
        }

        let idx = self.geometry.index_at(S::addr_bits(a), leaf_level);
        let entry = self.read_entry(t, idx);
        if entry.is_fault() {
            return Ok(());
        }

        let a = self.addr_at_level(a, leaf_level);
        let size = self.geometry.level_size(leaf_level);
        if self.entry_is_table(leaf_level, entry) {
            // The whole subtree is covered; detach it, then free it. The
            // slot is FAULT and the TLB clean before the pages go back to
            // the pool.
            let child = self.format.pte_to_phys(entry);
            self.write_pte_and_sync(UpdateKind::Remove, a, size, t, idx, Pte::FAULT);
            self.free_subtree(child, leaf_level + 1);
        } else {
            self.write_pte_and_sync(UpdateKind::Remove, a, size, t, idx, Pte::FAULT);
        }

        Ok(())
    }

    /// Re-encodes the protection of the translation covering `a` at
    /// `leaf_level`, preserving the mapped physical address. A table at
    /// `leaf_level` means the region is mapped at finer granularity; every
    /// reachable leaf below it is updated instead.
    fn protect_one(&mut self, a: S::InputAddr, p: Protection, leaf_level: u32) -> Result<()> {
        let mut t = self.table_ptr(self.root);

        for level in 0..leaf_level {
            let idx = self.geometry.index_at(S::addr_bits(a), level);
            let entry = self.read_entry(t, idx);

            // Nothing mapped here; nothing to protect.
            if entry.is_fault() {
                return Err(Error::NotMapped);
            }

            self.split_block(self.addr_at_level(a, level), t, idx, level)?;

            let entry = self.read_entry(t, idx);
            // Expect a table after the split; checked only to be safe.
            if !self.entry_is_table(level, entry) {
                return Err(Error::LeafEntryNotTable);
            }
            t = self.table_ptr(self.format.pte_to_phys(entry));
        }

        let idx = self.geometry.index_at(S::addr_bits(a), leaf_level);
        let entry = self.read_entry(t, idx);
        if entry.is_fault() {
            return Err(Error::NotMapped);
        }

        let pa = self.format.pte_to_phys(entry);
        if self.entry_is_table(leaf_level, entry) {
            // Mapped at finer granularity than requested; update every
            // leaf in the subtree at its own level.
            self.protect_subtree(self.addr_at_level(a, leaf_level), pa, leaf_level + 1, p);
        } else {
            let value = self.leaf_at_level(pa, p, leaf_level);
            self.write_pte_and_sync(
                UpdateKind::Update,
                self.addr_at_level(a, leaf_level),
                self.geometry.level_size(leaf_level),
                t,
                idx,
                value,
            );
        }

        Ok(())
    }

    /// Depth-first post-order release of the subtree rooted at `table_pa`.
    /// The caller has already faulted (and, with the MMU on, invalidated)
    /// the parent slot, so nothing reaches these pages anymore.
    fn free_subtree(&self, table_pa: SupervisorPhysAddr, level: u32) {
        let t = self.table_ptr(table_pa);

        for i in 0..self.geometry.entries_per_table() {
            let entry = self.read_entry(t, i);
            if entry.is_fault() {
                continue;
            }
            if self.entry_is_table(level, entry) {
                self.free_subtree(self.format.pte_to_phys(entry), level + 1);
            }
            self.write_entry(t, i, Pte::FAULT);
        }

        self.pool.free_page(table_pa);
    }

    /// Updates the protection of every mapped leaf in the subtree rooted at
    /// `table_pa`. Entry `i` of a table at `level` translates
    /// `a + i * level_size(level)`, so `a` must be aligned to
    /// `level_size(level)` on entry; the recursion preserves that.
    fn protect_subtree(
        &self,
        a: S::InputAddr,
        table_pa: SupervisorPhysAddr,
        level: u32,
        p: Protection,
    ) {
        let t = self.table_ptr(table_pa);
        let stride = self.geometry.level_size(level);

        for i in 0..self.geometry.entries_per_table() {
            let entry = self.read_entry(t, i);
            if entry.is_fault() {
                continue;
            }

            let at = S::with_addr_bits(a, S::addr_bits(a) + stride * i as u64);
            let pa = self.format.pte_to_phys(entry);

            if self.entry_is_table(level, entry) {
                self.protect_subtree(at, pa, level + 1, p);
            } else {
                let value = self.leaf_at_level(pa, p, level);
                self.write_pte_and_sync(UpdateKind::Update, at, stride, t, i, value);
            }
        }
    }
}
