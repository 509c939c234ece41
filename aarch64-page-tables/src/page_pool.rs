// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! The allocator contract for translation-table pages, and a simple
//! free-list provider for early boot.

use spin::Mutex;

use aarch64_pages::{RawAddr, SupervisorPhysAddr};

use crate::direct_map::DirectMap;

/// Provider of the granule-sized pages that back translation tables.
///
/// `alloc_page` must return a granule-aligned page whose bytes are all
/// zero, i.e. a table whose every descriptor is already FAULT. The engine
/// publishes the page with a `DMB ISHST` before linking it; no other
/// ordering is assumed of the provider.
pub trait PagePool {
    /// Allocates one zero-filled, granule-aligned page, or `None` on
    /// exhaustion.
    fn alloc_page(&self) -> Option<SupervisorPhysAddr>;

    /// Returns a page previously obtained from `alloc_page`.
    fn free_page(&self, page: SupervisorPhysAddr);
}

impl<P: PagePool> PagePool for &P {
    fn alloc_page(&self) -> Option<SupervisorPhysAddr> {
        (**self).alloc_page()
    }

    fn free_page(&self, page: SupervisorPhysAddr) {
        (**self).free_page(page)
    }
}

struct FreeList {
    head: Option<u64>,
    free: usize,
}

/// A pool of granule-sized pages kept on a free list threaded through the
/// pages themselves: each free page stores the address of the next one in
/// its first word, so the pool needs no storage of its own. Pages are
/// zero-filled on allocation, not on free.
pub struct FreePagePool<D: DirectMap> {
    inner: Mutex<FreeList>,
    dmap: D,
    granule_size: u64,
}

impl<D: DirectMap> FreePagePool<D> {
    /// Creates a pool owning the physical region `[base, base + size)`,
    /// split into `granule_size` pages. A partial trailing page is ignored.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that the region is unused by anything else
    /// and stays owned by this pool (and by the tables it feeds) for the
    /// pool's lifetime, and that `dmap` yields valid pointers for it. The
    /// region must not contain physical address zero, which terminates the
    /// free list.
    pub unsafe fn new(
        base: SupervisorPhysAddr,
        size: u64,
        granule_size: u64,
        dmap: D,
    ) -> Self {
        let pool = Self {
            inner: Mutex::new(FreeList {
                head: None,
                free: 0,
            }),
            dmap,
            granule_size,
        };
        let base = base.align_up(granule_size);
        let mut pa = base;
        while pa.bits() + granule_size <= base.bits() + size {
            pool.free_page(pa);
            pa = match pa.checked_increment(granule_size) {
                Some(next) => next,
                None => break,
            };
        }
        pool
    }

    /// Number of pages currently on the free list.
    pub fn free_pages(&self) -> usize {
        self.inner.lock().free
    }
}

impl<D: DirectMap> PagePool for FreePagePool<D> {
    fn alloc_page(&self) -> Option<SupervisorPhysAddr> {
        let mut list = self.inner.lock();
        let pa = list.head?;
        let ptr = self.dmap.pa_to_table(RawAddr::supervisor(pa));
        // Safety: pages on the free list are owned by the pool and mapped
        // by `dmap`; the first word holds the next link.
        unsafe {
            let next = core::ptr::read_volatile(ptr);
            list.head = if next == 0 { None } else { Some(next) };
            core::ptr::write_bytes(ptr as *mut u8, 0, self.granule_size as usize);
        }
        list.free -= 1;
        Some(RawAddr::supervisor(pa))
    }

    fn free_page(&self, page: SupervisorPhysAddr) {
        let mut list = self.inner.lock();
        let ptr = self.dmap.pa_to_table(page);
        // Safety: the page is being returned to the pool, which now owns
        // it; storing the link only needs its first word.
        unsafe {
            core::ptr::write_volatile(ptr, list.head.unwrap_or(0));
        }
        list.head = Some(page.bits());
        list.free += 1;
    }
}
