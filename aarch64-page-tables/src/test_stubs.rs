// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test stubs: host-backed "physical" memory, a counting page pool, and a
//! CPU that records its maintenance sequence instead of executing it.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use aarch64_pages::{GuestPhysAddr, RawAddr, SupervisorPhysAddr, SupervisorVirtAddr};

use crate::cpu::CpuOps;
use crate::page_pool::PagePool;

/// Leaks a `pages * granule`-byte host region aligned to `granule` and
/// returns its base and size. Tests run with the identity direct map, so
/// the host pointer doubles as the physical address.
pub fn stub_backing_region(pages: usize, granule: u64) -> (SupervisorPhysAddr, u64) {
    let size = pages as u64 * granule;
    let backing = vec![0u8; (size + granule) as usize];
    let ptr = backing.as_ptr();
    let aligned = unsafe {
        // Not safe - just a test.
        ptr.add(ptr.align_offset(granule as usize))
    };
    // Leak the backing memory so the region stays valid for the test.
    std::mem::forget(backing);
    (RawAddr::supervisor(aligned as u64), size)
}

struct PoolInner {
    free: Vec<u64>,
    granule: u64,
    allocs: usize,
    frees: usize,
}

/// A `PagePool` over leaked host memory that counts allocations and frees,
/// for the no-leak properties.
#[derive(Clone)]
pub struct TestPagePool {
    inner: Rc<RefCell<PoolInner>>,
}

impl TestPagePool {
    pub fn new(pages: usize, granule: u64) -> Self {
        let (base, _) = stub_backing_region(pages, granule);
        let free = (0..pages as u64)
            .map(|i| base.bits() + i * granule)
            .collect();
        Self {
            inner: Rc::new(RefCell::new(PoolInner {
                free,
                granule,
                allocs: 0,
                frees: 0,
            })),
        }
    }

    pub fn alloc_count(&self) -> usize {
        self.inner.borrow().allocs
    }

    pub fn free_count(&self) -> usize {
        self.inner.borrow().frees
    }

    /// Pages handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        let inner = self.inner.borrow();
        inner.allocs - inner.frees
    }
}

impl PagePool for TestPagePool {
    fn alloc_page(&self) -> Option<SupervisorPhysAddr> {
        let mut inner = self.inner.borrow_mut();
        let pa = inner.free.pop()?;
        unsafe {
            // Not safe - just a test. Zero-fill per the pool contract.
            core::ptr::write_bytes(pa as *mut u8, 0, inner.granule as usize);
        }
        inner.allocs += 1;
        Some(RawAddr::supervisor(pa))
    }

    fn free_page(&self, page: SupervisorPhysAddr) {
        let mut inner = self.inner.borrow_mut();
        inner.free.push(page.bits());
        inner.frees += 1;
    }
}

/// One recorded CPU operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuEvent {
    DsbIshst,
    DsbIsh,
    DmbIshst,
    Isb,
    TlbiAllE2Is,
    TlbiVaE2Is { va: u64, asid: u16 },
    TlbiVmAllS12E1Is,
    TlbiIpaS2E1Is { ipa: u64 },
}

/// A `CpuOps` that logs every barrier and invalidation, with a settable
/// MMU flag, so tests can assert the exact break-before-make sequences.
#[derive(Clone)]
pub struct RecordingCpu {
    mmu_on: bool,
    events: Rc<RefCell<Vec<CpuEvent>>>,
}

impl RecordingCpu {
    pub fn new(mmu_on: bool) -> Self {
        Self {
            mmu_on,
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<CpuEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: CpuEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl CpuOps for RecordingCpu {
    fn mmu_enabled(&self) -> bool {
        self.mmu_on
    }

    fn dsb_ishst(&self) {
        self.push(CpuEvent::DsbIshst);
    }

    fn dsb_ish(&self) {
        self.push(CpuEvent::DsbIsh);
    }

    fn dmb_ishst(&self) {
        self.push(CpuEvent::DmbIshst);
    }

    fn isb(&self) {
        self.push(CpuEvent::Isb);
    }

    fn tlbi_alle2is(&self) {
        self.push(CpuEvent::TlbiAllE2Is);
    }

    fn tlbi_vae2is(&self, va: SupervisorVirtAddr, asid: u16) {
        self.push(CpuEvent::TlbiVaE2Is {
            va: va.bits(),
            asid,
        });
    }

    fn tlbi_vmalls12e1is(&self) {
        self.push(CpuEvent::TlbiVmAllS12E1Is);
    }

    fn tlbi_ipas2e1is(&self, ipa: GuestPhysAddr) {
        self.push(CpuEvent::TlbiIpaS2E1Is { ipa: ipa.bits() });
    }
}
