// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

#![no_std]
#![allow(missing_docs)]

//! Crate for handling AArch64 EL2 system registers.
//! defs - register field definitions (`tock-registers` bitfields)
//! sysreg - `mrs`/`msr` accessor types for each register
//! barrier - DSB/DMB/ISB barrier primitives

mod barrier;
mod defs;
mod sysreg;

pub use barrier::*;
pub use defs::*;
pub use sysreg::*;
