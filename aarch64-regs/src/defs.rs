// SPDX-FileCopyrightText: 2023 Rivos Inc.
//
// SPDX-License-Identifier: Apache-2.0

use tock_registers::register_bitfields;

// System control register for EL2.
register_bitfields![u64,
    pub sctlr_el2 [
        // MMU enable for the EL2&0 translation regime.
        m OFFSET(0) NUMBITS(1) [],
        // Alignment check enable.
        a OFFSET(1) NUMBITS(1) [],
        // Data cacheability control.
        c OFFSET(2) NUMBITS(1) [],
        // SP alignment check enable.
        sa OFFSET(3) NUMBITS(1) [],
        // Instruction cacheability control.
        i OFFSET(12) NUMBITS(1) [],
        // Write permission implies XN.
        wxn OFFSET(19) NUMBITS(1) [],
        // Exception endianness.
        ee OFFSET(25) NUMBITS(1) [],
    ]
];

// Translation control register for EL2, When ELIsInHost (VHE).
register_bitfields![u64,
    pub tcr_el2 [
        // Size offset of the TTBR0_EL2 region: region is 2^(64-t0sz) bytes.
        t0sz OFFSET(0) NUMBITS(6) [],
        // TTBR0_EL2 walks disabled.
        epd0 OFFSET(7) NUMBITS(1) [],
        // Inner cacheability for TTBR0 table walks.
        irgn0 OFFSET(8) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Outer cacheability for TTBR0 table walks.
        orgn0 OFFSET(10) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Shareability for TTBR0 table walks.
        sh0 OFFSET(12) NUMBITS(2) [
            NonShareable = 0,
            OuterShareable = 2,
            InnerShareable = 3,
        ],
        // TTBR0_EL2 granule size.
        tg0 OFFSET(14) NUMBITS(2) [
            Granule4k = 0,
            Granule64k = 1,
            Granule16k = 2,
        ],
        // Size offset of the TTBR1_EL2 region.
        t1sz OFFSET(16) NUMBITS(6) [],
        // ASID selector (TTBR0 vs TTBR1).
        a1 OFFSET(22) NUMBITS(1) [],
        // TTBR1_EL2 walks disabled.
        epd1 OFFSET(23) NUMBITS(1) [],
        // Inner cacheability for TTBR1 table walks.
        irgn1 OFFSET(24) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Outer cacheability for TTBR1 table walks.
        orgn1 OFFSET(26) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Shareability for TTBR1 table walks.
        sh1 OFFSET(28) NUMBITS(2) [
            NonShareable = 0,
            OuterShareable = 2,
            InnerShareable = 3,
        ],
        // TTBR1_EL2 granule size. Note the encoding differs from tg0.
        tg1 OFFSET(30) NUMBITS(2) [
            Granule16k = 1,
            Granule4k = 2,
            Granule64k = 3,
        ],
        // Intermediate physical address size.
        ips OFFSET(32) NUMBITS(3) [
            Bits32 = 0,
            Bits36 = 1,
            Bits40 = 2,
            Bits42 = 3,
            Bits44 = 4,
            Bits48 = 5,
        ],
        // 16-bit ASIDs.
        as_ OFFSET(36) NUMBITS(1) [],
    ]
];

// Virtualization translation control register.
register_bitfields![u64,
    pub vtcr_el2 [
        // Size offset of the VTTBR_EL2 region: IPA space is 2^(64-t0sz).
        t0sz OFFSET(0) NUMBITS(6) [],
        // Starting level of the stage-2 walk; the encoding depends on the
        // granule, see D8.1.4.
        sl0 OFFSET(6) NUMBITS(2) [],
        // Inner cacheability for stage-2 table walks.
        irgn0 OFFSET(8) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Outer cacheability for stage-2 table walks.
        orgn0 OFFSET(10) NUMBITS(2) [
            NonCacheable = 0,
            WriteBackWriteAlloc = 1,
            WriteThrough = 2,
            WriteBackNoWriteAlloc = 3,
        ],
        // Shareability for stage-2 table walks.
        sh0 OFFSET(12) NUMBITS(2) [
            NonShareable = 0,
            OuterShareable = 2,
            InnerShareable = 3,
        ],
        // Stage-2 granule size.
        tg0 OFFSET(14) NUMBITS(2) [
            Granule4k = 0,
            Granule64k = 1,
            Granule16k = 2,
        ],
        // Physical address size of the stage-2 output.
        ps OFFSET(16) NUMBITS(3) [
            Bits32 = 0,
            Bits36 = 1,
            Bits40 = 2,
            Bits42 = 3,
            Bits44 = 4,
            Bits48 = 5,
        ],
        // 16-bit VMIDs.
        vs OFFSET(19) NUMBITS(1) [],
    ]
];

// Memory attribute indirection register for EL2. AttrIndx in a stage-1
// descriptor selects one of the eight attribute bytes.
register_bitfields![u64,
    pub mair_el2 [
        attr0 OFFSET(0) NUMBITS(8) [],
        attr1 OFFSET(8) NUMBITS(8) [],
        attr2 OFFSET(16) NUMBITS(8) [],
        attr3 OFFSET(24) NUMBITS(8) [],
        attr4 OFFSET(32) NUMBITS(8) [],
        attr5 OFFSET(40) NUMBITS(8) [],
        attr6 OFFSET(48) NUMBITS(8) [],
        attr7 OFFSET(56) NUMBITS(8) [],
    ]
];

// Translation table base registers for the EL2&0 regime.
register_bitfields![u64,
    pub ttbr0_el2 [
        // Common-not-private.
        cnp OFFSET(0) NUMBITS(1) [],
        // Table base address, bits [47:1] of the PA.
        baddr OFFSET(1) NUMBITS(47) [],
        // ASID tagging stage-1 TLB entries from this base.
        asid OFFSET(48) NUMBITS(16) [],
    ]
];

register_bitfields![u64,
    pub ttbr1_el2 [
        cnp OFFSET(0) NUMBITS(1) [],
        baddr OFFSET(1) NUMBITS(47) [],
        asid OFFSET(48) NUMBITS(16) [],
    ]
];

// Virtualization translation table base register.
register_bitfields![u64,
    pub vttbr_el2 [
        cnp OFFSET(0) NUMBITS(1) [],
        baddr OFFSET(1) NUMBITS(47) [],
        // VMID tagging stage-2 TLB entries.
        vmid OFFSET(48) NUMBITS(16) [],
    ]
];

// Memory model feature register 0.
register_bitfields![u64,
    pub id_aa64mmfr0_el1 [
        // Supported physical address range.
        pa_range OFFSET(0) NUMBITS(4) [
            Bits32 = 0,
            Bits36 = 1,
            Bits40 = 2,
            Bits42 = 3,
            Bits44 = 4,
            Bits48 = 5,
            Bits52 = 6,
            Bits56 = 7,
        ],
        // Number of ASID bits.
        asid_bits OFFSET(4) NUMBITS(4) [
            Asid8 = 0,
            Asid16 = 2,
        ],
        // 16KB granule support for stage 1.
        t_gran16 OFFSET(20) NUMBITS(4) [
            NotSupported = 0,
            Supported = 1,
            LargePa52Bits = 2,
        ],
        // 64KB granule support for stage 1.
        t_gran64 OFFSET(24) NUMBITS(4) [
            Supported = 0,
            NotSupported = 0xf,
        ],
        // 4KB granule support for stage 1.
        t_gran4 OFFSET(28) NUMBITS(4) [
            Supported = 0,
            LargePa52Bits = 1,
            NotSupported = 0xf,
        ],
        // 16KB granule support for stage 2; 0 defers to t_gran16.
        t_gran16_2 OFFSET(32) NUMBITS(4) [
            AsStage1 = 0,
            NotSupported = 1,
            Supported = 2,
            LargePa52Bits = 3,
        ],
        // 64KB granule support for stage 2; 0 defers to t_gran64.
        t_gran64_2 OFFSET(36) NUMBITS(4) [
            AsStage1 = 0,
            NotSupported = 1,
            Supported = 2,
        ],
        // 4KB granule support for stage 2; 0 defers to t_gran4.
        t_gran4_2 OFFSET(40) NUMBITS(4) [
            AsStage1 = 0,
            NotSupported = 1,
            Supported = 2,
            LargePa52Bits = 3,
        ],
    ]
];

// Memory model feature register 1.
register_bitfields![u64,
    pub id_aa64mmfr1_el1 [
        // Hardware Access flag and Dirty state updates.
        hafdbs OFFSET(0) NUMBITS(4) [],
        // Number of VMID bits.
        vmid_bits OFFSET(4) NUMBITS(4) [
            Vmid8 = 0,
            Vmid16 = 2,
        ],
        // Virtualization Host Extensions.
        vh OFFSET(8) NUMBITS(4) [
            NotSupported = 0,
            Supported = 1,
        ],
    ]
];

// Memory model feature register 2.
register_bitfields![u64,
    pub id_aa64mmfr2_el1 [
        // Small translation tables: support for SL0 == 0b11.
        st OFFSET(28) NUMBITS(4) [
            NotSupported = 0,
            Supported = 1,
        ],
    ]
];
