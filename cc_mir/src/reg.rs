//! Physical and virtual integer registers.
//!
//! A single `u32` ID space covers both: IDs below `FIRST_VIRTUAL_REGISTER`
//! name one of the 16 general-purpose x86-64 registers, everything at or
//! above it is a virtual register minted per-function. Keeping both kinds
//! in one ID space (rather than an enum over `Physical(HwReg) | Virtual(u32)`)
//! is what lets the register allocator's node table be a single dense array
//! indexed directly by `RegId`.

use std::fmt;

pub const FIRST_VIRTUAL_REGISTER: u32 = 1000;

/// The 16 integer GPRs, in `REX.B`-extension order. Aliases line up with
/// the Windows x64 calling convention names used throughout this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HwReg {
    A = 0,
    C = 1,
    D = 2,
    B = 3,
    Sp = 4,
    Bp = 5,
    Si = 6,
    Di = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

pub const NUM_HW_REGS: usize = 16;

/// Integer argument registers, in calling-convention order.
pub const ARG_REGS: [HwReg; 4] = [HwReg::C, HwReg::D, HwReg::R8, HwReg::R9];

/// Caller-saved registers: clobbered across any `call`.
pub const CALLER_SAVED_REGS: [HwReg; 7] =
    [HwReg::A, HwReg::C, HwReg::D, HwReg::R8, HwReg::R9, HwReg::R10, HwReg::R11];

/// Registers never handed to the allocator: the stack and frame pointers are
/// reserved for addressing, so only 14 of the 16 GPRs are allocatable (`K`
/// in the regalloc literature).
pub const NUM_ALLOCATABLE_REGS: usize = NUM_HW_REGS - 2;

impl HwReg {
    pub const ALL: [HwReg; NUM_HW_REGS] = [
        HwReg::A,
        HwReg::C,
        HwReg::D,
        HwReg::B,
        HwReg::Sp,
        HwReg::Bp,
        HwReg::Si,
        HwReg::Di,
        HwReg::R8,
        HwReg::R9,
        HwReg::R10,
        HwReg::R11,
        HwReg::R12,
        HwReg::R13,
        HwReg::R14,
        HwReg::R15,
    ];

    /// The 14 registers the allocator may assign a color from (everything
    /// but `Sp`/`Bp`).
    pub fn allocatable() -> impl Iterator<Item = HwReg> {
        HwReg::ALL.into_iter().filter(|r| !matches!(r, HwReg::Sp | HwReg::Bp))
    }

    pub fn id(self) -> RegId {
        RegId(self as u32)
    }

    pub fn name(self, ty: MirSize) -> &'static str {
        use HwReg::*;
        use MirSize::*;
        match (self, ty) {
            (A, Q) => "rax", (A, D) => "eax", (A, W) => "ax", (A, B) => "al",
            (C, Q) => "rcx", (C, D) => "ecx", (C, W) => "cx", (C, B) => "cl",
            (D, Q) => "rdx", (D, D) => "edx", (D, W) => "dx", (D, B) => "dl",
            (B, Q) => "rbx", (B, D) => "ebx", (B, W) => "bx", (B, B) => "bl",
            (Sp, Q) => "rsp", (Sp, D) => "esp", (Sp, W) => "sp", (Sp, B) => "spl",
            (Bp, Q) => "rbp", (Bp, D) => "ebp", (Bp, W) => "bp", (Bp, B) => "bpl",
            (Si, Q) => "rsi", (Si, D) => "esi", (Si, W) => "si", (Si, B) => "sil",
            (Di, Q) => "rdi", (Di, D) => "edi", (Di, W) => "di", (Di, B) => "dil",
            (R8, Q) => "r8", (R8, D) => "r8d", (R8, W) => "r8w", (R8, B) => "r8b",
            (R9, Q) => "r9", (R9, D) => "r9d", (R9, W) => "r9w", (R9, B) => "r9b",
            (R10, Q) => "r10", (R10, D) => "r10d", (R10, W) => "r10w", (R10, B) => "r10b",
            (R11, Q) => "r11", (R11, D) => "r11d", (R11, W) => "r11w", (R11, B) => "r11b",
            (R12, Q) => "r12", (R12, D) => "r12d", (R12, W) => "r12w", (R12, B) => "r12b",
            (R13, Q) => "r13", (R13, D) => "r13d", (R13, W) => "r13w", (R13, B) => "r13b",
            (R14, Q) => "r14", (R14, D) => "r14d", (R14, W) => "r14w", (R14, B) => "r14b",
            (R15, Q) => "r15", (R15, D) => "r15d", (R15, W) => "r15w", (R15, B) => "r15b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirSize {
    B,
    W,
    D,
    Q,
}

impl From<crate::types::MirType> for MirSize {
    fn from(ty: crate::types::MirType) -> Self {
        use crate::types::MirType;
        match ty {
            MirType::I8 => MirSize::B,
            MirType::I16 => MirSize::W,
            MirType::I32 | MirType::F32 => MirSize::D,
            MirType::I64 | MirType::F64 | MirType::Ptr => MirSize::Q,
            MirType::Void => MirSize::Q,
        }
    }
}

/// A register ID: physical if `< FIRST_VIRTUAL_REGISTER`, virtual otherwise.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(pub u32);

impl RegId {
    pub fn is_physical(self) -> bool {
        self.0 < FIRST_VIRTUAL_REGISTER
    }

    pub fn is_virtual(self) -> bool {
        !self.is_physical()
    }

    pub fn as_hw_reg(self) -> Option<HwReg> {
        self.is_physical().then(|| HwReg::ALL[self.0 as usize])
    }
}

impl fmt::Debug for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_hw_reg() {
            Some(hw) => write!(f, "{hw:?}"),
            None => write!(f, "vr{}", self.0 - FIRST_VIRTUAL_REGISTER),
        }
    }
}

pub fn is_arg_reg(reg: RegId) -> bool {
    ARG_REGS.iter().any(|&r| r.id() == reg)
}

pub fn arg_reg_index(reg: RegId) -> Option<usize> {
    ARG_REGS.iter().position(|&r| r.id() == reg)
}
