//! x86-64 opcodes and the per-instruction data record.

use smallvec::SmallVec;

use crate::entities::BlockId;
use crate::operand::MirOperand;

/// Condition codes, numbered to match the x86 `Jcc`/`SETcc` encoding order
/// so `cc as u8` is the instruction's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConditionCode {
    O = 0,
    No = 1,
    B = 2,
    Nb = 3,
    E = 4,
    Ne = 5,
    Be = 6,
    Nbe = 7,
    S = 8,
    Ns = 9,
    P = 10,
    Np = 11,
    L = 12,
    Nl = 13,
    Le = 14,
    Nle = 15,
}

impl ConditionCode {
    pub const COUNT: usize = 16;

    pub const ALL: [ConditionCode; 16] = [
        ConditionCode::O,
        ConditionCode::No,
        ConditionCode::B,
        ConditionCode::Nb,
        ConditionCode::E,
        ConditionCode::Ne,
        ConditionCode::Be,
        ConditionCode::Nbe,
        ConditionCode::S,
        ConditionCode::Ns,
        ConditionCode::P,
        ConditionCode::Np,
        ConditionCode::L,
        ConditionCode::Nl,
        ConditionCode::Le,
        ConditionCode::Nle,
    ];

    /// Toggles the low bit: every code in this table is paired with its
    /// negation one slot away.
    pub fn invert(self) -> ConditionCode {
        ConditionCode::ALL[self as usize ^ 1]
    }

    /// The code that tests the same relation with its operands swapped.
    pub fn swap_operands(self) -> ConditionCode {
        use ConditionCode::*;
        match self {
            O => No,
            No => O,
            B => Nbe,
            Nb => Be,
            E => E,
            Ne => Ne,
            Be => Nb,
            Nbe => B,
            S => Ns,
            Ns => S,
            P => P,
            Np => Np,
            L => Nle,
            Nl => Le,
            Le => Nl,
            Nle => L,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Ret,
    Cmp,
    Test,
    Jmp,
    Phi,
    Mov,
    MovSx,
    MovZx,
    IMul,
    IDiv,
    Div,
    Add,
    Sub,
    Lea,
    Xor,
    And,
    Or,
    Sar,
    Shr,
    Shl,
    Call,
    Push,
    Pop,
    Cdq,
    Cqo,
    SetCc(ConditionCode),
    Jcc(ConditionCode),
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Ret | Opcode::Jmp | Opcode::Jcc(_))
    }

    /// `dst, src` two-operand instructions whose first operand is both read
    /// and written (the common x86-64 destructive two-address shape).
    pub fn dst_is_also_use(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::IMul
                | Opcode::Xor
                | Opcode::And
                | Opcode::Or
                | Opcode::Sar
                | Opcode::Shr
                | Opcode::Shl
        )
    }
}

#[derive(Debug, Clone)]
pub struct MirInstruction {
    pub opcode: Opcode,
    pub operands: SmallVec<[MirOperand; 2]>,
    pub block: BlockId,
}

impl MirInstruction {
    pub fn is_move(&self) -> bool {
        matches!(self.opcode, Opcode::Mov)
            && matches!(self.operands[0], MirOperand::Register(_))
            && matches!(self.operands[1], MirOperand::Register(_))
    }

    pub fn jump_target(&self) -> Option<BlockId> {
        match self.opcode {
            Opcode::Jmp | Opcode::Jcc(_) => match self.operands.last() {
                Some(MirOperand::BasicBlock(b)) => Some(*b),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConditionCode::O, ConditionCode::No)]
    #[case(ConditionCode::B, ConditionCode::Nb)]
    #[case(ConditionCode::E, ConditionCode::Ne)]
    #[case(ConditionCode::Be, ConditionCode::Nbe)]
    #[case(ConditionCode::S, ConditionCode::Ns)]
    #[case(ConditionCode::P, ConditionCode::Np)]
    #[case(ConditionCode::L, ConditionCode::Nl)]
    #[case(ConditionCode::Le, ConditionCode::Nle)]
    fn invert_pairs_each_code_with_its_negation(#[case] cc: ConditionCode, #[case] negated: ConditionCode) {
        assert_eq!(cc.invert(), negated);
        assert_eq!(negated.invert(), cc);
    }

    #[test]
    fn invert_is_an_involution_over_the_whole_table() {
        for cc in ConditionCode::ALL {
            assert_eq!(cc.invert().invert(), cc);
        }
    }

    #[test]
    fn swap_operands_is_an_involution_over_the_whole_table() {
        for cc in ConditionCode::ALL {
            assert_eq!(cc.swap_operands().swap_operands(), cc);
        }
    }

    #[rstest]
    #[case(ConditionCode::E, ConditionCode::E)]
    #[case(ConditionCode::Ne, ConditionCode::Ne)]
    #[case(ConditionCode::P, ConditionCode::P)]
    #[case(ConditionCode::Np, ConditionCode::Np)]
    fn swap_operands_leaves_the_equality_and_parity_codes_fixed(#[case] cc: ConditionCode, #[case] expected: ConditionCode) {
        assert_eq!(cc.swap_operands(), expected);
    }

    #[rstest]
    #[case(Opcode::Add)]
    #[case(Opcode::Sub)]
    #[case(Opcode::IMul)]
    #[case(Opcode::Xor)]
    #[case(Opcode::And)]
    #[case(Opcode::Or)]
    #[case(Opcode::Sar)]
    #[case(Opcode::Shr)]
    #[case(Opcode::Shl)]
    fn two_address_destructive_ops_read_and_write_their_first_operand(#[case] op: Opcode) {
        assert!(op.dst_is_also_use());
    }

    #[rstest]
    #[case(Opcode::Mov)]
    #[case(Opcode::Lea)]
    #[case(Opcode::Call)]
    fn non_destructive_ops_do_not_reuse_their_destination_as_a_source(#[case] op: Opcode) {
        assert!(!op.dst_is_also_use());
    }
}
