//! Mapping from program counters to instruction indices.
//!
//! Source maps have one entry per instruction, while the EVM reports the byte
//! offset of the executing instruction. The two numbering schemes diverge at
//! every `PUSHn`, whose immediate bytes are part of a single instruction.

use alloy_primitives::hex;
use revm_bytecode::opcode::OpCode;

/// The bytecode a contract is compiled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BytecodeKind {
    /// Code run by the creation transaction.
    Creation,
    /// Code stored at the contract's address.
    Runtime,
}

/// An error that occurs when decoding bytecode.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
    /// The bytecode is not valid hex.
    #[error("invalid hex in {kind} bytecode")]
    InvalidHex {
        /// The bytecode that failed to decode.
        kind: BytecodeKind,
        /// The decoding error.
        source: hex::FromHexError,
    },
}

/// Maps the byte offset of every instruction in a bytecode to its index in
/// the decoded instruction stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionIndex {
    /// Instruction index per byte offset; `None` for push immediates.
    by_offset: Vec<Option<u32>>,
    instruction_count: u32,
}

impl InstructionIndex {
    /// Builds the index by scanning the bytecode left to right.
    ///
    /// A push whose immediate runs past the end of the code, as happens in
    /// trailing metadata, ends the scan.
    pub fn from_bytecode(code: &[u8]) -> Self {
        let mut by_offset = vec![None; code.len()];
        let mut instruction_count = 0u32;

        let mut offset = 0;
        while let Some(&byte) = code.get(offset) {
            if let Some(slot) = by_offset.get_mut(offset) {
                *slot = Some(instruction_count);
            }
            instruction_count += 1;

            offset += 1 + push_size(byte);
        }

        Self {
            by_offset,
            instruction_count,
        }
    }

    /// Returns the instruction index of the instruction starting at the
    /// program counter, if any.
    pub fn get(&self, pc: usize) -> Option<u32> {
        self.by_offset.get(pc).copied().flatten()
    }

    /// Number of instructions in the bytecode.
    pub fn instruction_count(&self) -> usize {
        self.instruction_count as usize
    }

    /// Length of the bytecode in bytes.
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Whether the bytecode is empty.
    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

/// Number of immediate bytes following the opcode. Only `PUSHn` carries
/// immediates in the instruction numbering used by source maps.
fn push_size(byte: u8) -> usize {
    OpCode::new(byte)
        .filter(|opcode| opcode.is_push())
        .map_or(0, |opcode| usize::from(opcode.info().immediate_size()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_immediates_are_skipped() {
        // PUSH1 0x80 PUSH1 0x40 MSTORE PUSH0 PUSH4 0xdeadbeef STOP
        let code = [
            0x60, 0x80, 0x60, 0x40, 0x52, 0x5f, 0x63, 0xde, 0xad, 0xbe, 0xef, 0x00,
        ];
        let index = InstructionIndex::from_bytecode(&code);

        assert_eq!(index.instruction_count(), 6);
        assert_eq!(index.get(0), Some(0));
        assert_eq!(index.get(1), None);
        assert_eq!(index.get(2), Some(1));
        assert_eq!(index.get(4), Some(2));
        assert_eq!(index.get(5), Some(3));
        assert_eq!(index.get(6), Some(4));
        assert_eq!(index.get(7), None);
        assert_eq!(index.get(10), None);
        assert_eq!(index.get(11), Some(5));
        assert_eq!(index.get(12), None);
    }

    #[test]
    fn monotonic_and_only_at_instruction_boundaries() {
        let code: Vec<u8> = (0..=u8::MAX).cycle().take(2048).collect();
        let index = InstructionIndex::from_bytecode(&code);

        let mut previous = None;
        let mut pc = 0;
        while pc < code.len() {
            let instruction = index.get(pc).expect("instruction boundary");
            if let Some(previous) = previous {
                assert_eq!(instruction, previous + 1);
            }
            previous = Some(instruction);

            let size = push_size(code[pc]);
            for immediate in pc + 1..(pc + 1 + size).min(code.len()) {
                assert_eq!(index.get(immediate), None);
            }
            pc += 1 + size;
        }

        assert_eq!(
            index.instruction_count(),
            previous.map_or(0, |previous| previous as usize + 1)
        );
    }

    #[test]
    fn truncated_push_at_end() {
        // PUSH32 with only two immediate bytes
        let index = InstructionIndex::from_bytecode(&[0x00, 0x7f, 0x01, 0x02]);

        assert_eq!(index.instruction_count(), 2);
        assert_eq!(index.get(1), Some(1));
        assert_eq!(index.get(3), None);
    }
}
