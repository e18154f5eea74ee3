//! Program state threaded through each evaluation pass.

use std::sync::Arc;

use crate::{
    instruction::{self, Instruction},
    script_num,
    tx::SpendContext,
    ScriptError,
};

/// Everything one evaluation pass reads and writes.
///
/// Instructions are shared behind an [`Arc`] so recording every intermediate
/// state while debugging does not copy the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramState {
    pub instructions: Arc<[Instruction]>,
    pub ip: usize,
    pub stack: Vec<Vec<u8>>,
    pub alternate_stack: Vec<Vec<u8>>,
    /// One entry per open conditional; `false` marks an unexecuted branch.
    pub execution_stack: Vec<bool>,
    pub error: Option<ScriptError>,
    /// Index of the most recently executed `OP_CODESEPARATOR`.
    pub last_code_separator: Option<usize>,
    pub operation_count: usize,
    pub signature_operation_count: usize,
    /// Signing serializations (or data messages) checked by signature
    /// operations, in execution order.
    pub signed_messages: Vec<Vec<u8>>,
    pub context: SpendContext,
}

impl ProgramState {
    pub fn new(instructions: Vec<Instruction>, stack: Vec<Vec<u8>>, context: SpendContext) -> Self {
        ProgramState {
            instructions: instructions.into(),
            ip: 0,
            stack,
            alternate_stack: Vec::new(),
            execution_stack: Vec::new(),
            error: None,
            last_code_separator: None,
            operation_count: 0,
            signature_operation_count: 0,
            signed_messages: Vec::new(),
            context,
        }
    }

    /// A state that has already failed before any instruction ran.
    pub fn failed(error: ScriptError, stack: Vec<Vec<u8>>, context: SpendContext) -> Self {
        let mut state = ProgramState::new(Vec::new(), stack, context);
        state.error = Some(error);
        state
    }

    /// Records `error` unless an earlier one is already set.
    pub fn apply_error(&mut self, error: ScriptError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Whether every enclosing conditional branch is being executed.
    pub fn is_executing(&self) -> bool {
        self.execution_stack.iter().all(|branch| *branch)
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.instructions.get(self.ip)
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_some() || self.ip >= self.instructions.len()
    }

    /// Serialized bytecode following the last executed code separator.
    pub fn covered_bytecode(&self) -> Vec<u8> {
        let start = self.last_code_separator.map_or(0, |separator| separator + 1);
        instruction::serialize_instructions(self.instructions.get(start..).unwrap_or_default())
    }

    pub(crate) fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.stack.pop().ok_or(ScriptError::EmptyStack)
    }

    /// Borrows the item `depth` positions below the top (0 is the top).
    pub(crate) fn peek(&self, depth: usize) -> Result<&Vec<u8>, ScriptError> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|index| self.stack.get(index))
            .ok_or(ScriptError::EmptyStack)
    }

    pub(crate) fn require_depth(&self, depth: usize) -> Result<(), ScriptError> {
        if self.stack.len() < depth {
            Err(ScriptError::EmptyStack)
        } else {
            Ok(())
        }
    }

    /// Removes the top `count` items, returning them deepest first.
    pub(crate) fn pop_many(&mut self, count: usize) -> Result<Vec<Vec<u8>>, ScriptError> {
        self.require_depth(count)?;
        let start = self.stack.len() - count;
        Ok(self.stack.split_off(start))
    }

    pub(crate) fn pop_number(
        &mut self,
        require_minimal: bool,
        max_length: usize,
    ) -> Result<i64, ScriptError> {
        let item = self.pop()?;
        Ok(script_num::decode(&item, require_minimal, max_length)?)
    }

    pub(crate) fn push_number(&mut self, value: i64) {
        self.stack.push(script_num::encode(value));
    }

    pub(crate) fn push_bool(&mut self, value: bool) {
        self.stack.push(script_num::encode_bool(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::all;

    fn state_with_stack(stack: Vec<Vec<u8>>) -> ProgramState {
        ProgramState::new(Vec::new(), stack, SpendContext::default())
    }

    #[test]
    fn first_error_wins() {
        let mut state = state_with_stack(Vec::new());
        state.apply_error(ScriptError::EmptyStack);
        state.apply_error(ScriptError::FailedVerify);
        assert_eq!(state.error, Some(ScriptError::EmptyStack));
        assert!(state.is_complete());
    }

    #[test]
    fn execution_requires_every_branch() {
        let mut state = state_with_stack(Vec::new());
        assert!(state.is_executing());
        state.execution_stack = vec![true, false, true];
        assert!(!state.is_executing());
    }

    #[test]
    fn peek_and_pop_many() {
        let mut state = state_with_stack(vec![vec![1], vec![2], vec![3]]);
        assert_eq!(state.peek(0), Ok(&vec![3]));
        assert_eq!(state.peek(2), Ok(&vec![1]));
        assert_eq!(state.peek(3), Err(ScriptError::EmptyStack));

        assert_eq!(state.pop_many(2), Ok(vec![vec![2], vec![3]]));
        assert_eq!(state.pop_many(2), Err(ScriptError::EmptyStack));
        assert_eq!(state.stack, vec![vec![1]]);
    }

    #[test]
    fn covered_bytecode_starts_after_separator() {
        let instructions = vec![
            Instruction::Operation { opcode: all::OP_1 },
            Instruction::Operation {
                opcode: all::OP_CODESEPARATOR,
            },
            Instruction::Push {
                opcode: all::OP_PUSHBYTES_1,
                data: vec![0x42],
            },
        ];
        let mut state = ProgramState::new(instructions, Vec::new(), SpendContext::default());
        assert_eq!(state.covered_bytecode(), vec![0x51, 0xab, 0x01, 0x42]);
        state.last_code_separator = Some(1);
        assert_eq!(state.covered_bytecode(), vec![0x01, 0x42]);
    }

    #[test]
    fn pop_number_maps_codec_errors() {
        let mut state = state_with_stack(vec![vec![0x01, 0x00]]);
        assert_eq!(state.pop_number(true, 4), Err(ScriptError::InvalidScriptNumber));
        state.stack.push(vec![0x05]);
        assert_eq!(state.pop_number(true, 4), Ok(5));
    }
}
