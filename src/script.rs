//! The Bitcoin Cash instruction set and its authentication protocol.
//!
//! An [`AuthenticationProgram`] is evaluated in up to three passes: the
//! unlocking bytecode against an empty stack, the locking bytecode against
//! the unlocking result, and (for pay-to-script-hash outputs) the redeem
//! bytecode against the unlocking result minus its top item.

use std::sync::Arc;

use crate::{
    combinators,
    config::{ConsensusLimits, InstructionSetVersion, ScriptFlags, VmConfig},
    crypto::{Crypto, NativeCrypto},
    instruction::{self, Instruction},
    opcodes::Opcode,
    ops::{self, Environment, OpcodeTable},
    script_num::stack_item_is_truthy,
    state::ProgramState,
    tx::{AuthenticationProgram, SpendContext},
    vm::InstructionSet,
    Error, ScriptError,
};

/// Opcode table, flags and crypto provider for one Bitcoin Cash rule set.
#[derive(Clone)]
pub struct BchInstructionSet {
    flags: ScriptFlags,
    limits: ConsensusLimits,
    table: Box<OpcodeTable>,
    crypto: Arc<dyn Crypto>,
}

impl BchInstructionSet {
    /// An instruction set with the given flags, default limits and the
    /// native crypto provider.
    pub fn new(flags: ScriptFlags) -> Self {
        BchInstructionSet {
            flags,
            limits: ConsensusLimits::default(),
            table: ops::build_table(flags),
            crypto: Arc::new(NativeCrypto),
        }
    }

    pub fn from_version(version: InstructionSetVersion) -> Self {
        Self::new(version.flags())
    }

    pub fn from_config(config: &VmConfig) -> Self {
        Self::from_version(config.version).with_limits(config.limits)
    }

    pub fn with_limits(mut self, limits: ConsensusLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the hash and signature provider.
    pub fn with_crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn flags(&self) -> ScriptFlags {
        self.flags
    }

    pub fn limits(&self) -> &ConsensusLimits {
        &self.limits
    }

    fn environment(&self) -> Environment<'_> {
        Environment {
            flags: self.flags,
            limits: self.limits,
            crypto: self.crypto.as_ref(),
        }
    }

    /// Parses both bytecodes and runs the unlocking pass. Returns the parsed
    /// locking instructions alongside the unlocking result.
    fn evaluate_unlocking(
        &self,
        unlocking_bytecode: &[u8],
        locking_bytecode: &[u8],
        context: SpendContext,
        pass: &mut dyn FnMut(ProgramState) -> ProgramState,
    ) -> Result<(Vec<Instruction>, ProgramState), ProgramState> {
        let fail = |error| ProgramState::failed(error, Vec::new(), context);
        let maximum = self.limits.maximum_bytecode_length;

        if unlocking_bytecode.len() > maximum {
            return Err(fail(ScriptError::ExceededMaximumBytecodeLengthUnlocking));
        }
        let unlocking = instruction::parse(unlocking_bytecode);
        if instruction::is_malformed(&unlocking) {
            return Err(fail(ScriptError::MalformedUnlockingBytecode));
        }
        if locking_bytecode.len() > maximum {
            return Err(fail(ScriptError::ExceededMaximumBytecodeLengthLocking));
        }
        let locking = instruction::parse(locking_bytecode);
        if instruction::is_malformed(&locking) {
            return Err(fail(ScriptError::MalformedLockingBytecode));
        }
        if !instruction::is_push_only(&unlocking) {
            return Err(fail(ScriptError::RequiresPushOnly));
        }

        let (Some(unlocking), Some(locking)) = (
            instruction::into_well_formed(unlocking),
            instruction::into_well_formed(locking),
        ) else {
            return Err(fail(ScriptError::MalformedLockingBytecode));
        };

        let result = pass(ProgramState::new(unlocking, Vec::new(), context));
        log::debug!("unlocking pass finished: {:?}", result.error);
        if result.error.is_some() {
            return Err(result);
        }
        Ok((locking, result))
    }
}

impl core::fmt::Debug for BchInstructionSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BchInstructionSet")
            .field("flags", &self.flags)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for BchInstructionSet {
    fn default() -> Self {
        Self::from_version(InstructionSetVersion::default())
    }
}

impl InstructionSet for BchInstructionSet {
    type Program = AuthenticationProgram;
    type State = ProgramState;

    fn should_continue(&self, state: &ProgramState) -> bool {
        state.error.is_none() && state.ip < state.instructions.len()
    }

    fn current_opcode(&self, state: &ProgramState) -> Option<Opcode> {
        state.current_instruction().map(Instruction::opcode)
    }

    fn is_defined(&self, opcode: Opcode) -> bool {
        self.table[opcode.to_u8() as usize].is_some()
    }

    fn execute(&self, opcode: Opcode, state: ProgramState) -> ProgramState {
        log::trace!("ip {} {} (stack depth {})", state.ip, opcode, state.stack.len());
        match &self.table[opcode.to_u8() as usize] {
            Some(entry) => combinators::apply(entry, state, &self.environment()),
            None => self.undefined(state),
        }
    }

    fn undefined(&self, state: ProgramState) -> ProgramState {
        log::trace!("ip {} undefined opcode", state.ip);
        combinators::apply(&ops::UNDEFINED, state, &self.environment())
    }

    fn advance(&self, state: &mut ProgramState) {
        state.ip += 1;
    }

    fn evaluate(
        &self,
        program: &AuthenticationProgram,
        pass: &mut dyn FnMut(ProgramState) -> ProgramState,
    ) -> Result<ProgramState, Error> {
        let context = program.spend_context()?;
        let unlocking_bytecode = program.unlocking_bytecode()?;
        let locking_bytecode = program.locking_bytecode();

        let (locking, unlocking_result) =
            match self.evaluate_unlocking(unlocking_bytecode, locking_bytecode, context, pass) {
                Ok(evaluated) => evaluated,
                Err(failed) => return Ok(failed),
            };

        let is_p2sh = instruction::is_pay_to_script_hash(&locking);
        let locking_result = pass(ProgramState::new(
            locking,
            unlocking_result.stack.clone(),
            context,
        ));
        log::debug!("locking pass finished: {:?}", locking_result.error);
        if !is_p2sh || !passed(&locking_result) {
            return Ok(locking_result);
        }

        let mut redeem_stack = unlocking_result.stack;
        let redeem_bytecode = redeem_stack.pop().unwrap_or_default();
        if redeem_stack.is_empty() && instruction::is_witness_program(&redeem_bytecode) {
            log::debug!("witness program in P2SH redeem position, skipping redeem pass");
            return Ok(locking_result);
        }

        let Some(redeem) = instruction::into_well_formed(instruction::parse(&redeem_bytecode))
        else {
            let mut failed = locking_result;
            failed.error = Some(ScriptError::MalformedP2shBytecode);
            return Ok(failed);
        };
        let redeem_result = pass(ProgramState::new(redeem, redeem_stack, context));
        log::debug!("redeem pass finished: {:?}", redeem_result.error);
        Ok(redeem_result)
    }

    fn verify(&self, state: &ProgramState) -> Result<(), ScriptError> {
        if let Some(error) = state.error {
            return Err(error);
        }
        if !state.execution_stack.is_empty() {
            return Err(ScriptError::NonEmptyExecutionStack);
        }
        match state.stack.as_slice() {
            [top] if stack_item_is_truthy(top) => Ok(()),
            [_] => Err(ScriptError::UnsuccessfulEvaluation),
            _ => Err(ScriptError::RequiresCleanStack),
        }
    }
}

/// Whether a locking pass left a truthy top item without error.
fn passed(state: &ProgramState) -> bool {
    state.error.is_none()
        && state
            .stack
            .last()
            .is_some_and(|top| stack_item_is_truthy(top))
}
