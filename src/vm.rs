//! Generic execution engine.
//!
//! The engine knows nothing about opcodes or transactions. It repeatedly
//! asks an [`InstructionSet`] for the opcode at the instruction pointer, runs
//! it and advances, until the instruction set says to stop. Program-level
//! setup (which bytecode runs first, how passes are chained) belongs to the
//! instruction set's [`evaluate`](InstructionSet::evaluate) hook.

use std::sync::Arc;

use bitcoin::{Transaction, TxOut};

use crate::{
    opcodes::Opcode,
    tx::{AuthenticationProgram, PrecomputedTransactionData},
    Error, ScriptError, ScriptFailure,
};

/// The protocol-specific half of a virtual machine.
pub trait InstructionSet {
    /// Input to a full, multi-pass evaluation.
    type Program;
    /// State threaded through a single pass.
    type State: Clone;

    /// Whether stepping should continue.
    fn should_continue(&self, state: &Self::State) -> bool;

    /// Opcode at the instruction pointer, if any remain.
    fn current_opcode(&self, state: &Self::State) -> Option<Opcode>;

    /// Whether `opcode` has an entry in this instruction set.
    fn is_defined(&self, opcode: Opcode) -> bool;

    /// Runs the operation mapped to `opcode`.
    fn execute(&self, opcode: Opcode, state: Self::State) -> Self::State;

    /// Runs the fallback operation for unmapped opcodes.
    fn undefined(&self, state: Self::State) -> Self::State;

    fn advance(&self, state: &mut Self::State);

    /// Sets up and chains the evaluation passes for `program`, running each
    /// one through `pass`.
    fn evaluate(
        &self,
        program: &Self::Program,
        pass: &mut dyn FnMut(Self::State) -> Self::State,
    ) -> Result<Self::State, Error>;

    /// Final acceptance test for the state produced by [`evaluate`](Self::evaluate).
    fn verify(&self, state: &Self::State) -> Result<(), ScriptError>;
}

/// Drives an [`InstructionSet`].
///
/// Every entry point clones its input once, so the caller's state is never
/// mutated and may be reused for independent evaluations.
#[derive(Debug, Clone)]
pub struct VirtualMachine<I> {
    instruction_set: I,
}

impl<I: InstructionSet> VirtualMachine<I> {
    pub fn new(instruction_set: I) -> Self {
        VirtualMachine { instruction_set }
    }

    pub fn instruction_set(&self) -> &I {
        &self.instruction_set
    }

    /// Executes a single instruction.
    pub fn step(&self, state: &I::State) -> I::State {
        self.step_owned(state.clone())
    }

    /// Runs `state` until the instruction set stops it.
    pub fn evaluate(&self, state: &I::State) -> I::State {
        self.run(state.clone())
    }

    /// Like [`evaluate`](Self::evaluate), but returns the state after every
    /// step, preceded by the initial state.
    pub fn debug(&self, state: &I::State) -> Vec<I::State> {
        let mut trace = vec![state.clone()];
        self.run_recording(state.clone(), &mut trace);
        trace
    }

    /// Evaluates every pass of `program`, returning the final state.
    pub fn evaluate_program(&self, program: &I::Program) -> Result<I::State, Error> {
        self.instruction_set
            .evaluate(program, &mut |state| self.run(state))
    }

    /// Evaluates `program`, returning the traces of all passes concatenated.
    pub fn debug_program(&self, program: &I::Program) -> Result<Vec<I::State>, Error> {
        let mut trace = Vec::new();
        let last = self.instruction_set.evaluate(program, &mut |state| {
            trace.push(state.clone());
            self.run_recording(state, &mut trace)
        })?;
        // Setup failures never reach a pass.
        if trace.is_empty() {
            trace.push(last);
        }
        Ok(trace)
    }

    /// Evaluates `program` and applies the instruction set's acceptance test.
    pub fn verify_program(&self, program: &I::Program) -> Result<(), ScriptFailure> {
        let state = self
            .evaluate_program(program)
            .map_err(ScriptFailure::from)?;
        self.instruction_set
            .verify(&state)
            .map_err(ScriptFailure::from)
    }

    fn step_owned(&self, mut state: I::State) -> I::State {
        let Some(opcode) = self.instruction_set.current_opcode(&state) else {
            return state;
        };
        state = if self.instruction_set.is_defined(opcode) {
            self.instruction_set.execute(opcode, state)
        } else {
            self.instruction_set.undefined(state)
        };
        self.instruction_set.advance(&mut state);
        state
    }

    fn run(&self, mut state: I::State) -> I::State {
        while self.instruction_set.should_continue(&state) {
            state = self.step_owned(state);
        }
        state
    }

    fn run_recording(&self, mut state: I::State, trace: &mut Vec<I::State>) -> I::State {
        while self.instruction_set.should_continue(&state) {
            state = self.step_owned(state);
            trace.push(state.clone());
        }
        state
    }
}

impl<I> VirtualMachine<I>
where
    I: InstructionSet<Program = AuthenticationProgram>,
{
    /// Verifies every input of `transaction`. `source_outputs[i]` is the
    /// output spent by input `i`.
    ///
    /// The transaction is copied and hashed once, then shared by every input.
    pub fn verify_transaction(
        &self,
        transaction: &Transaction,
        source_outputs: &[TxOut],
    ) -> Result<(), ScriptFailure> {
        if transaction.input.is_empty() {
            return Err(Error::EmptyInputs.into());
        }
        if transaction.output.is_empty() {
            return Err(Error::EmptyOutputs.into());
        }
        if source_outputs.len() != transaction.input.len() {
            return Err(Error::SourceOutputsMismatch.into());
        }
        let precomputed = PrecomputedTransactionData::new(transaction);
        let shared = Arc::new(transaction.clone());
        for (input_index, source_output) in source_outputs.iter().enumerate() {
            let program = AuthenticationProgram::for_input(
                Arc::clone(&shared),
                precomputed,
                input_index,
                source_output.clone(),
            );
            self.verify_program(&program).map_err(|failure| {
                log::debug!("input {input_index} failed verification: {failure}");
                failure
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts down from the starting value; opcode 0 decrements, opcode 1 is
    /// unmapped and halts with an error.
    struct Countdown;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Counter {
        program: Vec<u8>,
        ip: usize,
        value: u32,
        error: Option<ScriptError>,
    }

    impl InstructionSet for Countdown {
        type Program = Vec<u8>;
        type State = Counter;

        fn should_continue(&self, state: &Counter) -> bool {
            state.error.is_none() && state.ip < state.program.len()
        }

        fn current_opcode(&self, state: &Counter) -> Option<Opcode> {
            state.program.get(state.ip).copied().map(Opcode::from_u8)
        }

        fn is_defined(&self, opcode: Opcode) -> bool {
            opcode.to_u8() == 0
        }

        fn execute(&self, _: Opcode, mut state: Counter) -> Counter {
            state.value -= 1;
            state
        }

        fn undefined(&self, mut state: Counter) -> Counter {
            state.error = Some(ScriptError::UnknownOpcode);
            state
        }

        fn advance(&self, state: &mut Counter) {
            state.ip += 1;
        }

        fn evaluate(
            &self,
            program: &Vec<u8>,
            pass: &mut dyn FnMut(Counter) -> Counter,
        ) -> Result<Counter, Error> {
            let first = pass(counter(program.clone(), 10));
            Ok(pass(counter(program.clone(), first.value)))
        }

        fn verify(&self, state: &Counter) -> Result<(), ScriptError> {
            match state.error {
                Some(error) => Err(error),
                None if state.value == 0 => Ok(()),
                None => Err(ScriptError::UnsuccessfulEvaluation),
            }
        }
    }

    fn counter(program: Vec<u8>, value: u32) -> Counter {
        Counter {
            program,
            ip: 0,
            value,
            error: None,
        }
    }

    #[test]
    fn evaluate_does_not_mutate_input() {
        let vm = VirtualMachine::new(Countdown);
        let initial = counter(vec![0, 0, 0], 5);
        let done = vm.evaluate(&initial);
        assert_eq!(done.value, 2);
        assert_eq!(done.ip, 3);
        assert_eq!(initial.value, 5);
    }

    #[test]
    fn step_advances_once() {
        let vm = VirtualMachine::new(Countdown);
        let state = vm.step(&counter(vec![0, 0], 5));
        assert_eq!((state.ip, state.value), (1, 4));

        let finished = counter(Vec::new(), 5);
        assert_eq!(vm.step(&finished), finished);
    }

    #[test]
    fn undefined_opcodes_halt_evaluation() {
        let vm = VirtualMachine::new(Countdown);
        let state = vm.evaluate(&counter(vec![0, 1, 0], 5));
        assert_eq!(state.error, Some(ScriptError::UnknownOpcode));
        assert_eq!(state.ip, 2);
        assert_eq!(state.value, 4);
    }

    #[test]
    fn debug_records_every_step() {
        let vm = VirtualMachine::new(Countdown);
        let initial = counter(vec![0, 0], 5);
        let trace = vm.debug(&initial);
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0], initial);
        assert_eq!(trace.last(), Some(&vm.evaluate(&initial)));
    }

    #[test]
    fn programs_chain_passes() {
        let vm = VirtualMachine::new(Countdown);
        let program = vec![0; 5];
        assert_eq!(vm.evaluate_program(&program).map(|state| state.value), Ok(0));
        assert_eq!(vm.debug_program(&program).map(|trace| trace.len()), Ok(12));
        assert_eq!(vm.verify_program(&program), Ok(()));

        let failure = vm.verify_program(&vec![0; 4]).expect_err("two left");
        assert_eq!(failure.script_error, Some(ScriptError::UnsuccessfulEvaluation));
    }
}
