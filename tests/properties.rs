
use bch_consensus::{
    instruction, script_num, AuthenticationProgram, BchInstructionSet, InstructionSetVersion,
    VirtualMachine,
};
use bitcoin::ScriptBuf;
use fixtures::{source_output, spending_transaction};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_script_number_round_trip(value in -0x7fff_ffffi64..=0x7fff_ffff) {
        let encoded = script_num::encode(value);
        prop_assert!(encoded.len() <= 4);
        prop_assert!(script_num::is_minimally_encoded(&encoded));
        prop_assert_eq!(script_num::decode(&encoded, true, 4), Ok(value));
    }

    #[test]
    fn prop_minimal_encoding_preserves_value(bytes in prop::collection::vec(any::<u8>(), 0..=4)) {
        let minimal = script_num::minimally_encode(&bytes);
        prop_assert!(script_num::is_minimally_encoded(&minimal));
        prop_assert_eq!(
            script_num::decode(&minimal, true, 4),
            script_num::decode(&bytes, false, 4)
        );
    }

    #[test]
    fn prop_parse_then_serialize_is_identity(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
        let parsed = instruction::parse(&bytes);
        prop_assert_eq!(instruction::serialize(&parsed), bytes);
    }

    #[test]
    fn prop_minimal_pushes_parse_back(data in prop::collection::vec(any::<u8>(), 0..600)) {
        let bytecode = instruction::encode_data_push(&data);
        let parsed = instruction::parse(&bytecode);
        prop_assert_eq!(parsed.len(), 1);
        let instructions = instruction::into_well_formed(parsed).expect("well-formed push");
        prop_assert!(instruction::is_minimal_data_push(instructions[0].opcode(), &data)
            || instructions[0].push_data().is_none());
    }

    #[test]
    fn prop_arbitrary_bytecode_evaluates_without_panicking(
        unlocking in prop::collection::vec(0u8..=0x60, 0..40),
        locking in prop::collection::vec(any::<u8>(), 0..80),
    ) {
        let mut tx = spending_transaction(1);
        tx.input[0].script_sig = ScriptBuf::from_bytes(unlocking);
        let program = AuthenticationProgram::new(tx, 0, source_output(locking));
        let vm = VirtualMachine::new(BchInstructionSet::from_version(
            InstructionSetVersion::Bch2020MayStrict,
        ));
        let trace = vm.debug_program(&program).expect("valid input index");
        let evaluated = vm.evaluate_program(&program).expect("valid input index");
        prop_assert_eq!(trace.last(), Some(&evaluated));
    }
}
