
use bch_consensus::{
    AuthenticationProgram, BchInstructionSet, InstructionSetVersion, VirtualMachine,
};
use bitcoin::ScriptBuf;
use fixtures::{source_output, spending_transaction};
use script_asm::assemble;
use serde_json::Value;

const SCRIPT_VECTORS: &str = include_str!("data/script_vectors.json");

struct Vector<'a> {
    unlocking: &'a str,
    locking: &'a str,
    version: InstructionSetVersion,
    expected: &'a str,
    comment: &'a str,
}

fn parse_vector(entry: &Value) -> Option<Vector<'_>> {
    let fields = entry.as_array()?;
    if fields.len() != 5 {
        return None;
    }
    Some(Vector {
        unlocking: fields[0].as_str()?,
        locking: fields[1].as_str()?,
        version: fields[2].as_str()?.parse().ok()?,
        expected: fields[3].as_str()?,
        comment: fields[4].as_str()?,
    })
}

#[test]
fn script_vectors() {
    let entries: Vec<Value> =
        serde_json::from_str(SCRIPT_VECTORS).expect("script_vectors.json deserializes");

    let mut checked = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        // single-string entries are comments
        if entry.as_array().is_some_and(|fields| fields.len() == 1) {
            continue;
        }
        let vector =
            parse_vector(entry).unwrap_or_else(|| panic!("malformed vector #{index}: {entry}"));

        let unlocking = assemble(vector.unlocking)
            .unwrap_or_else(|err| panic!("vector #{index} unlocking: {err}"));
        let locking =
            assemble(vector.locking).unwrap_or_else(|err| panic!("vector #{index} locking: {err}"));

        let mut tx = spending_transaction(1);
        tx.input[0].script_sig = ScriptBuf::from_bytes(unlocking);
        let program = AuthenticationProgram::new(tx, 0, source_output(locking));
        let vm = VirtualMachine::new(BchInstructionSet::from_version(vector.version));

        let actual = match vm.verify_program(&program) {
            Ok(()) => "OK".to_string(),
            Err(failure) => match failure.script_error {
                Some(error) => format!("{error:?}"),
                None => format!("{:?}", failure.error),
            },
        };
        assert_eq!(
            actual, vector.expected,
            "vector #{index} ({}): [{}] [{}] under {}",
            vector.comment, vector.unlocking, vector.locking, vector.version
        );
        checked += 1;
    }
    assert!(checked > 50, "only {checked} vectors ran");
}
