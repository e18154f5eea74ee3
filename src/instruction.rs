//! Bytecode decoding, encoding and disassembly.
//!
//! Parsing never fails outright: bytecode that ends in the middle of a push
//! yields a trailing [`ParsedInstruction::Malformed`] entry carrying whatever
//! bytes were present, so re-encoding is always lossless.

use core::fmt::Write as _;

use bitcoin::hex::DisplayHex;

use crate::opcodes::{all, Opcode, HIGHEST_DIRECT_PUSH_OPCODE};

const MAXIMUM_PUSH_DATA_1_SIZE: usize = 0xff;
const MAXIMUM_PUSH_DATA_2_SIZE: usize = 0xffff;

/// A well-formed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Places `data` on the stack; `opcode` records how it was encoded.
    Push { opcode: Opcode, data: Vec<u8> },
    /// Any other opcode.
    Operation { opcode: Opcode },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Push { opcode, .. } | Instruction::Operation { opcode } => *opcode,
        }
    }

    pub fn push_data(&self) -> Option<&[u8]> {
        match self {
            Instruction::Push { data, .. } => Some(data),
            Instruction::Operation { .. } => None,
        }
    }
}

/// A push instruction cut short by the end of the bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedInstruction {
    /// A `PUSHDATA` opcode without its complete length field.
    MissingLengthBytes {
        opcode: Opcode,
        expected_length_bytes: usize,
        length: Vec<u8>,
    },
    /// A push whose declared data extends past the end of the bytecode.
    MissingData {
        opcode: Opcode,
        expected_data_bytes: usize,
        data: Vec<u8>,
    },
}

impl MalformedInstruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            MalformedInstruction::MissingLengthBytes { opcode, .. }
            | MalformedInstruction::MissingData { opcode, .. } => *opcode,
        }
    }
}

/// Result of decoding one instruction. Only the final entry of a parse can be
/// malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInstruction {
    Instruction(Instruction),
    Malformed(MalformedInstruction),
}

impl ParsedInstruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            ParsedInstruction::Instruction(instruction) => instruction.opcode(),
            ParsedInstruction::Malformed(malformed) => malformed.opcode(),
        }
    }
}

/// Decodes `bytecode` into instructions.
pub fn parse(bytecode: &[u8]) -> Vec<ParsedInstruction> {
    let mut instructions = Vec::new();
    let mut index = 0usize;

    while index < bytecode.len() {
        let opcode = Opcode::from(bytecode[index]);
        index += 1;

        if !opcode.is_push() {
            instructions.push(ParsedInstruction::Instruction(Instruction::Operation {
                opcode,
            }));
            continue;
        }

        let declared = match opcode.push_length_bytes() {
            Some(width) => {
                let available = bytecode.len() - index;
                if available < width {
                    instructions.push(ParsedInstruction::Malformed(
                        MalformedInstruction::MissingLengthBytes {
                            opcode,
                            expected_length_bytes: width,
                            length: bytecode[index..].to_vec(),
                        },
                    ));
                    break;
                }
                let length = read_length(&bytecode[index..index + width]);
                index += width;
                length
            }
            None => opcode.to_u8() as usize,
        };

        let available = bytecode.len() - index;
        if available < declared {
            instructions.push(ParsedInstruction::Malformed(
                MalformedInstruction::MissingData {
                    opcode,
                    expected_data_bytes: declared,
                    data: bytecode[index..].to_vec(),
                },
            ));
            break;
        }

        let data = bytecode[index..index + declared].to_vec();
        index += declared;
        instructions.push(ParsedInstruction::Instruction(Instruction::Push {
            opcode,
            data,
        }));
    }

    instructions
}

fn read_length(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rev()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize)
}

fn write_length(out: &mut Vec<u8>, length: usize, width: usize) {
    let bytes = (length as u32).to_le_bytes();
    out.extend_from_slice(&bytes[..width]);
}

/// Whether the final parsed instruction is malformed.
pub fn is_malformed(parsed: &[ParsedInstruction]) -> bool {
    matches!(parsed.last(), Some(ParsedInstruction::Malformed(_)))
}

/// Strips the parse wrapper when every instruction is well formed.
pub fn into_well_formed(parsed: Vec<ParsedInstruction>) -> Option<Vec<Instruction>> {
    parsed
        .into_iter()
        .map(|entry| match entry {
            ParsedInstruction::Instruction(instruction) => Some(instruction),
            ParsedInstruction::Malformed(_) => None,
        })
        .collect()
}

/// Encodes a single well-formed instruction.
pub fn encode_instruction(out: &mut Vec<u8>, instruction: &Instruction) {
    match instruction {
        Instruction::Operation { opcode } => out.push(opcode.to_u8()),
        Instruction::Push { opcode, data } => {
            out.push(opcode.to_u8());
            if let Some(width) = opcode.push_length_bytes() {
                write_length(out, data.len(), width);
            }
            out.extend_from_slice(data);
        }
    }
}

/// Encodes well-formed instructions back into bytecode.
pub fn serialize_instructions(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for instruction in instructions {
        encode_instruction(&mut out, instruction);
    }
    out
}

/// Encodes parsed instructions, reproducing any truncated trailing push.
pub fn serialize(parsed: &[ParsedInstruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in parsed {
        match entry {
            ParsedInstruction::Instruction(instruction) => {
                encode_instruction(&mut out, instruction)
            }
            ParsedInstruction::Malformed(MalformedInstruction::MissingLengthBytes {
                opcode,
                length,
                ..
            }) => {
                out.push(opcode.to_u8());
                out.extend_from_slice(length);
            }
            ParsedInstruction::Malformed(MalformedInstruction::MissingData {
                opcode,
                expected_data_bytes,
                data,
            }) => {
                out.push(opcode.to_u8());
                if let Some(width) = opcode.push_length_bytes() {
                    write_length(&mut out, *expected_data_bytes, width);
                }
                out.extend_from_slice(data);
            }
        }
    }
    out
}

/// Returns the shortest push instruction encoding `data`.
pub fn encode_data_push(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    match data {
        [] => out.push(all::OP_0.to_u8()),
        [value @ 1..=16] => out.push(all::OP_1.to_u8() - 1 + value),
        [0x81] => out.push(all::OP_1NEGATE.to_u8()),
        _ if data.len() <= HIGHEST_DIRECT_PUSH_OPCODE as usize => {
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        _ if data.len() <= MAXIMUM_PUSH_DATA_1_SIZE => {
            out.push(all::OP_PUSHDATA_1.to_u8());
            write_length(&mut out, data.len(), 1);
            out.extend_from_slice(data);
        }
        _ if data.len() <= MAXIMUM_PUSH_DATA_2_SIZE => {
            out.push(all::OP_PUSHDATA_2.to_u8());
            write_length(&mut out, data.len(), 2);
            out.extend_from_slice(data);
        }
        _ => {
            out.push(all::OP_PUSHDATA_4.to_u8());
            write_length(&mut out, data.len(), 4);
            out.extend_from_slice(data);
        }
    }
    out
}

/// Whether `opcode` is the shortest way to push `data`.
///
/// Single-byte values 1 through 16 and 0x81 must use their dedicated number
/// opcodes, which is why pushes of those values are never minimal here.
pub fn is_minimal_data_push(opcode: Opcode, data: &[u8]) -> bool {
    let opcode = opcode.to_u8();
    match data {
        [] => opcode == all::OP_0.to_u8(),
        [1..=16] | [0x81] => false,
        _ if data.len() <= HIGHEST_DIRECT_PUSH_OPCODE as usize => opcode as usize == data.len(),
        _ if data.len() <= MAXIMUM_PUSH_DATA_1_SIZE => opcode == all::OP_PUSHDATA_1.to_u8(),
        _ if data.len() <= MAXIMUM_PUSH_DATA_2_SIZE => opcode == all::OP_PUSHDATA_2.to_u8(),
        _ => true,
    }
}

/// Whether every instruction is a push (number pushes included).
pub fn is_push_only(instructions: &[ParsedInstruction]) -> bool {
    instructions
        .iter()
        .all(|instruction| instruction.opcode() <= all::OP_16)
}

/// Matches the exact pay-to-script-hash template `OP_HASH160 <20 bytes> OP_EQUAL`.
pub fn is_pay_to_script_hash(instructions: &[Instruction]) -> bool {
    matches!(
        instructions,
        [
            Instruction::Operation { opcode: all::OP_HASH160 },
            Instruction::Push { opcode: all::OP_PUSHBYTES_20, .. },
            Instruction::Operation { opcode: all::OP_EQUAL },
        ]
    )
}

/// Recognizes the witness-program shape: a version push followed by a single
/// push covering the rest of the bytecode, 4 to 42 bytes in total.
pub fn is_witness_program(bytecode: &[u8]) -> bool {
    if !(4..=42).contains(&bytecode.len()) {
        return false;
    }
    let version = bytecode[0];
    let valid_version =
        version == all::OP_0.to_u8() || (all::OP_1.to_u8()..=all::OP_16.to_u8()).contains(&version);
    valid_version && bytecode[1] as usize + 2 == bytecode.len()
}

/// Renders parsed instructions as space-separated assembly.
pub fn disassemble(parsed: &[ParsedInstruction]) -> String {
    let mut out = String::new();
    for (i, entry) in parsed.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match entry {
            ParsedInstruction::Instruction(instruction) => {
                disassemble_instruction(&mut out, instruction)
            }
            ParsedInstruction::Malformed(malformed) => disassemble_malformed(&mut out, malformed),
        }
    }
    out
}

/// Parses and disassembles `bytecode`.
pub fn disassemble_bytecode(bytecode: &[u8]) -> String {
    disassemble(&parse(bytecode))
}

fn disassemble_instruction(out: &mut String, instruction: &Instruction) {
    out.push_str(instruction.opcode().name());
    if let Instruction::Push { opcode, data } = instruction {
        if *opcode == all::OP_0 {
            return;
        }
        out.push(' ');
        if opcode.push_length_bytes().is_some() {
            let _ = write!(out, "{} ", data.len());
        }
        push_hex(out, data);
    }
}

fn disassemble_malformed(out: &mut String, malformed: &MalformedInstruction) {
    out.push_str(malformed.opcode().name());
    out.push(' ');
    match malformed {
        MalformedInstruction::MissingLengthBytes {
            expected_length_bytes,
            length,
            ..
        } => {
            push_hex(out, length);
            push_missing(out, expected_length_bytes - length.len());
        }
        MalformedInstruction::MissingData {
            opcode,
            expected_data_bytes,
            data,
        } => {
            if opcode.push_length_bytes().is_some() {
                let _ = write!(out, "{expected_data_bytes} ");
            }
            push_hex(out, data);
            push_missing(out, expected_data_bytes - data.len());
        }
    }
}

fn push_hex(out: &mut String, data: &[u8]) {
    if !data.is_empty() {
        let _ = write!(out, "0x{}", data.as_hex());
    }
}

fn push_missing(out: &mut String, missing: usize) {
    let plural = if missing == 1 { "" } else { "s" };
    let _ = write!(out, "[missing {missing} byte{plural}]");
}
