//! Opcode implementations and the Bitcoin Cash opcode table.

mod arithmetic;
mod bitwise;
mod crypto;
mod flow;
mod push;
mod splice;
mod stack;
mod time;

use crate::{
    combinators::Entry,
    config::{ConsensusLimits, ScriptFlags},
    crypto::Crypto,
    opcodes::{all::*, Opcode, HIGHEST_PUSH_DATA_OPCODE},
};

/// Read-only inputs shared by every operation of a pass.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub flags: ScriptFlags,
    pub limits: ConsensusLimits,
    pub crypto: &'a dyn Crypto,
}

impl Environment<'_> {
    pub(crate) fn requires_minimal(&self) -> bool {
        self.flags.requires_minimal_encoding()
    }

    pub(crate) fn number_length(&self) -> usize {
        self.limits.maximum_script_number_length
    }
}

/// Opcodes with no table entry resolve to this.
pub(crate) const UNDEFINED: Entry = Entry::uncounted(flow::unknown);

pub(crate) type OpcodeTable = [Option<Entry>; 256];

/// Builds the opcode table for the given flags.
pub(crate) fn build_table(flags: ScriptFlags) -> Box<OpcodeTable> {
    let mut table: Box<OpcodeTable> = Box::new([None; 256]);
    let mut set = |opcode: Opcode, entry: Entry| table[opcode.to_u8() as usize] = Some(entry);

    for byte in 0..=HIGHEST_PUSH_DATA_OPCODE {
        set(Opcode::from_u8(byte), Entry::push(push::push_data));
    }
    set(OP_1NEGATE, Entry::uncounted(push::push_small_integer));
    for byte in OP_1.to_u8()..=OP_16.to_u8() {
        set(Opcode::from_u8(byte), Entry::uncounted(push::push_small_integer));
    }
    set(OP_RESERVED, Entry::uncounted(flow::reserved));

    set(OP_NOP, Entry::new(flow::nop));
    set(OP_VER, Entry::new(flow::reserved));
    set(OP_IF, Entry::always(flow::op_if));
    set(OP_NOTIF, Entry::always(flow::op_notif));
    set(OP_VERIF, Entry::always(flow::reserved));
    set(OP_VERNOTIF, Entry::always(flow::reserved));
    set(OP_ELSE, Entry::always(flow::op_else));
    set(OP_ENDIF, Entry::always(flow::op_endif));
    set(OP_VERIFY, Entry::new(flow::op_verify));
    set(OP_RETURN, Entry::new(flow::op_return));

    set(OP_TOALTSTACK, Entry::new(stack::op_toaltstack));
    set(OP_FROMALTSTACK, Entry::new(stack::op_fromaltstack));
    set(OP_2DROP, Entry::new(stack::op_2drop));
    set(OP_2DUP, Entry::new(stack::op_2dup));
    set(OP_3DUP, Entry::new(stack::op_3dup));
    set(OP_2OVER, Entry::new(stack::op_2over));
    set(OP_2ROT, Entry::new(stack::op_2rot));
    set(OP_2SWAP, Entry::new(stack::op_2swap));
    set(OP_IFDUP, Entry::new(stack::op_ifdup));
    set(OP_DEPTH, Entry::new(stack::op_depth));
    set(OP_DROP, Entry::new(stack::op_drop));
    set(OP_DUP, Entry::new(stack::op_dup));
    set(OP_NIP, Entry::new(stack::op_nip));
    set(OP_OVER, Entry::new(stack::op_over));
    set(OP_PICK, Entry::new(stack::op_pick));
    set(OP_ROLL, Entry::new(stack::op_roll));
    set(OP_ROT, Entry::new(stack::op_rot));
    set(OP_SWAP, Entry::new(stack::op_swap));
    set(OP_TUCK, Entry::new(stack::op_tuck));

    set(OP_CAT, Entry::new(splice::op_cat));
    set(OP_SPLIT, Entry::new(splice::op_split));
    set(OP_NUM2BIN, Entry::new(splice::op_num2bin));
    set(OP_BIN2NUM, Entry::new(splice::op_bin2num));
    set(OP_SIZE, Entry::new(splice::op_size));

    set(OP_AND, Entry::new(bitwise::op_and));
    set(OP_OR, Entry::new(bitwise::op_or));
    set(OP_XOR, Entry::new(bitwise::op_xor));
    set(OP_EQUAL, Entry::new(bitwise::op_equal));
    set(OP_EQUALVERIFY, Entry::new(bitwise::op_equalverify));
    set(OP_RESERVED1, Entry::new(flow::reserved));
    set(OP_RESERVED2, Entry::new(flow::reserved));

    set(OP_1ADD, Entry::new(arithmetic::op_1add));
    set(OP_1SUB, Entry::new(arithmetic::op_1sub));
    set(OP_NEGATE, Entry::new(arithmetic::op_negate));
    set(OP_ABS, Entry::new(arithmetic::op_abs));
    set(OP_NOT, Entry::new(arithmetic::op_not));
    set(OP_0NOTEQUAL, Entry::new(arithmetic::op_0notequal));
    set(OP_ADD, Entry::new(arithmetic::op_add));
    set(OP_SUB, Entry::new(arithmetic::op_sub));
    set(OP_DIV, Entry::new(arithmetic::op_div));
    set(OP_MOD, Entry::new(arithmetic::op_mod));
    set(OP_BOOLAND, Entry::new(arithmetic::op_booland));
    set(OP_BOOLOR, Entry::new(arithmetic::op_boolor));
    set(OP_NUMEQUAL, Entry::new(arithmetic::op_numequal));
    set(OP_NUMEQUALVERIFY, Entry::new(arithmetic::op_numequalverify));
    set(OP_NUMNOTEQUAL, Entry::new(arithmetic::op_numnotequal));
    set(OP_LESSTHAN, Entry::new(arithmetic::op_lessthan));
    set(OP_GREATERTHAN, Entry::new(arithmetic::op_greaterthan));
    set(OP_LESSTHANOREQUAL, Entry::new(arithmetic::op_lessthanorequal));
    set(OP_GREATERTHANOREQUAL, Entry::new(arithmetic::op_greaterthanorequal));
    set(OP_MIN, Entry::new(arithmetic::op_min));
    set(OP_MAX, Entry::new(arithmetic::op_max));
    set(OP_WITHIN, Entry::new(arithmetic::op_within));

    for disabled in [OP_INVERT, OP_2MUL, OP_2DIV, OP_MUL, OP_LSHIFT, OP_RSHIFT] {
        set(disabled, Entry::always(flow::disabled));
    }

    set(OP_RIPEMD160, Entry::new(crypto::op_ripemd160));
    set(OP_SHA1, Entry::new(crypto::op_sha1));
    set(OP_SHA256, Entry::new(crypto::op_sha256));
    set(OP_HASH160, Entry::new(crypto::op_hash160));
    set(OP_HASH256, Entry::new(crypto::op_hash256));
    set(OP_CODESEPARATOR, Entry::new(crypto::op_codeseparator));
    set(OP_CHECKSIG, Entry::new(crypto::op_checksig));
    set(OP_CHECKSIGVERIFY, Entry::new(crypto::op_checksigverify));
    set(OP_CHECKMULTISIG, Entry::new(crypto::op_checkmultisig));
    set(OP_CHECKMULTISIGVERIFY, Entry::new(crypto::op_checkmultisigverify));
    set(OP_CHECKDATASIG, Entry::new(crypto::op_checkdatasig));
    set(OP_CHECKDATASIGVERIFY, Entry::new(crypto::op_checkdatasigverify));

    set(OP_CHECKLOCKTIMEVERIFY, Entry::new(time::op_checklocktimeverify));
    set(OP_CHECKSEQUENCEVERIFY, Entry::new(time::op_checksequenceverify));

    for nop in [
        OP_NOP1, OP_NOP4, OP_NOP5, OP_NOP6, OP_NOP7, OP_NOP8, OP_NOP9, OP_NOP10,
    ] {
        set(nop, Entry::new(flow::upgradable_nop));
    }

    if flags.enables_reverse_bytes() {
        set(OP_REVERSEBYTES, Entry::new(splice::op_reversebytes));
    }

    table
}
