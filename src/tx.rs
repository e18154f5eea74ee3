//! Transaction parsing and the per-input data consumed during evaluation.
//!
//! The digests over all outpoints, sequence numbers and outputs are shared by
//! every input of a transaction, so they are computed once in
//! [`PrecomputedTransactionData`] and copied into each input's [`SpendContext`].

use std::sync::Arc;

use bitcoin::{
    consensus,
    hashes::{sha256, sha256d, Hash, HashEngine},
    OutPoint, Transaction, TxOut,
};

use crate::Error;

/// Holds a parsed spending transaction.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    tx: Transaction,
}

impl TransactionContext {
    /// Parses a transaction from wire bytes. Trailing bytes and non-canonical
    /// encodings are rejected.
    pub fn parse(tx_bytes: &[u8]) -> Result<Self, Error> {
        let (tx, consumed): (Transaction, usize) =
            consensus::deserialize_partial(tx_bytes).map_err(|_| Error::TxDeserialize)?;

        let canonical = consensus::serialize(&tx);
        if consumed != tx_bytes.len() || canonical.len() != tx_bytes.len() {
            return Err(Error::TxSizeMismatch);
        }

        Ok(Self { tx })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn into_tx(self) -> Transaction {
        self.tx
    }

    /// Ensures `input_index` points to an existing transaction input.
    pub fn ensure_input_index(&self, input_index: usize) -> Result<(), Error> {
        if input_index >= self.tx.input.len() {
            Err(Error::TxIndex)
        } else {
            Ok(())
        }
    }

    pub fn build_precomputed(&self) -> PrecomputedTransactionData {
        PrecomputedTransactionData::new(&self.tx)
    }
}

/// Transaction-wide digests shared by every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecomputedTransactionData {
    pub hash_prevouts: sha256d::Hash,
    pub hash_sequence: sha256d::Hash,
    pub hash_outputs: sha256d::Hash,
}

impl PrecomputedTransactionData {
    pub fn new(tx: &Transaction) -> PrecomputedTransactionData {
        PrecomputedTransactionData {
            hash_prevouts: double_sha(hash_serialized(
                tx.input.iter().map(|input| &input.previous_output),
            )),
            hash_sequence: double_sha(hash_serialized(
                tx.input.iter().map(|input| &input.sequence),
            )),
            hash_outputs: double_sha(hash_serialized(tx.output.iter())),
        }
    }
}

/// What an evaluation knows about the input being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendContext {
    pub version: u32,
    pub locktime: u32,
    pub outpoint: OutPoint,
    pub sequence: u32,
    /// Value in satoshis of the output being spent.
    pub value: u64,
    pub hash_prevouts: sha256d::Hash,
    pub hash_sequence: sha256d::Hash,
    pub hash_outputs: sha256d::Hash,
    /// Digest of the output at the same index as this input, if one exists.
    pub corresponding_output_hash: Option<sha256d::Hash>,
}

impl SpendContext {
    pub fn new(
        tx: &Transaction,
        precomputed: &PrecomputedTransactionData,
        input_index: usize,
        value: u64,
    ) -> Result<Self, Error> {
        let input = tx.input.get(input_index).ok_or(Error::TxIndex)?;
        Ok(SpendContext {
            version: tx.version.0 as u32,
            locktime: tx.lock_time.to_consensus_u32(),
            outpoint: input.previous_output,
            sequence: input.sequence.0,
            value,
            hash_prevouts: precomputed.hash_prevouts,
            hash_sequence: precomputed.hash_sequence,
            hash_outputs: precomputed.hash_outputs,
            corresponding_output_hash: tx
                .output
                .get(input_index)
                .map(|output| sha256d::Hash::hash(&consensus::serialize(output))),
        })
    }
}

impl Default for SpendContext {
    /// A context with every field zeroed, for evaluating bytecode outside of a
    /// transaction.
    fn default() -> Self {
        let zero = sha256d::Hash::all_zeros();
        SpendContext {
            version: 0,
            locktime: 0,
            outpoint: OutPoint::null(),
            sequence: 0,
            value: 0,
            hash_prevouts: zero,
            hash_sequence: zero,
            hash_outputs: zero,
            corresponding_output_hash: None,
        }
    }
}

/// One input's authentication: the spending transaction, which input is
/// being validated and the output it spends.
///
/// Programs for different inputs of one transaction can share the
/// transaction and its digests through [`AuthenticationProgram::for_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationProgram {
    spending_transaction: Arc<Transaction>,
    precomputed: PrecomputedTransactionData,
    pub input_index: usize,
    pub source_output: TxOut,
}

impl AuthenticationProgram {
    pub fn new(
        spending_transaction: Transaction,
        input_index: usize,
        source_output: TxOut,
    ) -> Self {
        let precomputed = PrecomputedTransactionData::new(&spending_transaction);
        Self::for_input(
            Arc::new(spending_transaction),
            precomputed,
            input_index,
            source_output,
        )
    }

    /// Builds a program over an already shared transaction. `precomputed` must
    /// have been computed from `spending_transaction`.
    pub fn for_input(
        spending_transaction: Arc<Transaction>,
        precomputed: PrecomputedTransactionData,
        input_index: usize,
        source_output: TxOut,
    ) -> Self {
        AuthenticationProgram {
            spending_transaction,
            precomputed,
            input_index,
            source_output,
        }
    }

    pub fn spending_transaction(&self) -> &Transaction {
        &self.spending_transaction
    }

    pub fn unlocking_bytecode(&self) -> Result<&[u8], Error> {
        self.spending_transaction
            .input
            .get(self.input_index)
            .map(|input| input.script_sig.as_bytes())
            .ok_or(Error::TxIndex)
    }

    pub fn locking_bytecode(&self) -> &[u8] {
        self.source_output.script_pubkey.as_bytes()
    }

    pub fn spend_context(&self) -> Result<SpendContext, Error> {
        SpendContext::new(
            &self.spending_transaction,
            &self.precomputed,
            self.input_index,
            self.source_output.value.to_sat(),
        )
    }
}

fn double_sha(hash: sha256::Hash) -> sha256d::Hash {
    sha256d::Hash::hash(&hash.to_byte_array())
}

fn hash_serialized<'a, I, T>(items: I) -> sha256::Hash
where
    I: IntoIterator<Item = &'a T>,
    T: consensus::Encodable + 'a,
{
    let mut engine = sha256::Hash::engine();
    for item in items {
        engine.input(&consensus::serialize(item));
    }
    sha256::Hash::from_engine(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::{
        absolute::LockTime, transaction::Version, Amount, ScriptBuf, Sequence, TxIn, Txid,
        Witness,
    };

    fn sample_tx() -> Transaction {
        Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([1u8; 32]),
                    vout: 0,
                },
                script_sig: ScriptBuf::from_bytes(vec![0x51]),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(42),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    #[test]
    fn parses_canonical_transaction() {
        let tx = sample_tx();
        let encoded = consensus::serialize(&tx);
        let ctx = TransactionContext::parse(&encoded).expect("valid tx");
        assert_eq!(ctx.tx().compute_txid(), tx.compute_txid());
        assert!(ctx.ensure_input_index(0).is_ok());
        assert_eq!(ctx.ensure_input_index(1), Err(Error::TxIndex));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut encoded = consensus::serialize(&sample_tx());
        encoded.push(0x00);
        assert_eq!(
            TransactionContext::parse(&encoded).map(|_| ()),
            Err(Error::TxSizeMismatch)
        );
        assert_eq!(
            TransactionContext::parse(&[0x01, 0x02]).map(|_| ()),
            Err(Error::TxDeserialize)
        );
    }

    #[test]
    fn precomputed_hashes_cover_the_whole_transaction() {
        let tx = sample_tx();
        let precomputed = PrecomputedTransactionData::new(&tx);
        let expected_outputs = sha256d::Hash::hash(&consensus::serialize(&tx.output[0]));
        assert_eq!(precomputed.hash_outputs, expected_outputs);
        let expected_sequence = sha256d::Hash::hash(&0xffff_ffffu32.to_le_bytes());
        assert_eq!(precomputed.hash_sequence, expected_sequence);
    }

    #[test]
    fn spend_context_extracts_input_fields() {
        let tx = sample_tx();
        let program = AuthenticationProgram::new(
            tx.clone(),
            0,
            TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            },
        );
        let context = program.spend_context().expect("context");
        assert_eq!(context.version, 2);
        assert_eq!(context.sequence, 0xffff_ffff);
        assert_eq!(context.value, 1_000);
        assert_eq!(context.outpoint, tx.input[0].previous_output);
        assert!(context.corresponding_output_hash.is_some());
        assert_eq!(program.unlocking_bytecode(), Ok(&[0x51u8][..]));

        let out_of_range = AuthenticationProgram::new(tx, 3, program.source_output.clone());
        assert_eq!(out_of_range.spend_context(), Err(Error::TxIndex));
    }

    #[test]
    fn programs_for_each_input_share_one_transaction() {
        let mut tx = sample_tx();
        tx.input.push(tx.input[0].clone());
        tx.input[1].previous_output.vout = 1;
        let source_output = TxOut {
            value: Amount::from_sat(7),
            script_pubkey: ScriptBuf::new(),
        };

        let ctx = TransactionContext::parse(&consensus::serialize(&tx)).expect("valid tx");
        let precomputed = ctx.build_precomputed();
        let shared = Arc::new(ctx.into_tx());
        let programs: Vec<AuthenticationProgram> = (0..2)
            .map(|index| {
                AuthenticationProgram::for_input(
                    Arc::clone(&shared),
                    precomputed,
                    index,
                    source_output.clone(),
                )
            })
            .collect();
        assert_eq!(Arc::strong_count(&shared), 3);

        for (index, program) in programs.iter().enumerate() {
            let standalone = AuthenticationProgram::new(tx.clone(), index, source_output.clone());
            assert_eq!(program.spend_context(), standalone.spend_context());
            assert_eq!(program, &standalone);
        }
        assert_eq!(programs[1].spend_context().map(|c| c.outpoint.vout), Ok(1));
    }
}
