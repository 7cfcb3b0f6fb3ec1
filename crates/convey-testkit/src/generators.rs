//! Proptest generators for property-based testing.

use proptest::prelude::*;

use convey_core::{Keypair, Record, RecordHash};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random RecordHash.
pub fn record_hash() -> impl Strategy<Value = RecordHash> {
    any::<[u8; 32]>().prop_map(RecordHash::from_bytes)
}

/// Generate an alias.
pub fn alias() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,15}".prop_map(String::from)
}

/// Generate payload bytes of up to the given length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Parameters for generating a record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub seed: [u8; 32],
    pub alias: String,
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            alias(),
            0u64..=4_102_444_800u64, // through the year 2100
            payload(600),
        )
            .prop_map(|(seed, alias, timestamp, payload)| RecordParams {
                seed,
                alias,
                timestamp,
                payload,
            })
            .boxed()
    }
}

/// Build the record described by the parameters.
pub fn record_from_params(params: &RecordParams) -> Record {
    let keypair = Keypair::from_seed(&params.seed);
    Record::sign(
        params.timestamp,
        &params.alias,
        params.payload.clone(),
        &keypair,
    )
}
