//! # Tessella Codec
//!
//! Wire format of the Tessella changeset: a compact binary instruction
//! stream describing every mutation of a write transaction.
//!
//! This crate provides:
//! - The typed [`Instruction`] set
//! - [`InstructionEncoder`]: stable, deterministic byte encoding
//! - [`Parser`]: the byte-exact inverse, with offset-carrying errors
//! - [`Changeset`]: an immutable, versioned frozen stream
//!
//! The codec never touches a store; recording hooks live in the
//! replication crate and the data model in the core crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changeset;
mod decoder;
mod encoder;
mod error;
mod instruction;

pub use changeset::Changeset;
pub use decoder::Parser;
pub use encoder::{InstructionEncoder, NULL_ROW_SENTINEL};
pub use error::{CodecError, CodecResult};
pub use instruction::{Instruction, LinkSpec};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        prop_oneof![
            "[a-z]{0,12}".prop_map(|name| Instruction::AddTable { name }),
            (0usize..100).prop_map(|table| Instruction::SelectTable { table }),
            (0usize..100, 0usize..100, any::<i64>())
                .prop_map(|(col, row, value)| Instruction::SetInt { col, row, value }),
            (0usize..100, 0usize..100, ".*")
                .prop_map(|(col, row, value)| Instruction::SetString { col, row, value }),
            (0usize..100, 0usize..100, proptest::collection::vec(any::<u8>(), 0..64))
                .prop_map(|(col, row, value)| Instruction::SetBinary { col, row, value }),
            (0usize..100, 0usize..100, any::<i64>(), 0u32..1_000_000_000).prop_map(
                |(col, row, s, ns)| Instruction::SetTimestamp {
                    col,
                    row,
                    value: tessella_core::Timestamp::new(s, ns),
                }
            ),
            (0usize..100, 0usize..100, proptest::option::of(0usize..1000))
                .prop_map(|(col, row, target)| Instruction::SetLink { col, row, target }),
            (0usize..1000).prop_map(|target| Instruction::LinkListAdd { target }),
            (0usize..100).prop_map(|count| Instruction::AddEmptyRow { count }),
        ]
    }

    proptest! {
        #[test]
        fn encode_parse_identity(instructions in proptest::collection::vec(arb_instruction(), 0..32)) {
            let mut enc = InstructionEncoder::new();
            for i in &instructions {
                enc.encode(i);
            }
            let bytes = enc.into_bytes();
            let mut parser = Parser::new(&bytes);
            let mut decoded = Vec::new();
            while let Some(i) = parser.next_instruction().unwrap() {
                decoded.push(i);
            }
            prop_assert_eq!(decoded, instructions);
        }

        #[test]
        fn parser_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut parser = Parser::new(&bytes);
            loop {
                match parser.next_instruction() {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
}
