//! Delimiter-separated text codec used by the flat-file store.
//!
//! # Responsibility
//! - Encode single fields with quote escaping only when required.
//! - Decode one row back into its ordered fields.
//! - Split file text into logical records, keeping quoted newlines inside
//!   their record.
//!
//! # Invariants
//! - `decode_row(&encode_row(fields)) == fields` for every non-empty field
//!   sequence.
//! - Fields without delimiter, quote or line-break characters are written
//!   verbatim.

mod row;

pub use row::{decode_row, encode_field, encode_row, split_records, Record, DELIMITER, QUOTE};
