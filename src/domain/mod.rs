pub mod changeset;
pub mod dates;
pub mod edits;
pub mod error;
pub mod field;
pub mod fingerprint;
pub mod ports;
pub mod query;
pub mod table;
pub mod value_objects;
