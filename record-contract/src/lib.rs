//! Record contract: a command dispatcher over per-resource JSON records.
//!
//! A host feeds the contract one round at a time. Each input buffer is decoded
//! as a command (`CREATE_RECORD`, `READ_RECORD`, `UPDATE_RECORD`,
//! `DELETE_RECORD`), routed under the round's read-only flag, and answered
//! with exactly one response.
//!
//! - [`message`] defines the command and response wire formats.
//! - [`router`] holds the dispatch table and the read-only policy.
//! - [`records`] turns store outcomes into client-facing responses.
//! - [`store`] is the key-value storage seam, with file and memory backends.
//! - [`channel`] declares the output and peer channels the host supplies.
//! - [`contract`] wires those together and runs a round.
//! - [`host`], [`client`], [`cli`] and [`config`] make up the local TCP host
//!   binary.

pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod contract;
pub mod host;
pub mod message;
pub mod records;
pub mod router;
pub mod store;
