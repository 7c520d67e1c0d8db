// src/lookup/mod.rs

pub mod client;
pub mod outcome;
pub mod transport;

pub use client::{key_label, LookupClient, LookupSuccess, RetryPolicy};
pub use outcome::{AttemptDisposition, AttemptFailure, ExhaustionReport, FailureReason};
pub use transport::{GstinTransport, HttpTransport, RawReply, TransportError};
