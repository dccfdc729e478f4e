//! Line and document monetary totals.
//!
//! Pure, deterministic arithmetic over exact decimals (no IO, no rounding).
//! Discount applies before tax; that ordering is a contract, not an accident.
//! Callers that need currency rounding apply it at presentation time.

pub mod totals;

pub use totals::{DocumentTotals, LineInput, LineTotals, document_totals, line_total};
