//! Cross-document credit-note checks.
//!
//! A credit application touches two aggregates (the original invoice and the
//! credit note), so a single `handle` cannot validate it alone. These pure
//! functions run at the boundary — the caller loads both snapshots, validates
//! here, and only then dispatches `ApplyCredit` / `MarkCreditNoteApplied`.

use rust_decimal::Decimal;

use stockflow_core::{DomainError, DomainResult};

use crate::invoice::{Invoice, InvoiceKind, InvoiceStatus};

/// A validated credit application: how much to settle against the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditApplication {
    pub amount: Decimal,
}

/// A credit note may only be raised against a standard invoice — never
/// against another credit note.
pub fn validate_source(original: &Invoice) -> DomainResult<()> {
    if original.kind() != InvoiceKind::Invoice {
        return Err(DomainError::credit_note_source(
            "cannot create a credit note from another credit note",
        ));
    }
    Ok(())
}

/// Validate applying `credit_note` against `original` and compute the
/// settlement amount (`abs(credit_note.total)`).
pub fn application(original: &Invoice, credit_note: &Invoice) -> DomainResult<CreditApplication> {
    if original.tenant_id() != credit_note.tenant_id() {
        return Err(DomainError::invariant("tenant mismatch"));
    }

    validate_source(original)?;

    if credit_note.kind() != InvoiceKind::CreditNote {
        return Err(DomainError::credit_note_source(
            "document is not a credit note",
        ));
    }
    if credit_note.total() >= Decimal::ZERO {
        return Err(DomainError::credit_note_source(
            "credit note must carry a negative total",
        ));
    }
    if credit_note.original_invoice_id() != Some(original.id_typed()) {
        return Err(DomainError::credit_note_source(
            "credit note does not reference this invoice",
        ));
    }
    if !matches!(
        credit_note.status(),
        InvoiceStatus::Draft | InvoiceStatus::Pending
    ) {
        return Err(DomainError::credit_note_source(
            "credit note has already been applied or closed",
        ));
    }
    if !original.is_payable() {
        return Err(DomainError::invariant(format!(
            "invoice in status '{}' does not accept credits",
            original.status()
        )));
    }

    let amount = credit_note.total().abs();
    if amount > original.balance_due() {
        return Err(DomainError::InsufficientBalance {
            requested: amount,
            available: original.balance_due(),
        });
    }

    Ok(CreditApplication { amount })
}
