//! Invoices domain module (event-sourced).
//!
//! Billing side of the order-to-cash workflow: invoice lifecycle, the
//! payment ledger (`amount_paid` / `balance_due`), and credit notes
//! (negative-total invoices that reverse or adjust a prior invoice).

pub mod credit;
pub mod invoice;

pub use credit::{CreditApplication, application, validate_source};
pub use invoice::{
    ApplyCredit, ChangeInvoiceStatus, CreditApplied, CreditNoteApplied, InvoiceLine,
    InvoicePayment, Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceKind,
    InvoiceStatus, InvoiceStatusChanged, IssueInvoice, MarkCreditNoteApplied, PaymentMethod,
    PaymentRecorded, RecordPayment,
};
