use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ItemId, StatusLifecycle,
    TenantId,
};
use stockflow_events::Event;
use stockflow_orders::SalesOrderId;
use stockflow_pricing::{DocumentTotals, LineInput, LineTotals, document_totals, line_total};
use stockflow_shipping::DeliveryOrderId;

/// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status lifecycle.
///
/// `paid` and `void` are absorbing; `cancelled` reopens to `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Sent,
    Partial,
    Paid,
    Overdue,
    Cancelled,
    Void,
}

impl StatusLifecycle for InvoiceStatus {
    fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Void => "void",
        }
    }

    fn allowed_transitions(&self) -> &'static [Self] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Pending, Cancelled],
            Pending => &[Sent, Draft, Cancelled],
            Sent => &[Partial, Paid, Overdue, Void],
            Partial => &[Paid, Overdue, Void],
            Paid => &[],
            Overdue => &[Partial, Paid, Void],
            Cancelled => &[Draft],
            Void => &[],
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard invoice vs credit note (negative-total reversal document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Invoice,
    CreditNote,
}

/// How a payment was made (original `invoice_payments.payment_method`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Check,
    Other,
}

/// Invoice line: a denormalized item snapshot.
///
/// Name/sku/price are copied at issue time and never track later item edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<ItemId>,
    pub item_name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
}

impl InvoiceLine {
    pub fn pricing_input(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            tax_rate: self.tax_rate,
        }
    }

    pub fn totals(&self) -> Result<LineTotals, DomainError> {
        line_total(&self.pricing_input())
    }
}

/// A payment recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    display_id: String,
    kind: InvoiceKind,
    customer_id: Option<CustomerId>,
    sales_order_id: Option<SalesOrderId>,
    delivery_order_id: Option<DeliveryOrderId>,
    original_invoice_id: Option<InvoiceId>,
    credit_reason: Option<String>,
    status: InvoiceStatus,
    lines: Vec<InvoiceLine>,
    due_date: Option<DateTime<Utc>>,
    /// Negative for credit notes.
    total: Decimal,
    amount_paid: Decimal,
    /// Invariant (standard invoices): `amount_paid + balance_due == total`.
    balance_due: Decimal,
    payments: Vec<InvoicePayment>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            display_id: String::new(),
            kind: InvoiceKind::Invoice,
            customer_id: None,
            sales_order_id: None,
            delivery_order_id: None,
            original_invoice_id: None,
            credit_reason: None,
            status: InvoiceStatus::Draft,
            lines: Vec::new(),
            due_date: None,
            total: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            balance_due: Decimal::ZERO,
            payments: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn kind(&self) -> InvoiceKind {
        self.kind
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn sales_order_id(&self) -> Option<SalesOrderId> {
        self.sales_order_id
    }

    pub fn delivery_order_id(&self) -> Option<DeliveryOrderId> {
        self.delivery_order_id
    }

    pub fn original_invoice_id(&self) -> Option<InvoiceId> {
        self.original_invoice_id
    }

    pub fn credit_reason(&self) -> Option<&str> {
        self.credit_reason.as_deref()
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn amount_paid(&self) -> Decimal {
        self.amount_paid
    }

    pub fn balance_due(&self) -> Decimal {
        self.balance_due
    }

    pub fn payments(&self) -> &[InvoicePayment] {
        &self.payments
    }

    /// Whether the invoice sits in a status that accepts payments.
    pub fn is_payable(&self) -> bool {
        self.kind == InvoiceKind::Invoice
            && matches!(
                self.status,
                InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue
            )
    }

    /// Advisory check for an overdue sweep; the aggregate never
    /// self-transitions to `Overdue`.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Partial)
            && self.due_date.is_some_and(|due| due < now)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub display_id: String,
    pub kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub sales_order_id: Option<SalesOrderId>,
    pub delivery_order_id: Option<DeliveryOrderId>,
    /// Required for credit notes: the invoice being reversed/adjusted.
    pub original_invoice_id: Option<InvoiceId>,
    pub credit_reason: Option<String>,
    pub lines: Vec<InvoiceLine>,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeInvoiceStatus (validated against the transition table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInvoiceStatus {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub next: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyCredit — apply a credit note's amount against this
/// (original) invoice. The cross-document checks live in `credit::application`
/// and run at the boundary before this command is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCredit {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub credit_note_id: InvoiceId,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkCreditNoteApplied — close out the credit note itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCreditNoteApplied {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    ChangeInvoiceStatus(ChangeInvoiceStatus),
    RecordPayment(RecordPayment),
    ApplyCredit(ApplyCredit),
    MarkCreditNoteApplied(MarkCreditNoteApplied),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub display_id: String,
    pub kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub sales_order_id: Option<SalesOrderId>,
    pub delivery_order_id: Option<DeliveryOrderId>,
    pub original_invoice_id: Option<InvoiceId>,
    pub credit_reason: Option<String>,
    pub lines: Vec<InvoiceLine>,
    pub due_date: Option<DateTime<Utc>>,
    pub totals: DocumentTotals,
    /// Signed grand total (negated for credit notes).
    pub total: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStatusChanged {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub from: InvoiceStatus,
    pub to: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub new_amount_paid: Decimal,
    pub new_balance_due: Decimal,
    pub new_status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditApplied (on the original invoice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApplied {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub credit_note_id: InvoiceId,
    pub amount: Decimal,
    pub new_amount_paid: Decimal,
    pub new_balance_due: Decimal,
    pub new_status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteApplied (on the credit note itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteApplied {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoiceStatusChanged(InvoiceStatusChanged),
    PaymentRecorded(PaymentRecorded),
    CreditApplied(CreditApplied),
    CreditNoteApplied(CreditNoteApplied),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "billing.invoice.issued",
            InvoiceEvent::InvoiceStatusChanged(_) => "billing.invoice.status_changed",
            InvoiceEvent::PaymentRecorded(_) => "billing.invoice.payment_recorded",
            InvoiceEvent::CreditApplied(_) => "billing.invoice.credit_applied",
            InvoiceEvent::CreditNoteApplied(_) => "billing.invoice.credit_note_applied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoiceStatusChanged(e) => e.occurred_at,
            InvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::CreditApplied(e) => e.occurred_at,
            InvoiceEvent::CreditNoteApplied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.display_id = e.display_id.clone();
                self.kind = e.kind;
                self.customer_id = e.customer_id;
                self.sales_order_id = e.sales_order_id;
                self.delivery_order_id = e.delivery_order_id;
                self.original_invoice_id = e.original_invoice_id;
                self.credit_reason = e.credit_reason.clone();
                self.lines = e.lines.clone();
                self.due_date = e.due_date;
                self.total = e.total;
                self.amount_paid = Decimal::ZERO;
                self.balance_due = e.total;
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::InvoiceStatusChanged(e) => {
                self.status = e.to;
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.amount_paid = e.new_amount_paid;
                self.balance_due = e.new_balance_due;
                self.status = e.new_status;
                self.payments.push(InvoicePayment {
                    amount: e.amount,
                    method: e.method,
                    reference_number: e.reference_number.clone(),
                    occurred_at: e.occurred_at,
                });
            }
            InvoiceEvent::CreditApplied(e) => {
                self.amount_paid = e.new_amount_paid;
                self.balance_due = e.new_balance_due;
                self.status = e.new_status;
            }
            InvoiceEvent::CreditNoteApplied(e) => {
                self.amount_paid = e.amount;
                self.balance_due = Decimal::ZERO;
                self.status = InvoiceStatus::Paid;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::ChangeInvoiceStatus(cmd) => self.handle_change_status(cmd),
            InvoiceCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            InvoiceCommand::ApplyCredit(cmd) => self.handle_apply_credit(cmd),
            InvoiceCommand::MarkCreditNoteApplied(cmd) => self.handle_mark_applied(cmd),
        }
    }
}

impl Invoice {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Post-payment status suggestion; the transition table still has the
    /// final say via `ensure_transition`.
    fn settled_status(balance_due: Decimal) -> InvoiceStatus {
        if balance_due <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        }
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.display_id.trim().is_empty() {
            return Err(DomainError::validation("display_id cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let inputs: Vec<LineInput> = cmd.lines.iter().map(|l| l.pricing_input()).collect();
        let totals = document_totals(&inputs)?;

        let total = match cmd.kind {
            InvoiceKind::Invoice => totals.total,
            InvoiceKind::CreditNote => {
                if cmd.original_invoice_id.is_none() {
                    return Err(DomainError::credit_note_source(
                        "credit note requires an original invoice reference",
                    ));
                }
                if totals.total <= Decimal::ZERO {
                    return Err(DomainError::validation(
                        "credit note lines must carry a positive credit amount",
                    ));
                }
                // Stored with a negative grand total.
                -totals.total
            }
        };

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            display_id: cmd.display_id.clone(),
            kind: cmd.kind,
            customer_id: cmd.customer_id,
            sales_order_id: cmd.sales_order_id,
            delivery_order_id: cmd.delivery_order_id,
            original_invoice_id: cmd.original_invoice_id,
            credit_reason: cmd.credit_reason.clone(),
            lines: cmd.lines.clone(),
            due_date: cmd.due_date,
            totals,
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeInvoiceStatus,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if cmd.next == self.status {
            return Ok(vec![]);
        }

        self.status.ensure_transition(cmd.next)?;

        Ok(vec![InvoiceEvent::InvoiceStatusChanged(
            InvoiceStatusChanged {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                from: self.status,
                to: cmd.next,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn settlement_guard(&self, amount: Decimal) -> Result<(Decimal, Decimal, InvoiceStatus), DomainError> {
        if self.kind != InvoiceKind::Invoice {
            return Err(DomainError::credit_note_source(
                "payments cannot be recorded on a credit note",
            ));
        }
        if !self.is_payable() {
            return Err(DomainError::invariant(format!(
                "invoice in status '{}' does not accept payments",
                self.status
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be positive"));
        }
        if amount > self.balance_due {
            return Err(DomainError::InsufficientBalance {
                requested: amount,
                available: self.balance_due,
            });
        }

        let new_amount_paid = self.amount_paid + amount;
        let new_balance_due = self.total - new_amount_paid;
        let new_status = Self::settled_status(new_balance_due);

        // Derived status is advisory input: it still passes the table from
        // the current status.
        self.status.ensure_transition(new_status)?;

        Ok((new_amount_paid, new_balance_due, new_status))
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let (new_amount_paid, new_balance_due, new_status) = self.settlement_guard(cmd.amount)?;

        Ok(vec![InvoiceEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            method: cmd.method,
            reference_number: cmd.reference_number.clone(),
            new_amount_paid,
            new_balance_due,
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_credit(&self, cmd: &ApplyCredit) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let (new_amount_paid, new_balance_due, new_status) = self.settlement_guard(cmd.amount)?;

        Ok(vec![InvoiceEvent::CreditApplied(CreditApplied {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            credit_note_id: cmd.credit_note_id,
            amount: cmd.amount,
            new_amount_paid,
            new_balance_due,
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_applied(
        &self,
        cmd: &MarkCreditNoteApplied,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.kind != InvoiceKind::CreditNote {
            return Err(DomainError::credit_note_source(
                "only a credit note can be marked applied",
            ));
        }
        if !matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Pending) {
            return Err(DomainError::credit_note_source(
                "credit note has already been applied or closed",
            ));
        }

        Ok(vec![InvoiceEvent::CreditNoteApplied(CreditNoteApplied {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount: self.total.abs(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::AggregateId;
    use stockflow_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: u32, unit_price: Decimal) -> InvoiceLine {
        InvoiceLine {
            line_no: 1,
            sales_order_line_no: None,
            item_id: Some(ItemId::new()),
            item_name: "Widget A".to_string(),
            sku: Some("WID-A".to_string()),
            quantity,
            unit_price,
            discount_percent: dec!(0),
            tax_rate: dec!(0),
        }
    }

    fn change_status(
        invoice: &mut Invoice,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        next: InvoiceStatus,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        execute(
            invoice,
            &InvoiceCommand::ChangeInvoiceStatus(ChangeInvoiceStatus {
                tenant_id,
                invoice_id,
                next,
                occurred_at: test_time(),
            }),
        )
    }

    fn pay(
        invoice: &mut Invoice,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        amount: Decimal,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        execute(
            invoice,
            &InvoiceCommand::RecordPayment(RecordPayment {
                tenant_id,
                invoice_id,
                amount,
                method: PaymentMethod::BankTransfer,
                reference_number: Some("TRF-2024-001".to_string()),
                occurred_at: test_time(),
            }),
        )
    }

    /// Standard invoice for `total`, already moved to `sent`.
    fn sent_invoice(tenant_id: TenantId, invoice_id: InvoiceId, total: Decimal) -> Invoice {
        let mut invoice = Invoice::empty(invoice_id);
        execute(
            &mut invoice,
            &InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-1001".to_string(),
                kind: InvoiceKind::Invoice,
                customer_id: Some(CustomerId::new()),
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: None,
                credit_reason: None,
                lines: vec![line(1, total)],
                due_date: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        for next in [InvoiceStatus::Pending, InvoiceStatus::Sent] {
            change_status(&mut invoice, tenant_id, invoice_id, next).unwrap();
        }
        invoice
    }

    fn credit_note(
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        original: InvoiceId,
        amount: Decimal,
    ) -> Invoice {
        let mut note = Invoice::empty(invoice_id);
        execute(
            &mut note,
            &InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-2001".to_string(),
                kind: InvoiceKind::CreditNote,
                customer_id: Some(CustomerId::new()),
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: Some(original),
                credit_reason: Some("Damaged goods".to_string()),
                lines: vec![line(1, amount)],
                due_date: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        note
    }

    #[test]
    fn issued_invoice_computes_totals_with_discount_before_tax() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = Invoice::empty(invoice_id);

        let mut l = line(10, dec!(100));
        l.discount_percent = dec!(10);
        l.tax_rate = dec!(8);

        let events = invoice
            .handle(&InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-1001".to_string(),
                kind: InvoiceKind::Invoice,
                customer_id: None,
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: None,
                credit_reason: None,
                lines: vec![l],
                due_date: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        invoice.apply(&events[0]);

        assert_eq!(invoice.total(), dec!(972));
        assert_eq!(invoice.amount_paid(), dec!(0));
        assert_eq!(invoice.balance_due(), dec!(972));
        match &events[0] {
            InvoiceEvent::InvoiceIssued(e) => {
                assert_eq!(e.totals.subtotal, dec!(1000));
                assert_eq!(e.totals.total_discount, dec!(100));
                assert_eq!(e.totals.total_tax, dec!(72));
            }
            e => panic!("Expected InvoiceIssued, got: {e:?}"),
        }
    }

    #[test]
    fn partial_then_final_payment_reaches_paid() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = sent_invoice(tenant_id, invoice_id, dec!(1000));

        pay(&mut invoice, tenant_id, invoice_id, dec!(300)).unwrap();
        assert_eq!(invoice.amount_paid(), dec!(300));
        assert_eq!(invoice.balance_due(), dec!(700));
        assert_eq!(invoice.status(), InvoiceStatus::Partial);

        pay(&mut invoice, tenant_id, invoice_id, dec!(700)).unwrap();
        assert_eq!(invoice.amount_paid(), dec!(1000));
        assert_eq!(invoice.balance_due(), dec!(0));
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
        assert_eq!(invoice.payments().len(), 2);
    }

    #[test]
    fn payment_exceeding_balance_is_rejected() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = sent_invoice(tenant_id, invoice_id, dec!(500));
        pay(&mut invoice, tenant_id, invoice_id, dec!(400)).unwrap();

        let err = pay(&mut invoice, tenant_id, invoice_id, dec!(200)).unwrap_err();
        match err {
            DomainError::InsufficientBalance {
                requested,
                available,
            } => {
                assert_eq!(requested, dec!(200));
                assert_eq!(available, dec!(100));
            }
            e => panic!("Expected InsufficientBalance, got: {e:?}"),
        }
    }

    #[test]
    fn draft_invoices_do_not_accept_payments() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = Invoice::empty(invoice_id);
        execute(
            &mut invoice,
            &InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-1002".to_string(),
                kind: InvoiceKind::Invoice,
                customer_id: None,
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: None,
                credit_reason: None,
                lines: vec![line(1, dec!(100))],
                due_date: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = pay(&mut invoice, tenant_id, invoice_id, dec!(50)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn paid_and_void_are_absorbing() {
        assert!(InvoiceStatus::Paid.is_terminal());
        assert!(InvoiceStatus::Void.is_terminal());
        for next in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Partial,
        ] {
            assert!(!InvoiceStatus::Paid.can_transition_to(next));
            assert!(!InvoiceStatus::Void.can_transition_to(next));
        }
    }

    #[test]
    fn voided_invoice_rejects_payment() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = sent_invoice(tenant_id, invoice_id, dec!(100));

        change_status(&mut invoice, tenant_id, invoice_id, InvoiceStatus::Void).unwrap();
        let err = pay(&mut invoice, tenant_id, invoice_id, dec!(50)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn overdue_invoice_can_still_settle() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = sent_invoice(tenant_id, invoice_id, dec!(100));

        change_status(&mut invoice, tenant_id, invoice_id, InvoiceStatus::Overdue).unwrap();
        pay(&mut invoice, tenant_id, invoice_id, dec!(40)).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Partial);
        pay(&mut invoice, tenant_id, invoice_id, dec!(60)).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn is_past_due_follows_the_due_date() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = Invoice::empty(invoice_id);
        let due = test_time() - chrono::Duration::days(1);
        execute(
            &mut invoice,
            &InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-1003".to_string(),
                kind: InvoiceKind::Invoice,
                customer_id: None,
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: None,
                credit_reason: None,
                lines: vec![line(1, dec!(100))],
                due_date: Some(due),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        // Not past due while still draft.
        assert!(!invoice.is_past_due(test_time()));
        for next in [InvoiceStatus::Pending, InvoiceStatus::Sent] {
            change_status(&mut invoice, tenant_id, invoice_id, next).unwrap();
        }
        assert!(invoice.is_past_due(test_time()));
    }

    #[test]
    fn credit_note_is_issued_with_negative_total() {
        let tenant_id = test_tenant_id();
        let note = credit_note(tenant_id, test_invoice_id(), test_invoice_id(), dec!(200));

        assert_eq!(note.kind(), InvoiceKind::CreditNote);
        assert_eq!(note.total(), dec!(-200));
        assert_eq!(note.balance_due(), dec!(-200));
    }

    #[test]
    fn credit_note_requires_an_original_reference() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = Invoice::empty(invoice_id);

        let err = invoice
            .handle(&InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                display_id: "INV-2002".to_string(),
                kind: InvoiceKind::CreditNote,
                customer_id: None,
                sales_order_id: None,
                delivery_order_id: None,
                original_invoice_id: None,
                credit_reason: None,
                lines: vec![line(1, dec!(200))],
                due_date: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidCreditNoteSource(_)));
    }

    #[test]
    fn applying_a_credit_note_settles_both_documents() {
        let tenant_id = test_tenant_id();
        let original_id = test_invoice_id();
        let note_id = test_invoice_id();
        let mut original = sent_invoice(tenant_id, original_id, dec!(1000));
        let mut note = credit_note(tenant_id, note_id, original_id, dec!(200));

        let app = crate::credit::application(&original, &note).unwrap();
        assert_eq!(app.amount, dec!(200));

        execute(
            &mut original,
            &InvoiceCommand::ApplyCredit(ApplyCredit {
                tenant_id,
                invoice_id: original_id,
                credit_note_id: note_id,
                amount: app.amount,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut note,
            &InvoiceCommand::MarkCreditNoteApplied(MarkCreditNoteApplied {
                tenant_id,
                invoice_id: note_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(original.amount_paid(), dec!(200));
        assert_eq!(original.balance_due(), dec!(800));
        assert_eq!(original.status(), InvoiceStatus::Partial);

        assert_eq!(note.amount_paid(), dec!(200));
        assert_eq!(note.balance_due(), dec!(0));
        assert_eq!(note.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn credit_note_cannot_be_applied_twice() {
        let tenant_id = test_tenant_id();
        let note_id = test_invoice_id();
        let mut note = credit_note(tenant_id, note_id, test_invoice_id(), dec!(200));

        execute(
            &mut note,
            &InvoiceCommand::MarkCreditNoteApplied(MarkCreditNoteApplied {
                tenant_id,
                invoice_id: note_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = execute(
            &mut note,
            &InvoiceCommand::MarkCreditNoteApplied(MarkCreditNoteApplied {
                tenant_id,
                invoice_id: note_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidCreditNoteSource(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of accepted payments,
        /// `amount_paid + balance_due == total` holds.
        #[test]
        fn balance_invariant_holds_across_payment_sequences(
            amounts in prop::collection::vec(1i64..400, 1..10)
        ) {
            let tenant_id = test_tenant_id();
            let invoice_id = test_invoice_id();
            let total = dec!(1000);
            let mut invoice = sent_invoice(tenant_id, invoice_id, total);

            for cents in amounts {
                let amount = Decimal::from(cents);
                // Over-balance payments are rejected and must not move the ledger.
                let _ = pay(&mut invoice, tenant_id, invoice_id, amount);
                prop_assert_eq!(invoice.amount_paid() + invoice.balance_due(), total);
                prop_assert!(invoice.amount_paid() <= total);
            }
        }
    }
}
