//! The fee ledger aggregate
//!
//! `FeeLedger` owns every store the ledger operations work on. The operations
//! themselves live in sibling modules as further `impl FeeLedger` blocks:
//!
//! - `invoice_manager` - single and batch invoicing, invoice voids
//! - `payment_processor` - idempotent payment recording
//! - `credit_wallet` - applying surplus credit to invoices
//! - `void_engine` - payment reversals
//! - `statement_importer` - bank statement import
//! - `reconciliation` - matching statement lines to ledger transactions
//!
//! # Architecture
//!
//! ```text
//! FeeLedger
//!     ├── LedgerAccounts   (per-student critical section, balances)
//!     ├── Journal          (append-only ledger transactions)
//!     ├── invoices / payments / idempotency keys
//!     ├── bank accounts / statements / match links
//!     ├── Arc<dyn FeeSchedule>
//!     └── Arc<dyn AuditSink>
//! ```
//!
//! # Thread Safety
//!
//! Every store is a `DashMap`, so a `FeeLedger` can be shared behind an `Arc`
//! and driven from many threads. Balance-changing operations serialize per
//! student through [`LedgerAccounts::with_account`].

use crate::core::audit_log::TracingAuditSink;
use crate::core::fee_structure::FeeStructure;
use crate::core::journal::Journal;
use crate::core::ledger_account::{project, LedgerAccounts};
use crate::core::traits::{AuditSink, FeeSchedule};
use crate::types::{
    AuditAction, AuditEntry, BankAccount, BankAccountId, BankStatement, Invoice, InvoiceId,
    LedgerError, LedgerTransaction, MatchLink, Money, Payment, PaymentId, Posting, StatementId,
    StatementLineId, StudentAccount, StudentId, StudentProfile, TransactionId, UserId,
};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Id sequences for records the ledger allocates
#[derive(Debug)]
pub(crate) struct Sequences {
    invoice: AtomicU64,
    payment: AtomicU64,
    statement: AtomicU64,
    line: AtomicU64,
}

impl Sequences {
    fn new() -> Self {
        Self {
            invoice: AtomicU64::new(1),
            payment: AtomicU64::new(1),
            statement: AtomicU64::new(1),
            line: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_invoice(&self) -> InvoiceId {
        self.invoice.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_payment(&self) -> PaymentId {
        self.payment.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_statement(&self) -> StatementId {
        self.statement.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_line(&self) -> StatementLineId {
        self.line.fetch_add(1, Ordering::Relaxed)
    }
}

/// Student fee ledger with bank reconciliation
pub struct FeeLedger {
    pub(crate) accounts: LedgerAccounts,
    pub(crate) journal: Journal,
    pub(crate) invoices: DashMap<InvoiceId, Invoice>,
    /// Invoice ids per student, in creation order
    pub(crate) student_invoices: DashMap<StudentId, Vec<InvoiceId>>,
    pub(crate) payments: DashMap<PaymentId, Payment>,
    /// Idempotency keys are scoped to the student
    pub(crate) idempotency: DashMap<(StudentId, String), PaymentId>,
    pub(crate) bank_accounts: DashMap<BankAccountId, BankAccount>,
    pub(crate) statements: DashMap<StatementId, BankStatement>,
    /// Owning statement of every imported line
    pub(crate) line_index: DashMap<StatementLineId, StatementId>,
    pub(crate) matches: DashMap<StatementLineId, MatchLink>,
    pub(crate) sequences: Sequences,
    fees: Arc<dyn FeeSchedule>,
    audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for FeeLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeeLedger")
            .field("accounts", &self.accounts.len())
            .field("transactions", &self.journal.len())
            .field("invoices", &self.invoices.len())
            .field("payments", &self.payments.len())
            .field("statements", &self.statements.len())
            .finish_non_exhaustive()
    }
}

impl Default for FeeLedger {
    /// Ledger with an empty fee structure that audits through `tracing`
    fn default() -> Self {
        Self::new(Arc::new(FeeStructure::default()), Arc::new(TracingAuditSink))
    }
}

impl FeeLedger {
    pub fn new(fees: Arc<dyn FeeSchedule>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            accounts: LedgerAccounts::new(),
            journal: Journal::new(),
            invoices: DashMap::new(),
            student_invoices: DashMap::new(),
            payments: DashMap::new(),
            idempotency: DashMap::new(),
            bank_accounts: DashMap::new(),
            statements: DashMap::new(),
            line_index: DashMap::new(),
            matches: DashMap::new(),
            sequences: Sequences::new(),
            fees,
            audit,
        }
    }

    pub(crate) fn fee_schedule(&self) -> &dyn FeeSchedule {
        self.fees.as_ref()
    }

    pub(crate) fn record_audit(&self, entry: AuditEntry) {
        self.audit.record(entry);
    }

    /// Apply postings to an account inside its critical section
    ///
    /// The resulting balances are projected first; if that fails nothing is
    /// appended and the account is unchanged.
    pub(crate) fn post(
        &self,
        account: &mut StudentAccount,
        postings: Vec<Posting>,
        actor: UserId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let (balance, credit_balance) = project(account, &postings)?;

        let transactions = postings
            .into_iter()
            .map(|posting| self.journal.append(account.student, posting, actor))
            .collect();

        account.balance = balance;
        account.credit_balance = credit_balance;
        Ok(transactions)
    }

    /// Register a student with the ledger
    ///
    /// Re-registering a known student refreshes the profile fields and keeps
    /// the balances.
    pub fn register_student(&self, profile: StudentProfile, actor: UserId) -> StudentAccount {
        let existed = self.accounts.contains(profile.student);
        let account = self.accounts.register(profile);
        let action = if existed {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        self.record_audit(
            AuditEntry::new(actor, action, "students", u64::from(account.student)).after(&account),
        );
        info!(student = account.student, %action, "student registered");
        account
    }

    /// Get a student's account, opening a placeholder one if unknown
    pub fn ensure_student(&self, student: StudentId) -> StudentAccount {
        self.accounts.ensure(student)
    }

    pub fn account(&self, student: StudentId) -> Option<StudentAccount> {
        self.accounts.get(student)
    }

    /// Every account, sorted by student id
    pub fn accounts(&self) -> Vec<StudentAccount> {
        self.accounts.all()
    }

    pub fn invoice(&self, invoice: InvoiceId) -> Option<Invoice> {
        self.invoices.get(&invoice).map(|entry| entry.value().clone())
    }

    /// A student's invoices, oldest first
    pub fn invoices_for(&self, student: StudentId) -> Vec<Invoice> {
        let ids = self
            .student_invoices
            .get(&student)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.invoice(id)).collect()
    }

    /// A student's open invoices with an outstanding balance, oldest first
    pub fn pending_invoices(&self, student: StudentId) -> Vec<Invoice> {
        let mut invoices = self.invoices_for(student);
        invoices.retain(Invoice::is_pending);
        invoices
    }

    pub fn payment(&self, payment: PaymentId) -> Option<Payment> {
        self.payments.get(&payment).map(|entry| entry.value().clone())
    }

    /// Payment recorded under a student's idempotency key
    pub fn payment_by_key(&self, student: StudentId, idempotency_key: &str) -> Option<Payment> {
        let id = *self
            .idempotency
            .get(&(student, idempotency_key.trim().to_string()))?;
        self.payment(id)
    }

    pub fn transaction(&self, transaction: TransactionId) -> Option<LedgerTransaction> {
        self.journal.get(transaction)
    }

    /// A student's ledger transactions in posting order
    pub fn transactions_for(&self, student: StudentId) -> Vec<LedgerTransaction> {
        self.journal.for_student(student)
    }

    /// Balance and credit balance recomputed from the journal
    ///
    /// Always equal to the balances on the student's account.
    pub fn reconstruct_balances(&self, student: StudentId) -> Result<(Money, Money), LedgerError> {
        if !self.accounts.contains(student) {
            return Err(LedgerError::not_found("student", u64::from(student)));
        }
        self.journal.reconstruct(student)
    }
}
