//! Invoice creation, batch generation and invoice voids

use crate::core::ledger::FeeLedger;
use crate::types::{
    AcademicYearId, AuditAction, AuditEntry, BatchFailure, BatchInvoiceReport, FeeStructureRow,
    Invoice, InvoiceId, InvoiceLineItem, InvoiceStatus, LedgerError, Money, NewInvoice, Posting,
    StudentAccount, StudentId, TermId, TransactionKind, UserId, ValidationIssue,
};
use chrono::Utc;
use tracing::{info, warn};

/// Check line items and return the invoice total
fn validate_line_items(line_items: &[InvoiceLineItem]) -> Result<Money, LedgerError> {
    let mut issues = Vec::new();

    if line_items.is_empty() {
        issues.push(ValidationIssue::new("line_items", "invoice has no line items"));
    }

    for (index, item) in line_items.iter().enumerate() {
        if item.fee_category.trim().is_empty() {
            issues.push(ValidationIssue::at_row(index + 1, "fee_category", "is blank"));
        }
        if !item.amount.is_positive() {
            issues.push(ValidationIssue::at_row(
                index + 1,
                "amount",
                format!("must be positive, got {}", item.amount),
            ));
        }
    }

    if !issues.is_empty() {
        return Err(LedgerError::validation_issues("invalid invoice", issues));
    }

    Money::checked_sum(line_items.iter().map(|item| item.amount))
        .ok_or_else(|| LedgerError::validation("invoice total is out of range"))
}

/// One line item per fee category, in the order categories first appear
fn line_items_from(rows: &[FeeStructureRow]) -> Result<Vec<InvoiceLineItem>, LedgerError> {
    let mut items: Vec<InvoiceLineItem> = Vec::new();

    for row in rows {
        let category = row.fee_category.trim();
        match items.iter_mut().find(|item| item.fee_category == category) {
            Some(item) => {
                item.amount = item
                    .amount
                    .checked_add(row.amount)
                    .ok_or_else(|| LedgerError::validation("fee category total is out of range"))?;
            }
            None => items.push(InvoiceLineItem {
                fee_category: category.to_string(),
                amount: row.amount,
            }),
        }
    }

    Ok(items)
}

impl FeeLedger {
    /// Issue a single invoice
    ///
    /// Posts an `Invoice` transaction of `+total` and raises the student's
    /// balance by the same amount.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing, blank or non-positive line items
    /// - `NotFound` for an unregistered student
    /// - `DuplicateInvoice` if the student already holds a live invoice for
    ///   the academic year and term
    pub fn create_invoice(&self, request: NewInvoice, actor: UserId) -> Result<Invoice, LedgerError> {
        let total = validate_line_items(&request.line_items)?;

        let invoice = self.accounts.with_account(request.student, |account| {
            self.issue_invoice_locked(account, request, total, actor)
        })?;

        self.record_audit(
            AuditEntry::new(actor, AuditAction::Create, "invoices", invoice.id).after(&invoice),
        );
        info!(
            student = invoice.student,
            invoice = %invoice.invoice_number,
            total = %invoice.total,
            "invoice created"
        );
        Ok(invoice)
    }

    fn issue_invoice_locked(
        &self,
        account: &mut StudentAccount,
        request: NewInvoice,
        total: Money,
        actor: UserId,
    ) -> Result<Invoice, LedgerError> {
        let student = account.student;
        if let Some(existing) =
            self.live_invoice_for_term(student, request.academic_year, request.term)
        {
            return Err(LedgerError::duplicate_invoice(
                student,
                request.academic_year,
                request.term,
                existing,
            ));
        }

        let id = self.sequences.next_invoice();
        let invoice = Invoice {
            id,
            invoice_number: format!("INV-{:06}", id),
            student,
            academic_year: request.academic_year,
            term: request.term,
            line_items: request.line_items,
            total,
            balance: total,
            status: InvoiceStatus::Open,
            created_by: actor,
            created_at: Utc::now(),
            void_reason: None,
        };

        self.post(
            account,
            vec![Posting {
                kind: TransactionKind::Invoice,
                amount: total,
                reference: id,
                bank_account: None,
                description: format!(
                    "{} for year {} term {}",
                    invoice.invoice_number, invoice.academic_year, invoice.term
                ),
            }],
            actor,
        )?;

        self.invoices.insert(id, invoice.clone());
        self.student_invoices.entry(student).or_default().push(id);
        Ok(invoice)
    }

    /// The student's non-void invoice for a term, if any
    pub(crate) fn live_invoice_for_term(
        &self,
        student: StudentId,
        academic_year: AcademicYearId,
        term: TermId,
    ) -> Option<InvoiceId> {
        self.invoices_for(student)
            .into_iter()
            .find(|invoice| {
                invoice.is_live() && invoice.academic_year == academic_year && invoice.term == term
            })
            .map(|invoice| invoice.id)
    }

    /// Invoice every active student for a term from the fee structure
    ///
    /// Each student is invoiced in its own critical section, so one failure
    /// never affects the others. Students that already hold a live invoice
    /// for the term are skipped; students with no matching fee rows are
    /// reported as failures.
    pub fn generate_batch_invoices(
        &self,
        academic_year: AcademicYearId,
        term: TermId,
        actor: UserId,
    ) -> BatchInvoiceReport {
        let mut report = BatchInvoiceReport::default();

        for account in self.accounts.active() {
            let student = account.student;

            if self.live_invoice_for_term(student, academic_year, term).is_some() {
                report.skipped.push(student);
                continue;
            }

            let rows = self.fee_schedule().rows_for(
                academic_year,
                term,
                &account.stream,
                account.student_type,
            );
            if rows.is_empty() {
                let error = LedgerError::validation(format!(
                    "no fee structure for stream '{}' ({}) in year {} term {}",
                    account.stream, account.student_type, academic_year, term
                ));
                warn!(student, %error, "batch invoice failed");
                report.failures.push(BatchFailure { student, error });
                continue;
            }

            let result = line_items_from(&rows).and_then(|line_items| {
                self.create_invoice(
                    NewInvoice {
                        student,
                        academic_year,
                        term,
                        line_items,
                    },
                    actor,
                )
            });

            match result {
                Ok(invoice) => report.created.push(invoice.id),
                Err(LedgerError::DuplicateInvoice { .. }) => report.skipped.push(student),
                Err(error) => {
                    warn!(student, %error, "batch invoice failed");
                    report.failures.push(BatchFailure { student, error });
                }
            }
        }

        report.count = report.created.len();
        info!(
            academic_year,
            term,
            created = report.count,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "batch invoicing finished"
        );
        report
    }

    /// Void an invoice that has no payments or credit applied
    ///
    /// Posts an `InvoiceVoid` transaction of `-balance`. The invoice is kept
    /// with status `VOID` and the reason recorded.
    pub fn void_invoice(
        &self,
        invoice: InvoiceId,
        reason: &str,
        actor: UserId,
    ) -> Result<Invoice, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("void reason is required"));
        }

        let student = self
            .invoice(invoice)
            .ok_or_else(|| LedgerError::not_found("invoice", invoice))?
            .student;

        let (before, after) = self.accounts.with_account(student, |account| {
            let current = self
                .invoice(invoice)
                .ok_or_else(|| LedgerError::not_found("invoice", invoice))?;

            if current.status == InvoiceStatus::Void {
                return Err(LedgerError::invalid_state(
                    "invoice",
                    invoice,
                    "void",
                    "invoice is already void",
                ));
            }
            if current.balance != current.total {
                return Err(LedgerError::invalid_state(
                    "invoice",
                    invoice,
                    "void",
                    "payments or credit are applied to it; void those first",
                ));
            }

            let amount = current
                .balance
                .checked_neg()
                .ok_or_else(|| LedgerError::arithmetic_overflow("invoice void", student))?;
            self.post(
                account,
                vec![Posting {
                    kind: TransactionKind::InvoiceVoid,
                    amount,
                    reference: invoice,
                    bank_account: None,
                    description: format!("Void {}: {}", current.invoice_number, reason),
                }],
                actor,
            )?;

            let mut voided = current.clone();
            voided.status = InvoiceStatus::Void;
            voided.balance = Money::ZERO;
            voided.void_reason = Some(reason.to_string());
            self.invoices.insert(invoice, voided.clone());
            Ok((current, voided))
        })?;

        self.record_audit(
            AuditEntry::new(actor, AuditAction::Void, "invoices", invoice)
                .before(&before)
                .after(&after),
        );
        info!(student, invoice = %after.invoice_number, reason, "invoice voided");
        Ok(after)
    }
}
