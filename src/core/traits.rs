//! Trait seams for the ledger's external collaborators
//!
//! The ledger consults a fee schedule when generating batch invoices and
//! reports every mutation to an audit sink. Both are owned by the surrounding
//! application, so they are traits with in-crate implementations for the CLI
//! and for tests.

use crate::types::{AcademicYearId, AuditEntry, FeeStructureRow, StudentType, TermId};

/// Lookup of the institution's fee structure
///
/// Implementations must be safe to share across worker threads.
pub trait FeeSchedule: Send + Sync {
    /// Fee rows that apply to a student in the given stream and boarding status
    ///
    /// An empty result means the fee structure has no entry for the
    /// combination, which batch invoicing reports as a failure.
    fn rows_for(
        &self,
        academic_year: AcademicYearId,
        term: TermId,
        stream: &str,
        student_type: StudentType,
    ) -> Vec<FeeStructureRow>;
}

/// Receiver of audit entries for committed mutations
pub trait AuditSink: Send + Sync {
    /// Record one entry
    ///
    /// Called after the mutation is committed and all ledger locks are
    /// released, so a slow sink never blocks other students.
    fn record(&self, entry: AuditEntry);
}
