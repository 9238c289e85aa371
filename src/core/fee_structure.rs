//! In-memory fee structure

use crate::core::traits::FeeSchedule;
use crate::io::csv_format::read_fee_structure;
use crate::types::{AcademicYearId, FeeStructureRow, LedgerError, StudentType, TermId};
use std::fs::File;
use std::path::Path;

/// Fee structure held in memory, loadable from CSV
///
/// Streams are compared case-insensitively and ignoring surrounding
/// whitespace, since they are typed by hand in spreadsheets.
#[derive(Debug, Clone, Default)]
pub struct FeeStructure {
    rows: Vec<FeeStructureRow>,
}

impl FeeStructure {
    pub fn new(rows: Vec<FeeStructureRow>) -> Self {
        Self { rows }
    }

    /// Load a fee structure from a CSV file with columns
    /// `academic_year,term,stream,student_type,fee_category,amount`
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path)?;
        Ok(Self::new(read_fee_structure(file)?))
    }

    pub fn rows(&self) -> &[FeeStructureRow] {
        &self.rows
    }
}

impl FeeSchedule for FeeStructure {
    fn rows_for(
        &self,
        academic_year: AcademicYearId,
        term: TermId,
        stream: &str,
        student_type: StudentType,
    ) -> Vec<FeeStructureRow> {
        let stream = stream.trim();
        self.rows
            .iter()
            .filter(|row| {
                row.academic_year == academic_year
                    && row.term == term
                    && row.student_type == student_type
                    && row.stream.trim().eq_ignore_ascii_case(stream)
            })
            .cloned()
            .collect()
    }
}
