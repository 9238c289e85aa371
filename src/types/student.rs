//! Student account types
//!
//! A `StudentAccount` is the ledger's view of a student: the profile fields
//! the fee structure is keyed on, plus the two balances the ledger owns.

use super::ids::StudentId;
use super::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boarding status, one of the fee-structure keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StudentType {
    Day,
    Boarder,
}

impl fmt::Display for StudentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentType::Day => write!(f, "DAY"),
            StudentType::Boarder => write!(f, "BOARDER"),
        }
    }
}

impl FromStr for StudentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DAY" => Ok(StudentType::Day),
            "BOARDER" | "BOARDING" => Ok(StudentType::Boarder),
            other => Err(format!("Unknown student type: '{}'", other)),
        }
    }
}

/// Student details supplied by the student directory at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student: StudentId,
    /// Class stream, e.g. "Form 2"
    pub stream: String,
    pub student_type: StudentType,
    /// Inactive students are left out of batch invoicing
    pub active: bool,
}

impl StudentProfile {
    /// An active day student with no stream, used when a student is first
    /// seen in a replayed journal
    pub fn placeholder(student: StudentId) -> Self {
        StudentProfile {
            student,
            stream: String::new(),
            student_type: StudentType::Day,
            active: true,
        }
    }
}

/// Ledger state of one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentAccount {
    pub student: StudentId,
    pub stream: String,
    pub student_type: StudentType,
    pub active: bool,

    /// Outstanding fees
    ///
    /// Always equal to the sum of the student's ledger transaction amounts.
    pub balance: Money,

    /// Surplus funds available to settle future invoices
    ///
    /// Always equal to the sum of the student's credit transaction amounts.
    pub credit_balance: Money,
}

impl StudentAccount {
    /// Open an account with zero balances
    pub fn new(profile: StudentProfile) -> Self {
        StudentAccount {
            student: profile.student,
            stream: profile.stream,
            student_type: profile.student_type,
            active: profile.active,
            balance: Money::ZERO,
            credit_balance: Money::ZERO,
        }
    }
}
