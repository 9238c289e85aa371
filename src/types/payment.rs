//! Payment and receipt types

use super::ids::{BankAccountId, InvoiceId, PaymentId, StudentId, TermId, TransactionId, UserId};
use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the money was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
    BankTransfer,
    Cheque,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Mpesa => "MPESA",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cheque => "CHEQUE",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "CASH" => Ok(PaymentMethod::Cash),
            "MPESA" | "M_PESA" => Ok(PaymentMethod::Mpesa),
            "BANK" | "BANK_TRANSFER" | "TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "CHEQUE" | "CHECK" => Ok(PaymentMethod::Cheque),
            _ => Err(format!("Unknown payment method: '{}'", s.trim())),
        }
    }
}

/// Payment lifecycle; `Voided` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Posted,
    Voided,
}

/// Request to record a payment
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub student: StudentId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// External reference, e.g. an M-Pesa code or cheque number
    pub reference: String,
    /// Caller-supplied token that makes retries safe
    pub idempotency_key: String,
    pub description: Option<String>,
    /// Term whose invoice should be settled first
    pub term: Option<TermId>,
    /// Institution account the money was deposited into, if known
    pub bank_account: Option<BankAccountId>,
    pub actor: UserId,
}

/// Portion of a payment applied to one invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub invoice: InvoiceId,
    pub amount: Money,
}

/// Receipt handed back to the payer
///
/// Balances are captured when the payment is recorded, so reprinting a
/// receipt later shows the position at that moment, not the live balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub receipt_number: String,
    pub payment: PaymentId,
    /// Reference of the ledger transaction that posted the payment
    pub transaction_ref: String,
    pub amount: Money,
    pub new_balance: Money,
    pub credit_balance: Money,
    pub issued_at: DateTime<Utc>,
}

/// A recorded payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student: StudentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: String,
    pub receipt_number: String,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub term: Option<TermId>,
    pub bank_account: Option<BankAccountId>,
    pub status: PaymentStatus,
    pub allocations: Vec<Allocation>,
    /// Part of the amount that exceeded the outstanding balance and went to
    /// the credit wallet
    pub surplus: Money,
    /// Ledger transaction that posted this payment
    pub transaction: TransactionId,
    pub receipt: Receipt,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub voided_by: Option<UserId>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Result of voiding a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidOutcome {
    pub payment: PaymentId,
    /// Ledger transaction that reversed the payment
    pub reversal: TransactionId,
    pub new_balance: Money,
    pub credit_balance: Money,
}

/// Result of applying credit to an invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditApplication {
    pub invoice: InvoiceId,
    pub amount: Money,
    pub transaction: TransactionId,
    pub invoice_balance: Money,
    pub new_balance: Money,
    pub credit_balance: Money,
}
