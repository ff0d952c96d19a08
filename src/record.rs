//! Canonical document model and its validation contract.
//!
//! A [`DocumentRecord`] is produced by an extraction adapter from exactly one
//! backend response and never mutated afterwards. [`DocumentRecord::validate`]
//! consumes it together with its [`Provenance`] and yields a
//! [`ProcessingResult`], which is what every export writer receives.
//!
//! Validation never rejects a record: numeric disagreements and missing fields
//! are reported as [`ValidationIssue`]s and folded into a [`ValidationStatus`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Receipt,
    ServiceBill,
    RentalAgreement,
    SupplyDocument,
    Unknown,
}

impl DocumentType {
    const ALL: [DocumentType; 6] = [
        DocumentType::Invoice,
        DocumentType::Receipt,
        DocumentType::ServiceBill,
        DocumentType::RentalAgreement,
        DocumentType::SupplyDocument,
        DocumentType::Unknown,
    ];

    /// Classify a label reported by a backend.
    ///
    /// The snake_case tags the extraction prompt asks for match exactly. Any
    /// other label is split into words, and a family matches when one of its
    /// stems starts a word. Anything else is `Unknown`, never an error.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return DocumentType::Unknown;
        }
        let tag = label.replace([' ', '-'], "_");
        if let Some(exact) = Self::ALL.into_iter().find(|t| t.as_str() == tag) {
            return exact;
        }

        let words: Vec<&str> = label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |stems: &[&str]| {
            words
                .iter()
                .any(|word| stems.iter().any(|stem| word.starts_with(stem)))
        };

        if has(&["rent", "lease", "оренд", "аренд"]) {
            DocumentType::RentalAgreement
        } else if has(&["service", "акт", "послуг", "услуг", "work", "робіт", "работ"]) {
            DocumentType::ServiceBill
        } else if has(&["receipt", "чек", "check"]) {
            DocumentType::Receipt
        } else if has(&["supply", "delivery", "waybill", "ттн", "постав"]) {
            DocumentType::SupplyDocument
        } else if has(&["invoice", "bill", "накладн", "рахун", "счет", "счёт"]) {
            DocumentType::Invoice
        } else {
            DocumentType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
            DocumentType::ServiceBill => "service_bill",
            DocumentType::RentalAgreement => "rental_agreement",
            DocumentType::SupplyDocument => "supply_document",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl Default for DocumentType {
    fn default() -> Self {
        DocumentType::Unknown
    }
}

/// Supplier or customer block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub tax_id: Option<String>,
    pub address: Option<String>,
}

impl Party {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_type: DocumentType,
    pub document_number: String,
    pub document_date: Option<NaiveDate>,
    pub supplier: Party,
    pub customer: Party,
    pub line_items: Vec<LineItem>,
    pub currency: String,
    pub total_amount: Decimal,
    pub confidence: Option<f64>,
    /// Defaults substituted or values derived while normalizing the backend payload.
    #[serde(default)]
    pub normalization_notes: Vec<String>,
}

impl DocumentRecord {
    /// Sum of line totals, or `None` on decimal overflow.
    pub fn line_total_sum(&self) -> Option<Decimal> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total))
    }

    /// Run every check against `policy` without consuming the record.
    pub fn check(&self, policy: &ValidationPolicy) -> (ValidationStatus, Vec<ValidationIssue>) {
        let mut issues = Vec::new();

        if self.document_date.is_none() {
            issues.push(ValidationIssue::warning("document_date", "date absent or unparseable"));
        }
        if self.document_type == DocumentType::Unknown {
            issues.push(ValidationIssue::warning("document_type", "document type not recognized"));
        }
        if self.supplier.name.trim().is_empty() {
            issues.push(ValidationIssue::warning("supplier.name", "supplier not recognized"));
        }

        for (idx, item) in self.line_items.iter().enumerate() {
            check_line_item(idx, item, policy, &mut issues);
        }

        match self.line_total_sum() {
            Some(sum) => {
                let deviation = (sum - self.total_amount).abs();
                match policy.classify(deviation, self.total_amount) {
                    Deviation::Exact => {}
                    Deviation::Loose => issues.push(ValidationIssue::warning(
                        "total_amount",
                        format!(
                            "line items sum to {sum}, document total is {}",
                            self.total_amount
                        ),
                    )),
                    Deviation::Beyond => issues.push(ValidationIssue::error(
                        "total_amount",
                        format!(
                            "line items sum to {sum}, document total is {}",
                            self.total_amount
                        ),
                    )),
                }
            }
            None => issues.push(ValidationIssue::error("line_items", "line totals overflow")),
        }

        for note in &self.normalization_notes {
            issues.push(ValidationIssue::warning("normalization", note.clone()));
        }

        (ValidationStatus::from_issues(&issues), issues)
    }

    /// Validate the record and wrap it, with its provenance, into a [`ProcessingResult`].
    pub fn validate(self, provenance: Provenance, policy: &ValidationPolicy) -> ProcessingResult {
        let (validation_status, issues) = self.check(policy);
        tracing::debug!(
            status = %validation_status,
            issues = issues.len(),
            document_number = %self.document_number,
            "[VALIDATE] Record validated"
        );
        ProcessingResult {
            record: self,
            provenance,
            validation_status,
            issues,
        }
    }
}

fn check_line_item(
    idx: usize,
    item: &LineItem,
    policy: &ValidationPolicy,
    issues: &mut Vec<ValidationIssue>,
) {
    let field = |name: &str| format!("line_items[{idx}].{name}");

    if item.description.trim().is_empty() {
        issues.push(ValidationIssue::error(field("description"), "description is empty"));
    }
    if item.quantity.is_sign_negative() && !item.quantity.is_zero() {
        issues.push(ValidationIssue::error(field("quantity"), "quantity is negative"));
    }
    if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
        issues.push(ValidationIssue::error(field("unit_price"), "unit price is negative"));
    }

    let Some(expected) = item.quantity.checked_mul(item.unit_price) else {
        issues.push(ValidationIssue::error(field("line_total"), "quantity * unit price overflows"));
        return;
    };
    let deviation = (expected - item.line_total).abs();
    let message = || {
        format!(
            "{} x {} = {expected}, source says {}",
            item.quantity, item.unit_price, item.line_total
        )
    };
    match policy.classify(deviation, item.line_total) {
        Deviation::Exact => {}
        Deviation::Loose => issues.push(ValidationIssue::warning(field("line_total"), message())),
        Deviation::Beyond => issues.push(ValidationIssue::error(field("line_total"), message())),
    }
}

/// Numeric tolerances applied by [`DocumentRecord::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Absolute deviation still considered an exact match.
    pub tolerance: Decimal,
    /// Looser bound, as a fraction of the reference amount, that downgrades to a warning.
    pub warning_ratio: Decimal,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
            warning_ratio: Decimal::new(1, 2),
        }
    }
}

enum Deviation {
    Exact,
    Loose,
    Beyond,
}

impl ValidationPolicy {
    fn classify(&self, deviation: Decimal, reference: Decimal) -> Deviation {
        if deviation <= self.tolerance {
            return Deviation::Exact;
        }
        let loose = self
            .warning_ratio
            .checked_mul(reference.abs())
            .unwrap_or(Decimal::MAX)
            .max(self.tolerance);
        if deviation <= loose {
            Deviation::Loose
        } else {
            Deviation::Beyond
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    ValidWithWarnings,
    Invalid,
}

impl ValidationStatus {
    fn from_issues(issues: &[ValidationIssue]) -> Self {
        if issues.iter().any(|i| i.severity == Severity::Error) {
            ValidationStatus::Invalid
        } else if issues.is_empty() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::ValidWithWarnings
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::ValidWithWarnings => "valid_with_warnings",
            ValidationStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Which AI backend produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceBackend {
    Gemini,
    N8n,
}

impl SourceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceBackend::Gemini => "gemini",
            SourceBackend::N8n => "n8n",
        }
    }
}

impl fmt::Display for SourceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(SourceBackend::Gemini),
            "n8n" => Ok(SourceBackend::N8n),
            other => Err(format!("unknown backend '{other}', expected gemini or n8n")),
        }
    }
}

/// Where a record came from; kept for audit next to the record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_backend: SourceBackend,
    pub raw_backend_payload: serde_json::Value,
    pub payload_sha256: String,
    pub run_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub file_name: String,
    pub project: Option<String>,
}

impl Provenance {
    pub fn new(
        source_backend: SourceBackend,
        raw_backend_payload: serde_json::Value,
        file_name: impl Into<String>,
        project: Option<String>,
    ) -> Self {
        let payload_sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(raw_backend_payload.to_string().as_bytes());
            format!("{:x}", hasher.finalize())
        };
        Self {
            source_backend,
            raw_backend_payload,
            payload_sha256,
            run_id: Uuid::new_v4(),
            received_at: Utc::now(),
            file_name: file_name.into(),
            project,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub record: DocumentRecord,
    pub provenance: Provenance,
    pub validation_status: ValidationStatus,
    pub issues: Vec<ValidationIssue>,
}
