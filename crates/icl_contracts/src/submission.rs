#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::measurement::MeasurementRecord;
use crate::{ContractViolation, Validate};

/// Globally unique id assigned at persistence time. Canonical lowercase
/// hyphenated UUID text, the shape already present in the stored data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(id.into());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SubmissionId {
    fn validate(&self) -> Result<(), ContractViolation> {
        let bytes = self.0.as_bytes();
        if bytes.len() != 36 {
            return Err(ContractViolation::InvalidValue {
                field: "id",
                reason: "must be 36 chars",
            });
        }
        for (i, &b) in bytes.iter().enumerate() {
            let ok = match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => b.is_ascii_digit() || (b'a'..=b'f').contains(&b),
            };
            if !ok {
                return Err(ContractViolation::InvalidValue {
                    field: "id",
                    reason: "must be a lowercase hyphenated uuid",
                });
            }
        }
        Ok(())
    }
}

/// Server-side persistence date, `YYYY-MM-DD`. Never user-supplied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CreatedAt(String);

impl CreatedAt {
    pub fn new(date: impl Into<String>) -> Result<Self, ContractViolation> {
        let date = Self(date.into());
        date.validate()?;
        Ok(date)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CreatedAt {
    fn validate(&self) -> Result<(), ContractViolation> {
        let bytes = self.0.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(ContractViolation::InvalidValue {
                field: "created_at",
                reason: "must be YYYY-MM-DD",
            });
        }
        for (i, &b) in bytes.iter().enumerate() {
            if i != 4 && i != 7 && !b.is_ascii_digit() {
                return Err(ContractViolation::InvalidValue {
                    field: "created_at",
                    reason: "must be YYYY-MM-DD",
                });
            }
        }
        let month = (bytes[5] - b'0') * 10 + (bytes[6] - b'0');
        let day = (bytes[8] - b'0') * 10 + (bytes[9] - b'0');
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(ContractViolation::InvalidValue {
                field: "created_at",
                reason: "month or day out of range",
            });
        }
        Ok(())
    }
}

/// Quantities derived from exactly one `MeasurementRecord` by the vault model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFigures {
    pub sts_cbid_impl_s: f64,
    pub sts_cbid_lr: f64,
    pub vault: f64,
}

/// One `app_ingress.input_data` row: the raw record plus its assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDataRow {
    #[serde(flatten)]
    pub record: MeasurementRecord,
    pub id: SubmissionId,
}

impl InputDataRow {
    pub fn v1(record: MeasurementRecord, id: SubmissionId) -> Result<Self, ContractViolation> {
        let row = Self { record, id };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for InputDataRow {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.record.validate()?;
        self.id.validate()
    }
}

/// One `model_results.model_v1` row. Column names are fixed for compatibility
/// with the rows already in the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResultRow {
    pub id: SubmissionId,
    #[serde(rename = "sts_cbid_implS")]
    pub sts_cbid_impl_s: f64,
    pub sts_cbid_lr: f64,
    pub vault: f64,
    pub created_at: CreatedAt,
}

impl ModelResultRow {
    pub fn v1(
        id: SubmissionId,
        figures: DerivedFigures,
        created_at: CreatedAt,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            id,
            sts_cbid_impl_s: figures.sts_cbid_impl_s,
            sts_cbid_lr: figures.sts_cbid_lr,
            vault: figures.vault,
            created_at,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for ModelResultRow {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.created_at.validate()?;
        if !self.sts_cbid_impl_s.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "sts_cbid_implS",
            });
        }
        if !self.sts_cbid_lr.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "sts_cbid_lr",
            });
        }
        if !self.vault.is_finite() {
            return Err(ContractViolation::NotFinite { field: "vault" });
        }
        Ok(())
    }
}

/// On-screen confirmation after a completed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub id: SubmissionId,
    pub vault: f64,
    pub created_at: CreatedAt,
}
