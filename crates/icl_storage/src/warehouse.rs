#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use icl_contracts::submission::{InputDataRow, ModelResultRow, SubmissionId};
use icl_contracts::{ContractViolation, Validate};

pub const INPUT_DATA_TABLE: &str = "app_ingress.input_data";
pub const MODEL_RESULTS_TABLE: &str = "model_results.model_v1";

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation { table: &'static str, key: String },
    DuplicateKey { table: &'static str, key: String },
    AppendOnlyViolation { table: &'static str },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignKeyViolation { table, key } => {
                write!(f, "{table}: unknown referenced key {key}")
            }
            Self::DuplicateKey { table, key } => write!(f, "{table}: duplicate key {key}"),
            Self::AppendOnlyViolation { table } => write!(f, "{table}: table is append-only"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

/// Append-only warehouse destination for the two submission tables. No row is
/// ever updated or deleted; concurrent writers are safe because nothing is
/// read-modified-written. Every append re-validates the row.
#[derive(Debug, Clone, Default)]
pub struct WarehouseStore {
    input_data: Vec<InputDataRow>,
    model_results: Vec<ModelResultRow>,
    input_ids: BTreeSet<SubmissionId>,
    model_ids: BTreeSet<SubmissionId>,
}

impl WarehouseStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    pub fn append_input_data_row(&mut self, row: InputDataRow) -> Result<(), StorageError> {
        row.validate()?;
        if self.input_ids.contains(&row.id) {
            return Err(StorageError::DuplicateKey {
                table: INPUT_DATA_TABLE,
                key: row.id.as_str().to_string(),
            });
        }
        self.input_ids.insert(row.id.clone());
        self.input_data.push(row);
        Ok(())
    }

    pub fn append_model_result_row(&mut self, row: ModelResultRow) -> Result<(), StorageError> {
        row.validate()?;
        if !self.input_ids.contains(&row.id) {
            return Err(StorageError::ForeignKeyViolation {
                table: MODEL_RESULTS_TABLE,
                key: row.id.as_str().to_string(),
            });
        }
        if self.model_ids.contains(&row.id) {
            return Err(StorageError::DuplicateKey {
                table: MODEL_RESULTS_TABLE,
                key: row.id.as_str().to_string(),
            });
        }
        self.model_ids.insert(row.id.clone());
        self.model_results.push(row);
        Ok(())
    }

    pub fn input_data_rows(&self) -> &[InputDataRow] {
        &self.input_data
    }

    pub fn model_result_rows(&self) -> &[ModelResultRow] {
        &self.model_results
    }

    pub fn input_row_by_id(&self, id: &SubmissionId) -> Option<&InputDataRow> {
        self.input_data.iter().find(|row| &row.id == id)
    }

    pub fn model_row_by_id(&self, id: &SubmissionId) -> Option<&ModelResultRow> {
        self.model_results.iter().find(|row| &row.id == id)
    }
}
