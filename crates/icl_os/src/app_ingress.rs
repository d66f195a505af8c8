#![forbid(unsafe_code)]

use icl_contracts::identity::Identity;
use icl_contracts::measurement::MeasurementRecord;
use icl_contracts::submission::{
    CreatedAt, DisplayPayload, InputDataRow, ModelResultRow, SubmissionId,
};
use icl_contracts::{ContractViolation, Validate};
use icl_engines::vault_model::VaultModelRuntime;
use icl_storage::repo::WarehouseRepo;
use icl_storage::warehouse::StorageError;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionError {
    Contract(ContractViolation),
    Persistence(StorageError),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contract(v) => write!(f, "invalid submission: {v}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl From<ContractViolation> for SubmissionError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

impl From<StorageError> for SubmissionError {
    fn from(value: StorageError) -> Self {
        Self::Persistence(value)
    }
}

/// Validated-input -> derived-record pipeline. One call per form submission:
/// append the raw record, compute the vault estimate, append the model row,
/// return the confirmation payload. The two appends are sequential and
/// non-transactional; the model append is only attempted after the raw append
/// succeeded, and a failed model append does not roll the raw row back.
#[derive(Debug, Clone)]
pub struct SubmissionPipeline {
    vault_model: VaultModelRuntime,
}

impl SubmissionPipeline {
    pub fn new(vault_model: VaultModelRuntime) -> Self {
        Self { vault_model }
    }

    pub fn submit(
        &self,
        repo: &mut dyn WarehouseRepo,
        record: MeasurementRecord,
        identity: &Identity,
        id: SubmissionId,
        created_at: CreatedAt,
    ) -> Result<DisplayPayload, SubmissionError> {
        identity.validate()?;
        record.validate()?;

        let input_row = InputDataRow::v1(record, id.clone())?;
        repo.append_input_data_row(input_row.clone())?;

        let figures = self.vault_model.run(&input_row.record);
        let model_row = ModelResultRow::v1(id.clone(), figures, created_at.clone())?;
        repo.append_model_result_row(model_row)?;

        Ok(DisplayPayload {
            id,
            vault: figures.vault,
            created_at,
        })
    }
}
