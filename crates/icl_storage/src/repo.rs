#![forbid(unsafe_code)]

use icl_contracts::submission::{InputDataRow, ModelResultRow};

use crate::warehouse::{StorageError, WarehouseStore};

/// Typed warehouse-append interface. The submission pipeline receives this as
/// an explicitly passed handle; there is no ambient process-wide connection.
/// Append is the only write operation the system uses.
pub trait WarehouseRepo {
    fn append_input_data_row(&mut self, row: InputDataRow) -> Result<(), StorageError>;
    fn append_model_result_row(&mut self, row: ModelResultRow) -> Result<(), StorageError>;
    fn input_data_rows(&self) -> &[InputDataRow];
    fn model_result_rows(&self) -> &[ModelResultRow];
}

impl WarehouseRepo for WarehouseStore {
    fn append_input_data_row(&mut self, row: InputDataRow) -> Result<(), StorageError> {
        WarehouseStore::append_input_data_row(self, row)
    }

    fn append_model_result_row(&mut self, row: ModelResultRow) -> Result<(), StorageError> {
        WarehouseStore::append_model_result_row(self, row)
    }

    fn input_data_rows(&self) -> &[InputDataRow] {
        WarehouseStore::input_data_rows(self)
    }

    fn model_result_rows(&self) -> &[ModelResultRow] {
        WarehouseStore::model_result_rows(self)
    }
}
