#![forbid(unsafe_code)]

use icl_contracts::measurement::{Auge, Geschlecht, MeasurementRecord};
use icl_contracts::submission::{
    CreatedAt, DerivedFigures, InputDataRow, ModelResultRow, SubmissionId,
};
use icl_storage::warehouse::{StorageError, WarehouseStore, MODEL_RESULTS_TABLE};

fn record() -> MeasurementRecord {
    MeasurementRecord::v1(
        Geschlecht::Female,
        61,
        Auge::Od,
        12.5,
        3.0,
        35.0,
        35.0,
        12.0,
        11.0,
        250,
        11.0,
        250,
        11.0,
        1000,
        6.0,
        11.0,
        11.0,
        -3.0,
        -0.5,
        90,
    )
    .unwrap()
}

fn id(n: u8) -> SubmissionId {
    SubmissionId::new(format!("9f1b2c3d-4e5f-4a6b-8c7d-0123456789{n:02x}")).unwrap()
}

fn model_row(id: SubmissionId) -> ModelResultRow {
    ModelResultRow::v1(
        id,
        DerivedFigures {
            sts_cbid_impl_s: -1.5,
            sts_cbid_lr: 625.0,
            vault: 696.0,
        },
        CreatedAt::new("2024-03-01").unwrap(),
    )
    .unwrap()
}

fn store_with_input(n: u8) -> WarehouseStore {
    let mut s = WarehouseStore::new_in_memory();
    s.append_input_data_row(InputDataRow::v1(record(), id(n)).unwrap())
        .unwrap();
    s
}

#[test]
fn at_model_db_01_append_requires_existing_input_row() {
    let mut s = store_with_input(1);
    s.append_model_result_row(model_row(id(1))).unwrap();
    assert_eq!(s.model_result_rows().len(), 1);

    let err = s.append_model_result_row(model_row(id(2))).unwrap_err();
    assert_eq!(
        err,
        StorageError::ForeignKeyViolation {
            table: MODEL_RESULTS_TABLE,
            key: id(2).as_str().to_string(),
        }
    );
}

#[test]
fn at_model_db_02_one_result_row_per_submission_id() {
    let mut s = store_with_input(1);
    s.append_model_result_row(model_row(id(1))).unwrap();

    let err = s.append_model_result_row(model_row(id(1))).unwrap_err();
    assert_eq!(
        err,
        StorageError::DuplicateKey {
            table: MODEL_RESULTS_TABLE,
            key: id(1).as_str().to_string(),
        }
    );
    assert_eq!(s.model_result_rows().len(), 1);
}

#[test]
fn at_model_db_03_lookup_by_id_returns_appended_row() {
    let mut s = store_with_input(1);
    s.append_model_result_row(model_row(id(1))).unwrap();

    let row = s.model_row_by_id(&id(1)).unwrap();
    assert_eq!(row.sts_cbid_impl_s, -1.5);
    assert_eq!(row.sts_cbid_lr, 625.0);
    assert_eq!(row.created_at, CreatedAt::new("2024-03-01").unwrap());
    assert!(s.model_row_by_id(&id(2)).is_none());
}

#[test]
fn at_model_db_04_non_finite_figures_are_refused() {
    let mut s = store_with_input(1);
    let row = ModelResultRow {
        id: id(1),
        sts_cbid_impl_s: f64::INFINITY,
        sts_cbid_lr: 625.0,
        vault: 696.0,
        created_at: CreatedAt::new("2024-03-01").unwrap(),
    };
    assert!(matches!(
        s.append_model_result_row(row),
        Err(StorageError::ContractViolation(_))
    ));
    assert!(s.model_result_rows().is_empty());
}
