#![forbid(unsafe_code)]

use icl_contracts::measurement::{Auge, Geschlecht, MeasurementRecord};
use icl_contracts::submission::{InputDataRow, SubmissionId};
use icl_storage::repo::WarehouseRepo;
use icl_storage::warehouse::{StorageError, WarehouseStore, INPUT_DATA_TABLE};

fn record() -> MeasurementRecord {
    MeasurementRecord::v1(
        Geschlecht::Male,
        42,
        Auge::Os,
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

#[test]
fn at_input_db_01_append_stores_row_in_order() {
    let mut s = WarehouseStore::new_in_memory();
    s.append_input_data_row(InputDataRow::v1(record(), id(1)).unwrap())
        .unwrap();
    s.append_input_data_row(InputDataRow::v1(record(), id(2)).unwrap())
        .unwrap();

    let rows = s.input_data_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, id(1));
    assert_eq!(rows[1].id, id(2));
    assert!(s.input_row_by_id(&id(2)).is_some());
    assert!(s.input_row_by_id(&id(3)).is_none());
}

#[test]
fn at_input_db_02_duplicate_id_is_refused() {
    let mut s = WarehouseStore::new_in_memory();
    s.append_input_data_row(InputDataRow::v1(record(), id(1)).unwrap())
        .unwrap();

    let err = s
        .append_input_data_row(InputDataRow::v1(record(), id(1)).unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::DuplicateKey {
            table: INPUT_DATA_TABLE,
            key: id(1).as_str().to_string(),
        }
    );
    assert_eq!(s.input_data_rows().len(), 1);
}

#[test]
fn at_input_db_03_identical_fields_under_new_id_are_independent_rows() {
    let mut s = WarehouseStore::new_in_memory();
    s.append_input_data_row(InputDataRow::v1(record(), id(1)).unwrap())
        .unwrap();
    s.append_input_data_row(InputDataRow::v1(record(), id(2)).unwrap())
        .unwrap();

    let rows = s.input_data_rows();
    assert_eq!(rows[0].record, rows[1].record);
    assert_ne!(rows[0].id, rows[1].id);
}

#[test]
fn at_input_db_04_invalid_record_is_refused_at_append() {
    let mut s = WarehouseStore::new_in_memory();
    let mut bad = record();
    bad.achse = 200;
    let row = InputDataRow {
        record: bad,
        id: id(1),
    };
    assert!(matches!(
        s.append_input_data_row(row),
        Err(StorageError::ContractViolation(_))
    ));
    assert!(s.input_data_rows().is_empty());
}

#[test]
fn at_input_db_05_repo_trait_exposes_same_wiring() {
    let mut s = WarehouseStore::new_in_memory();
    let repo: &mut dyn WarehouseRepo = &mut s;
    repo.append_input_data_row(InputDataRow::v1(record(), id(1)).unwrap())
        .unwrap();
    assert_eq!(repo.input_data_rows().len(), 1);
    assert!(repo.model_result_rows().is_empty());
}
