mod common;

use chrono::NaiveDate;
use common::TestWorkspace;
use sheet_sync::{
    data::Value,
    inference::{IntegerWidth, StorageType, infer_schema},
    mapping::ColumnMapping,
    source::{SourceOptions, load_dataset},
};

#[test]
fn workbook_cells_keep_spreadsheet_types() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_customer_workbook("customers.xlsx");

    let dataset = load_dataset(&path, &SourceOptions::default()).expect("load workbook");
    assert_eq!(
        dataset.headers(),
        ["Customer ID", "Name", "Balance", "Joined", "Active"]
    );
    assert_eq!(dataset.len(), 3);
    let first = &dataset.rows()[0];
    assert_eq!(first[0], Some(Value::Integer(1)));
    assert_eq!(first[1], Some(Value::String("Ada".into())));
    assert_eq!(first[2], Some(Value::Float(10.5)));
    assert_eq!(
        first[3],
        Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
    );
    assert_eq!(first[4], Some(Value::Boolean(true)));
    assert_eq!(dataset.rows()[1][2], Some(Value::Integer(20)));
}

#[test]
fn workbook_types_drive_inference() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_customer_workbook("customers.xlsx");
    let dataset = load_dataset(&path, &SourceOptions::default()).expect("load workbook");

    let mapping = ColumnMapping::identity(dataset.headers(), true);
    let inferred = infer_schema(&dataset, Some(&mapping));
    let names = inferred.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["customer_id", "name", "balance", "joined", "active"]);
    assert_eq!(
        inferred[0].storage,
        StorageType::Integer {
            width: IntegerWidth::Tiny,
            unsigned: true
        }
    );
    assert_eq!(inferred[1].storage, StorageType::VarChar(5));
    assert_eq!(inferred[2].storage, StorageType::Double);
    assert_eq!(inferred[3].storage, StorageType::Date);
    assert_eq!(inferred[4].storage.to_string(), "TINYINT UNSIGNED");
}

#[test]
fn named_worksheet_must_exist() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_customer_workbook("customers.xlsx");
    let options = SourceOptions {
        sheet: Some("Orders".into()),
        ..SourceOptions::default()
    };
    assert!(load_dataset(&path, &options).is_err());

    let options = SourceOptions {
        sheet: Some("Customers".into()),
        ..SourceOptions::default()
    };
    assert_eq!(load_dataset(&path, &options).unwrap().len(), 3);
}

#[test]
fn delimited_fields_are_typed_like_a_spreadsheet() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "orders.csv",
        "order,code,amount,placed,paid,note\n\
         1,007,12.50,2024-05-01,true,\n\
         2,008,3,2024-05-02 10:30:00,false,NA\n\
         ,,,,,\n",
    );

    let dataset = load_dataset(&path, &SourceOptions::default()).expect("load csv");
    assert_eq!(dataset.len(), 2, "blank rows are skipped");
    let first = &dataset.rows()[0];
    assert_eq!(first[0], Some(Value::Integer(1)));
    assert_eq!(first[1], Some(Value::String("007".into())));
    assert_eq!(first[2], Some(Value::Float(12.5)));
    assert_eq!(first[4], Some(Value::Boolean(true)));
    assert_eq!(first[5], None);
    assert!(matches!(dataset.rows()[1][3], Some(Value::DateTime(_))));
    assert_eq!(dataset.rows()[1][5], None);
}

#[test]
fn tab_separated_and_custom_delimiters() {
    let workspace = TestWorkspace::new();
    let tsv = workspace.write("people.tsv", "id\tname\n1\tAda\n");
    let dataset = load_dataset(&tsv, &SourceOptions::default()).unwrap();
    assert_eq!(dataset.headers(), ["id", "name"]);

    let semi = workspace.write("people.txt", "id;name\n1;Ada\n");
    let options = SourceOptions {
        delimiter: Some(b';'),
        ..SourceOptions::default()
    };
    let dataset = load_dataset(&semi, &options).unwrap();
    assert_eq!(dataset.rows()[0][1], Some(Value::String("Ada".into())));
}

#[test]
fn blank_and_repeated_headers_are_renamed() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("dupes.csv", "name,,name\nA,B,C\n");
    let dataset = load_dataset(&path, &SourceOptions::default()).unwrap();
    assert_eq!(dataset.headers(), ["name", "Unnamed: 1", "name.1"]);
}

#[test]
fn header_only_sources_fail_validation() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "id,name\n");
    let dataset = load_dataset(&path, &SourceOptions::default()).unwrap();
    let err = dataset.validate().unwrap_err();
    assert!(err.to_string().contains("contains no data"));
}

#[test]
fn unknown_extensions_are_rejected() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("notes.pdf", "id\n1\n");
    assert!(load_dataset(&path, &SourceOptions::default()).is_err());
}
