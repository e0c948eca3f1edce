use ndarray::{Array3, ArrayD, IxDyn};
use num_complex::Complex64;
use tempfile::tempdir;
use xtal_core::{Dataset, Diagnostics, PhaseError};
use xtal_phase::{read_trace, write_trace, ArrayStore};

#[test]
fn datasets_round_trip_through_nested_groups() {
    let dir = tempdir().unwrap();
    let store = ArrayStore::create(dir.path().join("data")).unwrap();
    let volume = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i + 10 * j + 100 * k) as f64);
    store
        .store("/phase/intensity", &Dataset::Real(volume.clone().into_dyn()))
        .unwrap();
    store
        .store("/phase/eMod", &Dataset::Series(vec![0.5, 0.25]))
        .unwrap();
    store.store("/note", &Dataset::Text("P1".to_string())).unwrap();

    assert!(store.contains("/phase/intensity"));
    assert!(store.contains("phase/eMod"));
    assert!(!store.contains("/phase/eCon"));
    assert_eq!(store.load_real3("/phase/intensity").unwrap(), volume);
    assert_eq!(store.load_text("/note").unwrap(), "P1");
    assert_eq!(
        store.names().unwrap(),
        vec!["/note", "/phase/eMod", "/phase/intensity"]
    );

    let reopened = ArrayStore::open(dir.path().join("data")).unwrap();
    assert_eq!(
        reopened.load("/phase/eMod").unwrap(),
        Dataset::Series(vec![0.5, 0.25])
    );
}

#[test]
fn store_overwrites_and_removes() {
    let dir = tempdir().unwrap();
    let store = ArrayStore::create(dir.path()).unwrap();
    store.store("/x", &Dataset::Scalar(1.0)).unwrap();
    store.store("/x", &Dataset::Scalar(2.0)).unwrap();
    assert_eq!(store.load("/x").unwrap(), Dataset::Scalar(2.0));
    assert!(store.remove("/x").unwrap());
    assert!(!store.remove("/x").unwrap());
    assert!(matches!(store.load("/x"), Err(PhaseError::Storage(_))));
}

#[test]
fn loaders_convert_and_check_kinds() {
    let dir = tempdir().unwrap();
    let store = ArrayStore::create(dir.path()).unwrap();
    let ones = ArrayD::from_elem(IxDyn(&[2, 2, 2]), 1.0);
    store.store("/real", &Dataset::Real(ones)).unwrap();
    store
        .store("/flat", &Dataset::Real(ArrayD::zeros(IxDyn(&[8]))))
        .unwrap();

    let complex = store.load_complex3("/real").unwrap();
    assert!(complex.iter().all(|&v| v == Complex64::new(1.0, 0.0)));
    assert!(store.load_mask3("/real").unwrap().iter().all(|&v| v));

    let err = store.load_real3("/flat").unwrap_err();
    assert_eq!(err.info().code, "dataset-rank");
    let err = store.load_text("/real").unwrap_err();
    assert_eq!(err.info().code, "dataset-kind");
}

#[test]
fn invalid_names_and_missing_stores_are_storage_errors() {
    let dir = tempdir().unwrap();
    let store = ArrayStore::create(dir.path()).unwrap();
    assert!(matches!(
        store.store("/../escape", &Dataset::Scalar(0.0)),
        Err(PhaseError::Storage(_))
    ));
    assert!(matches!(store.load("/"), Err(PhaseError::Storage(_))));
    assert!(matches!(
        ArrayStore::open(dir.path().join("missing")),
        Err(PhaseError::Storage(_))
    ));
}

#[test]
fn error_trace_csv_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out/errors.csv");
    let info = Diagnostics {
        emod: vec![0.5, 0.25, 0.125],
        econ: vec![0.1, 0.05, 0.025],
        ..Diagnostics::default()
    };
    write_trace(&path, &info).unwrap();
    let rows = read_trace(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].iteration, 2);
    assert_eq!(rows[1].emod, 0.25);
    assert_eq!(rows[0].econ, 0.1);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("iteration,emod,econ"));
}
