//
// pseudonymize_workflows.rs
// Dicom-Pseudonymizer-rs
//
// Integration-style tests covering the full pipeline: staging, directory renames, record rewrites, and failure policies.
//

use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use dicom_pseudonymizer::anonymize::anonymize_record;
use dicom_pseudonymizer::config::{Category, PipelineConfig, Taxonomy, UnmappedPolicy};
use dicom_pseudonymizer::dicom_access::IdentityFields;
use dicom_pseudonymizer::mapping::{resolve_by_key, save_table, MappingTable};
use dicom_pseudonymizer::models::RecordOutcome;
use dicom_pseudonymizer::workspace::tree_fingerprint;
use dicom_pseudonymizer::{Pipeline, PseudonymError};
use tempfile::{tempdir, TempDir};

const BROKEN_BYTES: &[u8] = b"this is not a DICOM file";

fn write_test_dicom(path: &Path, patient_name: &str, patient_id: &str) {
    // Tiny Secondary Capture instance carrying the two identity fields.
    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        Tag(0x0010, 0x0010),
        VR::PN,
        PrimitiveValue::from(patient_name),
    ));
    obj.put(DataElement::new(
        Tag(0x0010, 0x0020),
        VR::LO,
        PrimitiveValue::from(patient_id),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0060),
        VR::CS,
        PrimitiveValue::from("OT"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0016),
        VR::UI,
        PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.7"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0018),
        VR::UI,
        PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.1"),
    ));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
        .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1")
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    fs::create_dir_all(path.parent().expect("parent")).expect("create series dir");
    file_obj.write_to_file(path).expect("write test dicom");
}

fn identity_of(path: &Path) -> (Option<String>, Option<String>) {
    let obj = dicom::object::open_file(path).expect("open record");
    let identity = obj.identity();
    (identity.patient_name, identity.patient_id)
}

fn table(pairs: &[(&str, &str)]) -> MappingTable {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

struct Fixture {
    dir: TempDir,
    source: PathBuf,
    global: PathBuf,
    original: PathBuf,
}

impl Fixture {
    fn work_dir(&self) -> PathBuf {
        self.dir.path().join("tmp/incisive2")
    }

    fn config(&self, taxonomy: Taxonomy) -> PipelineConfig {
        PipelineConfig {
            work_dir: self.work_dir(),
            taxonomy,
            unmapped_patients: UnmappedPolicy::Degenerate,
            verify_source: true,
        }
    }
}

fn lung_taxonomy(providers: &[&str]) -> Taxonomy {
    Taxonomy::new(vec![Category {
        name: "lung".into(),
        providers: providers.iter().map(|p| p.to_string()).collect(),
    }])
}

/// Source tree with two mapped patients and one unmapped patient under lung/dp1,
/// and an empty lung/dp2.
fn build_fixture() -> Fixture {
    let dir = tempdir().expect("tempdir");
    let source = dir.path().join("prm/incisive2");

    let dp1 = source.join("lung/dp1/data");
    write_test_dicom(&dp1.join("HOSPA-0001/HOSPA-0001_CT1/series1/IM1.dcm"), "Doe^John", "HOSPA-0001");
    write_test_dicom(&dp1.join("HOSPA-0001/HOSPA-0001_CT1/series1/IM2.dcm"), "Doe^John", "HOSPA-0001");
    fs::write(dp1.join("HOSPA-0001/HOSPA-0001_CT1/series1/broken.dcm"), BROKEN_BYTES).unwrap();
    fs::write(dp1.join("HOSPA-0001/HOSPA-0001_CT1/series1/notes.txt"), b"keep me").unwrap();
    write_test_dicom(&dp1.join("HOSPA-0002/HOSPA-0002_MR1/series1/IM1.dcm"), "Roe^Jane", "HOSPA-0002");
    write_test_dicom(&dp1.join("HOSPA-0007/HOSPA-0007_XR1/series1/IM1.dcm"), "Poe^Ed", "HOSPA-0007");
    save_table(
        &table(&[("0001", "123456"), ("0002", "654321")]),
        &dp1.join("id_mapping_lung.json"),
    )
    .unwrap();

    let dp2 = source.join("lung/dp2/data");
    fs::create_dir_all(&dp2).unwrap();
    save_table(&MappingTable::new(), &dp2.join("id_mapping_lung.json")).unwrap();

    let global = dir.path().join("prm/id_mapping.json");
    let original = dir.path().join("prm/original.json");
    save_table(&table(&[("42", "777"), ("43", "888")]), &global).unwrap();
    save_table(&table(&[("dp1", "42"), ("dp2", "43")]), &original).unwrap();

    Fixture {
        dir,
        source,
        global,
        original,
    }
}

fn dir_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .expect("read dir")
        .map(|e| e.expect("entry"))
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn resolve_by_key_scenario() {
    let fx = build_fixture();
    assert_eq!(resolve_by_key("dp1", &fx.global, &fx.original).unwrap(), "777");
}

#[test]
fn full_run_renames_tree_and_rewrites_records() {
    let fx = build_fixture();
    let report = Pipeline::new(fx.config(lung_taxonomy(&["dp1", "dp2"])))
        .run(&fx.source, &fx.global, &fx.original)
        .expect("pipeline");

    let data = fx.work_dir().join("lung/dp1/data");
    assert_eq!(dir_names(&data), vec!["777-", "777-123456", "777-654321"]);
    assert_eq!(dir_names(&data.join("777-123456")), vec!["777-123456_CT1"]);
    assert_eq!(dir_names(&data.join("777-654321")), vec!["777-654321_MR1"]);
    assert_eq!(dir_names(&data.join("777-")), vec!["777-_XR1"]);

    let series = data.join("777-123456/777-123456_CT1/series1");
    for record in ["IM1.dcm", "IM2.dcm"] {
        assert_eq!(
            identity_of(&series.join(record)),
            (Some("777-123456".into()), Some("777-123456".into()))
        );
    }
    assert_eq!(
        identity_of(&data.join("777-654321/777-654321_MR1/series1/IM1.dcm")),
        (Some("777-654321".into()), Some("777-654321".into()))
    );
    assert_eq!(
        identity_of(&data.join("777-/777-_XR1/series1/IM1.dcm")),
        (Some("777-".into()), Some("777-".into()))
    );

    // The unparseable record and the non-record file are byte-identical.
    assert_eq!(fs::read(series.join("broken.dcm")).unwrap(), BROKEN_BYTES);
    assert_eq!(fs::read(series.join("notes.txt")).unwrap(), b"keep me");

    let dp1 = &report.providers[0];
    assert_eq!(dp1.provider_id, "777");
    assert_eq!(dp1.patients_renamed, 3);
    assert_eq!(dp1.studies_renamed, 3);
    assert_eq!(dp1.records_anonymized, 4);
    assert_eq!(dp1.records_skipped.len(), 1);
    assert!(dp1.records_skipped[0].path.ends_with("broken.dcm"));
    assert_eq!(dp1.unmapped_patients, vec!["0007"]);

    let dp2 = &report.providers[1];
    assert_eq!(dp2.provider_id, "888");
    assert_eq!(dp2.patients_renamed, 0);
    assert!(dp2.completed());

    assert_eq!(report.records_anonymized(), 4);
    assert_eq!(report.records_skipped(), 1);
    assert_eq!(report.source_unchanged, Some(true));
}

#[test]
fn source_tree_is_never_mutated() {
    let fx = build_fixture();
    let before = tree_fingerprint(&fx.source).unwrap();
    let record = fx
        .source
        .join("lung/dp1/data/HOSPA-0001/HOSPA-0001_CT1/series1/IM1.dcm");
    let record_bytes = fs::read(&record).unwrap();

    Pipeline::new(fx.config(lung_taxonomy(&["dp1", "dp2"])))
        .run(&fx.source, &fx.global, &fx.original)
        .expect("pipeline");

    assert_eq!(tree_fingerprint(&fx.source).unwrap(), before);
    assert_eq!(fs::read(&record).unwrap(), record_bytes);
}

#[test]
fn rerun_over_leftover_work_area_gives_same_names() {
    let fx = build_fixture();
    let pipeline = Pipeline::new(fx.config(lung_taxonomy(&["dp1", "dp2"])));
    let data = fx.work_dir().join("lung/dp1/data");

    pipeline.run(&fx.source, &fx.global, &fx.original).expect("first run");
    let first = dir_names(&data);
    // The second run starts from a non-empty work area and must clear it.
    pipeline.run(&fx.source, &fx.global, &fx.original).expect("second run");

    assert_eq!(dir_names(&data), first);
}

#[test]
fn skip_policy_leaves_unmapped_patient_untouched() {
    let fx = build_fixture();
    let mut config = fx.config(lung_taxonomy(&["dp1"]));
    config.unmapped_patients = UnmappedPolicy::Skip;

    let report = Pipeline::new(config)
        .run(&fx.source, &fx.global, &fx.original)
        .expect("pipeline");

    let data = fx.work_dir().join("lung/dp1/data");
    assert_eq!(dir_names(&data), vec!["777-123456", "777-654321", "HOSPA-0007"]);
    assert_eq!(
        identity_of(&data.join("HOSPA-0007/HOSPA-0007_XR1/series1/IM1.dcm")),
        (Some("Poe^Ed".into()), Some("HOSPA-0007".into()))
    );
    assert_eq!(report.providers[0].skipped_patients, vec!["HOSPA-0007"]);
    assert!(report.providers[0].unmapped_patients.is_empty());
}

#[test]
fn provider_failures_do_not_stop_the_run() {
    let fx = build_fixture();
    let dp1 = fx.source.join("lung/dp1/data");
    // A second unmapped patient collides with the first on "777-".
    write_test_dicom(
        &dp1.join("HOSPB-0008/HOSPB-0008_CT1/series1/IM1.dcm"),
        "Loe^Al",
        "HOSPB-0008",
    );
    // A mapped patient that sorts after the collision.
    write_test_dicom(
        &dp1.join("HOSPC-0009/HOSPC-0009_CT1/series1/IM1.dcm"),
        "Real^Name",
        "HOSPC-0009",
    );
    save_table(
        &table(&[("0001", "123456"), ("0002", "654321"), ("0009", "111111")]),
        &dp1.join("id_mapping_lung.json"),
    )
    .unwrap();
    let taxonomy = Taxonomy::new(vec![Category {
        name: "lung".into(),
        providers: vec!["dp1".into(), "dp3".into(), "dp2".into()],
    }]);

    let report = Pipeline::new(fx.config(taxonomy))
        .run(&fx.source, &fx.global, &fx.original)
        .expect("pipeline");

    let providers: Vec<_> = report
        .providers
        .iter()
        .map(|p| (p.provider.as_str(), p.completed()))
        .collect();
    assert_eq!(providers, vec![("dp1", false), ("dp3", false), ("dp2", true)]);
    assert_eq!(report.failed_providers().count(), 2);

    // The collision is recorded against the patient and the walk carries on.
    let dp1_report = &report.providers[0];
    assert!(dp1_report.error.is_none());
    assert_eq!(dp1_report.failed_patients.len(), 1);
    assert_eq!(dp1_report.failed_patients[0].patient, "HOSPB-0008");
    assert!(dp1_report.failed_patients[0].reason.contains("already exists"));
    assert!(report.providers[1].error.is_some());

    let data = fx.work_dir().join("lung/dp1/data");
    assert_eq!(
        dir_names(&data),
        vec!["777-", "777-111111", "777-123456", "777-654321", "HOSPB-0008"]
    );
    let late = data.join("777-111111/777-111111_CT1/series1/IM1.dcm");
    assert_eq!(
        identity_of(&late),
        (Some("777-111111".to_string()), Some("777-111111".to_string()))
    );
}

#[test]
fn missing_global_mapping_aborts_the_run() {
    let fx = build_fixture();
    fs::remove_file(&fx.global).unwrap();

    let err = Pipeline::new(fx.config(lung_taxonomy(&["dp1"])))
        .run(&fx.source, &fx.global, &fx.original)
        .unwrap_err();

    assert!(matches!(err, PseudonymError::ResourceNotFound { .. }));
}

#[test]
fn malformed_patient_table_aborts_the_run() {
    let fx = build_fixture();
    fs::write(
        fx.source.join("lung/dp1/data/id_mapping_lung.json"),
        br#"{"0001": ["123456"]}"#,
    )
    .unwrap();

    let err = Pipeline::new(fx.config(lung_taxonomy(&["dp1"])))
        .run(&fx.source, &fx.global, &fx.original)
        .unwrap_err();

    assert!(matches!(err, PseudonymError::MalformedMapping { .. }));
}

#[test]
fn anonymize_record_reports_both_outcomes() {
    let dir = tempdir().expect("tempdir");
    let good = dir.path().join("IM1.dcm");
    let bad = dir.path().join("IM2.dcm");
    write_test_dicom(&good, "Doe^John", "HOSPA-0001");
    fs::write(&bad, BROKEN_BYTES).unwrap();

    assert_eq!(anonymize_record(&good, "777", "123456"), RecordOutcome::Anonymized);
    assert_eq!(
        identity_of(&good),
        (Some("777-123456".into()), Some("777-123456".into()))
    );

    assert!(matches!(
        anonymize_record(&bad, "777", "123456"),
        RecordOutcome::Skipped { .. }
    ));
    assert_eq!(fs::read(&bad).unwrap(), BROKEN_BYTES);
}

#[cfg(unix)]
#[test]
fn rewritten_record_keeps_its_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("IM1.dcm");
    write_test_dicom(&path, "Doe^John", "HOSPA-0001");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

    let outcome = anonymize_record(&path, "777", "123456");

    assert_eq!(outcome, RecordOutcome::Anonymized);
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o640);
    assert_eq!(
        identity_of(&path),
        (Some("777-123456".to_string()), Some("777-123456".to_string()))
    );
}
