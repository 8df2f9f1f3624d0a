//! Patient registry and record screens.

use clinic_core::dashboard::DashboardStats;
use clinic_core::models::Gender;
use clinic_core::records::{GeneralDataEntry, HealthDataEntry, RecordBook, RecordKind};
use clinic_core::registry::{NewPatient, PatientDirectory, PatientRegistry, PatientUpdate};
use clinic_core::store::{Collection, DocumentStore, SqliteStore};

fn new_patient(mr_no: &str, name: &str, gender: Gender) -> NewPatient {
    NewPatient {
        mr_no: mr_no.into(),
        name: name.into(),
        phone: "0821 222 333".into(),
        dob: "1995-08-10".into(),
        gender,
        address: "Chamarajapuram".into(),
    }
}

#[test]
fn test_deleted_patient_leaves_visible_list() {
    let store = SqliteStore::open_in_memory().unwrap();
    let registry = PatientRegistry::new(&store);
    registry.register(new_patient("MR-1", "Deepa", Gender::Female)).unwrap();
    let gone = registry.register(new_patient("MR-2", "Eshwar", Gender::Male)).unwrap();

    let mut directory = PatientDirectory::load(&registry).unwrap();
    directory.set_filter("e");
    assert_eq!(directory.filtered().len(), 2);

    assert!(directory.delete(&registry, &gone.id, |_| true).unwrap());
    let visible: Vec<_> = directory.filtered().iter().map(|p| p.name.clone()).collect();
    assert_eq!(visible, vec!["Deepa"]);
    assert!(store.get(Collection::Patients, &gone.id).unwrap().is_none());
}

#[test]
fn test_edit_is_reflected_in_directory() {
    let store = SqliteStore::open_in_memory().unwrap();
    let registry = PatientRegistry::new(&store);
    let patient = registry.register(new_patient("MR-1", "Deepa", Gender::Female)).unwrap();
    let mut directory = PatientDirectory::load(&registry).unwrap();

    let updated = registry
        .update(
            &patient.id,
            PatientUpdate {
                name: Some("Deepa R".into()),
                gender: Some(Gender::Other),
                ..Default::default()
            },
        )
        .unwrap();
    directory.apply_update(updated);

    assert_eq!(directory.all()[0].name, "Deepa R");
    assert_eq!(directory.all()[0].gender, Gender::Other);
    assert_eq!(directory.all()[0].mr_no, "MR-1");
}

#[test]
fn test_dashboard_counts_registrations() {
    let store = SqliteStore::open_in_memory().unwrap();
    let registry = PatientRegistry::new(&store);
    registry.register(new_patient("MR-1", "Deepa", Gender::Female)).unwrap();
    registry.register(new_patient("MR-2", "Eshwar", Gender::Male)).unwrap();

    let stats = DashboardStats::load(&store).unwrap();
    assert_eq!(stats.total_patients, 2);
    assert!(stats.recent_activity[0].subtitle.starts_with("Eshwar (Male, "));
}

#[test]
fn test_record_entries_round_trip_through_book() -> anyhow::Result<()> {
    let store = SqliteStore::open_in_memory()?;

    let mut general = GeneralDataEntry::new();
    general.update("eye", 0, "RE")?;
    general.update("duration", 0, "3 months")?;
    general.set_mr_no(Some("MR-1".into()));
    general.save(&store)?;

    let mut health = HealthDataEntry::new();
    health.update(0, "Thyroid")?;
    health.save(&store)?;

    let book = RecordBook::load(&store, RecordKind::General)?;
    assert_eq!(book.records().len(), 1);
    assert_eq!(book.records()[0].values("eye"), vec!["RE"]);
    assert_eq!(book.records()[0].values("duration"), vec!["3 months"]);
    assert!(book.records()[0].values("complaint").is_empty());

    let book = RecordBook::load(&store, RecordKind::Health)?;
    assert_eq!(book.records()[0].values("conditions"), vec!["Thyroid"]);
    Ok(())
}
