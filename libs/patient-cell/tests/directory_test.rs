use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use patient_cell::models::{PatientError, PatientProfile, VisitSummary};
use patient_cell::services::{InMemoryPatientDirectory, PatientDirectory};

fn profile(name: &str, email: &str) -> PatientProfile {
    PatientProfile {
        full_name: name.to_string(),
        email: email.to_string(),
        phone: "+353 1 555 0100".to_string(),
        date_of_birth: None,
        address: None,
    }
}

fn visit(appointment_id: Uuid) -> VisitSummary {
    VisitSummary {
        appointment_id,
        provider_name: "Dr. A".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        summary: "appointment approved".to_string(),
    }
}

#[tokio::test]
async fn upsert_reuses_record_for_same_email() {
    let directory = InMemoryPatientDirectory::new();

    let first = directory
        .upsert_by_email(profile("Jane Doe", "jane@example.com"))
        .await
        .unwrap();
    let second = directory
        .upsert_by_email(profile("Jane A. Doe", "Jane@Example.com"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.full_name, "Jane A. Doe");

    let found = directory.find_by_email("JANE@example.com").await.unwrap();
    assert_eq!(found.unwrap().id, first.id);
}

#[tokio::test]
async fn upsert_rejects_malformed_email() {
    let directory = InMemoryPatientDirectory::new();

    let result = directory.upsert_by_email(profile("Jane Doe", "not-an-email")).await;
    assert_matches!(result, Err(PatientError::Validation(_)));
}

#[tokio::test]
async fn history_accumulates_per_patient() {
    let directory = InMemoryPatientDirectory::new();
    let patient = directory
        .upsert_by_email(profile("Jane Doe", "jane@example.com"))
        .await
        .unwrap();

    directory
        .insert_history(patient.id, visit(Uuid::new_v4()))
        .await
        .unwrap();
    directory
        .insert_history(patient.id, visit(Uuid::new_v4()))
        .await
        .unwrap();

    let history = directory.history_for(patient.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.patient_id == patient.id));
}

#[tokio::test]
async fn history_for_unknown_patient_fails() {
    let directory = InMemoryPatientDirectory::new();

    let result = directory.insert_history(Uuid::new_v4(), visit(Uuid::new_v4())).await;
    assert_matches!(result, Err(PatientError::NotFound));

    let result = directory.history_for(Uuid::new_v4()).await;
    assert_matches!(result, Err(PatientError::NotFound));
}

#[tokio::test]
async fn concurrent_upserts_resolve_to_one_record() {
    use std::sync::Arc;

    let directory = Arc::new(InMemoryPatientDirectory::new());

    let a = {
        let directory = Arc::clone(&directory);
        tokio::spawn(async move {
            directory
                .upsert_by_email(profile("Jane Doe", "jane@example.com"))
                .await
                .unwrap()
        })
    };
    let b = {
        let directory = Arc::clone(&directory);
        tokio::spawn(async move {
            directory
                .upsert_by_email(profile("Jane Doe", "jane@example.com"))
                .await
                .unwrap()
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert_eq!(a.id, b.id);
}
