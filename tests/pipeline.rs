//! End-to-end: CSV on disk, training, artifact store, inference.

use std::path::Path;

use pretty_assertions::assert_eq;
use screening_core::data::repo_fs::{read_csv, CsvOptions};
use screening_core::training::domain::ArtifactId;
use screening_core::training::repo_fs::FsArtifactRepo;
use screening_core::{
    train_and_store, ArtifactRepo, ArtifactSelector, InferenceService, Label, RawRecord,
    ServiceError, ServiceState, TrainingPlan,
};

const HEADER: &str = "A1_Score,A2_Score,age,gender,jaundice,austim,used_app_before,result,relation,Class/ASD";

fn write_screening_csv(path: &Path, rows: usize) {
    let mut csv = format!("{HEADER}\n");
    for i in 0..rows {
        let positive = i % 2 == 0;
        let a1 = u8::from(positive);
        let a2 = u8::from(positive ^ (i % 5 == 0));
        csv.push_str(&format!(
            "{a1},{a2},{},{},{},{},no,{},{},{}\n",
            18 + (i / 2) % 40,
            if i % 3 == 0 { "f" } else { "m" },
            if i % 4 == 0 { "yes" } else { "no" },
            if i % 6 == 0 { "yes" } else { "no" },
            a1 + a2,
            if i % 7 == 0 { "?" } else { "Self" },
            if positive { "YES" } else { "NO" },
        ));
    }
    std::fs::write(path, csv).unwrap();
}

fn plan(model_kind: &str) -> TrainingPlan {
    TrainingPlan::parse(&format!(
        r#"{{
            "label_column": "Class/ASD",
            "features": ["A1_Score", "A2_Score", "age", "gender", "jaundice", "austim"],
            "declarations": {{
                "gender": {{"kind": "categorical", "vocabulary": ["m", "f"]}},
                "jaundice": {{"kind": "boolean"}},
                "austim": {{"kind": "boolean"}},
                "age": {{"kind": "numeric", "min": 0}}
            }},
            "config": {{"model_kind": "{model_kind}", "n_estimators": 10}}
        }}"#
    ))
    .unwrap()
}

fn sample_records() -> Vec<RawRecord> {
    let mut out = Vec::new();
    for a1 in [0, 1] {
        for gender in ["m", "f"] {
            for age in [19, 35, 60] {
                out.push(
                    RawRecord::new()
                        .with("A1_Score", a1)
                        .with("A2_Score", a1)
                        .with("age", age)
                        .with("gender", gender)
                        .with("jaundice", "no")
                        .with("austim", if age > 30 { "yes" } else { "no" }),
                );
            }
        }
    }
    out
}

#[test]
fn csv_to_prediction_with_both_learners() {
    for kind in ["logistic", "bagged_trees"] {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("screening.csv");
        write_screening_csv(&csv, 80);

        let repo = FsArtifactRepo::at(dir.path().join("artifacts"));
        let dataset = read_csv(&csv, &CsvOptions::default()).unwrap();
        let artifact = train_and_store(&repo, &dataset, &plan(kind)).unwrap();
        assert_eq!(artifact.version, 1);
        assert_eq!(artifact.evaluation.as_ref().map(|e| e.rows), Some(16));

        let service = InferenceService::load(&repo, ArtifactSelector::Latest);
        assert_eq!(service.state(), ServiceState::Ready { version: 1 });

        let results = service.predict_batch(&sample_records()).unwrap();
        for (record, result) in sample_records().iter().zip(results) {
            let result = result.unwrap();
            let expected = if record.get("A1_Score").and_then(|v| v.as_number()) == Some(1.0) {
                Label::Positive
            } else {
                Label::Negative
            };
            assert_eq!(result.label, expected, "{kind} on {record:?}");
            assert_eq!(result.version, 1);
        }
    }
}

#[test]
fn reloaded_artifact_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("screening.csv");
    write_screening_csv(&csv, 60);
    let repo = FsArtifactRepo::at(dir.path());
    let dataset = read_csv(&csv, &CsvOptions::default()).unwrap();

    let trained = train_and_store(&repo, &dataset, &plan("bagged_trees")).unwrap();
    let fresh = InferenceService::from_artifact(trained).unwrap();
    let stored = InferenceService::load(&repo, ArtifactSelector::Id(ArtifactId(1)));

    for record in sample_records() {
        assert_eq!(
            fresh.predict(&record).unwrap(),
            stored.predict(&record).unwrap()
        );
    }
}

#[test]
fn retraining_advances_versions_and_reload_swaps() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("screening.csv");
    write_screening_csv(&csv, 40);
    let repo = FsArtifactRepo::at(dir.path());
    let dataset = read_csv(&csv, &CsvOptions::default()).unwrap();

    let first = train_and_store(&repo, &dataset, &plan("logistic")).unwrap();
    let service = InferenceService::load(&repo, ArtifactSelector::Latest);
    assert_eq!(service.active_version(), Some(1));

    let second = train_and_store(&repo, &dataset, &plan("logistic")).unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.schema.version(), first.schema.version());
    assert_eq!(service.active_version(), Some(1));

    assert_eq!(service.reload(&repo, ArtifactSelector::Latest).unwrap(), 2);
    assert_eq!(service.predict(&sample_records()[0]).unwrap().version, 2);
    assert_eq!(repo.latest_version().unwrap(), Some(2));
}

#[test]
fn unseen_category_is_refused_at_inference() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("screening.csv");
    write_screening_csv(&csv, 40);
    let repo = FsArtifactRepo::at(dir.path());
    let dataset = read_csv(&csv, &CsvOptions::default()).unwrap();
    train_and_store(&repo, &dataset, &plan("logistic")).unwrap();

    let service = InferenceService::load(&repo, ArtifactSelector::Latest);
    let mut record = sample_records()[0].clone();
    record.insert("gender", "x");
    let err = service.predict(&record).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert_eq!(err.field(), Some("gender"));
}
