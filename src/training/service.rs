//! Training runs: schema derivation, encoding, fitting and versioning.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::common::error::TrainingError;
use crate::common::time;
use crate::data::domain::Dataset;
use crate::evaluation::service::evaluate;
use crate::features::encoder::encode;
use crate::features::schema::{BoolSpellings, Declarations, Schema};

use super::domain::{Artifact, ArtifactRepo, ArtifactSelector, TrainConfig, TrainingPlan};

/// Train the next artifact from `dataset`.
///
/// Every non-label column becomes a feature, in header order. Rows are never
/// dropped: the first row that fails to encode aborts the run. `previous` is
/// the latest deployed artifact, if any, and determines the new versions.
pub fn train(
    dataset: &Dataset,
    declarations: &Declarations,
    label_column: &str,
    label: &BoolSpellings,
    cfg: &TrainConfig,
    previous: Option<&Artifact>,
) -> Result<Artifact, TrainingError> {
    cfg.validate()?;
    let labels = read_labels(dataset, label_column, label)?;

    let features = dataset.without(label_column);
    let schema = Schema::derive(&features, declarations)?;

    let matrix = features
        .rows()
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            encode(row, &schema)
                .map(|v| v.into_inner())
                .map_err(|cause| TrainingError::TrainingDataRejected { row_index, cause })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (fit_idx, holdout_idx) = split_rows(matrix.len(), cfg.holdout_fraction, cfg.seed);
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            idx.iter().map(|&i| matrix[i].clone()).collect(),
            idx.iter().map(|&i| labels[i]).collect(),
        )
    };
    let (fit_x, fit_y) = pick(&fit_idx);
    let (hold_x, hold_y) = pick(&holdout_idx);

    let model = cfg.learner().fit(&fit_x, &fit_y)?;
    let evaluation = evaluate(&model, cfg.threshold, &hold_x, &hold_y);

    let version = previous.map_or(1, |p| p.version + 1);
    let schema_version = match previous {
        Some(p) if p.schema.fingerprint() == schema.fingerprint() => p.schema.version(),
        Some(p) => p.schema.version() + 1,
        None => 1,
    };

    let artifact = Artifact {
        version,
        created_ms: time::now_ms(),
        schema: schema.with_version(schema_version),
        model,
        threshold: cfg.threshold,
        config: cfg.clone(),
        evaluation,
    };

    info!(
        version,
        schema_version,
        rows = matrix.len(),
        holdout = holdout_idx.len(),
        columns = artifact.schema.columns().len(),
        accuracy = artifact.evaluation.as_ref().map(|e| e.accuracy),
        "training run complete"
    );
    Ok(artifact)
}

/// Apply a [`TrainingPlan`] to `dataset` and persist the result as the next version.
pub fn train_and_store(
    repo: &dyn ArtifactRepo,
    dataset: &Dataset,
    plan: &TrainingPlan,
) -> Result<Artifact, TrainingError> {
    let dataset = match &plan.features {
        Some(features) => {
            let mut columns = features.clone();
            columns.push(plan.label_column.clone());
            dataset.select(&columns)?
        }
        None => dataset.clone(),
    };

    let previous = match repo.latest_version()? {
        Some(_) => Some(repo.load(ArtifactSelector::Latest)?),
        None => None,
    };

    let artifact = train(
        &dataset,
        &plan.declarations,
        &plan.label_column,
        &plan.label,
        &plan.config,
        previous.as_ref(),
    )?;
    repo.save(&artifact)?;
    Ok(artifact)
}

fn read_labels(
    dataset: &Dataset,
    label_column: &str,
    spellings: &BoolSpellings,
) -> Result<Vec<bool>, TrainingError> {
    if dataset.is_empty() {
        return Err(TrainingError::InvalidDataset("dataset has no rows".into()));
    }
    if !dataset.has_column(label_column) {
        return Err(TrainingError::InvalidDataset(format!(
            "label column `{label_column}` is missing"
        )));
    }

    let labels = dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let value = row.get(label_column).ok_or_else(|| {
                TrainingError::InvalidDataset(format!("row {idx} has no label"))
            })?;
            spellings.parse(value).ok_or_else(|| {
                TrainingError::InvalidDataset(format!("row {idx} has non-binary label `{value}`"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        warn!(label_column, "label column holds a single class");
        return Err(TrainingError::InvalidDataset(format!(
            "label column `{label_column}` holds a single class"
        )));
    }
    Ok(labels)
}

/// Seeded shuffle, then the last `fraction` of rows become the holdout.
fn split_rows(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let holdout = ((n as f64) * fraction).floor() as usize;
    let holdout = holdout.min(n.saturating_sub(1));
    let held_out = order.split_off(n - holdout);
    (order, held_out)
}
