//! Integration test: training campaign end-to-end

use neurotrack::prelude::*;
use neurotrack::storage;

/// Pseudo-shuffled samples so every positional fold covers the same domain.
fn tracklike_samples(n: usize) -> Vec<(Vec<f64>, Vec<f64>)> {
    (0..n)
        .map(|i| {
            let a = (i * 37 % n) as f64 / n as f64;
            let b = (i * 61 % n) as f64 / n as f64;
            let c = (i * 13 % n) as f64 / n as f64;
            let target = 2.0 * a - b + 0.3 * c;
            (vec![a, b, c], vec![target])
        })
        .collect()
}

fn campaign_settings(dir: &std::path::Path) -> TeacherSettings {
    TeacherSettings::new(dir.join("models.ntc"))
        .with_target("curvature".to_string())
        .with_inputs(vec!["x0".to_string(), "x1".to_string(), "x2".to_string()])
        .with_working_dir(dir)
        .with_seed(7)
}

fn mlp_method(name: &str, config: &str) -> MethodSpec {
    MethodSpec {
        array_name: name.to_string(),
        kind: MethodKind::Mlp,
        config: config.to_string(),
    }
}

#[test]
fn test_campaign_trains_and_persists_all_methods() {
    let dir = tempfile::tempdir().unwrap();
    let settings = campaign_settings(dir.path());
    let container = settings.container.clone();

    let mut teacher = Teacher::new(
        settings,
        vec![
            mlp_method("narrow", "HiddenLayers=3:NCycles=100:TestRate=30"),
            mlp_method("wide", "HiddenLayers=N:NCycles=100:TestRate=30:NThreads=2"),
        ],
    );
    for (input, target) in tracklike_samples(600) {
        assert!(teacher.add_sample(&input, &target));
    }

    let summary = teacher.finalize().unwrap();
    assert_eq!(summary.trained, vec!["narrow", "wide"]);
    assert!(summary.failed.is_empty());
    assert!(summary.skipped.is_empty());

    // Both groups and the sample set are in the container.
    assert!(storage::load_models(&container, "narrow").is_some());
    assert!(storage::load_models(&container, "wide").is_some());
    let samples = storage::load_samples(&container, "samples").unwrap();
    assert_eq!(samples.set.len(), 600);
    assert_eq!(samples.target_name, "curvature");

    // Epoch-log artifacts were written for both models.
    assert!(dir.path().join("narrow.log").exists());
    assert!(dir.path().join("wide.log").exists());
    let log = std::fs::read_to_string(dir.path().join("narrow.log")).unwrap();
    let first_line = log.lines().next().unwrap();
    assert_eq!(first_line.split_whitespace().count(), 2);
}

#[test]
fn test_second_finalize_reuses_stored_groups() {
    let dir = tempfile::tempdir().unwrap();
    let settings = campaign_settings(dir.path());

    let mut teacher = Teacher::new(
        settings,
        vec![mlp_method("reused", "HiddenLayers=2:NCycles=50")],
    );
    for (input, target) in tracklike_samples(600) {
        teacher.add_sample(&input, &target);
    }

    let first = teacher.finalize().unwrap();
    assert_eq!(first.trained, vec!["reused"]);

    let second = teacher.finalize().unwrap();
    assert!(second.trained.is_empty());
    assert_eq!(second.reused, vec!["reused"]);
}

#[test]
fn test_zero_range_target_fails_locally_and_batch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let settings = campaign_settings(dir.path());
    let container = settings.container.clone();

    let mut teacher = Teacher::new(
        settings,
        vec![
            mlp_method("first", "HiddenLayers=1:NCycles=20"),
            mlp_method("second", "HiddenLayers=1:NCycles=20"),
        ],
    );
    for i in 0..200 {
        let x = i as f64;
        teacher.add_sample(&[x, -x, x * 0.5], &[7.0]);
    }

    // Both methods fail on the unlearnable target, the run itself succeeds
    // and the sample set is still persisted.
    let summary = teacher.finalize().unwrap();
    assert_eq!(summary.failed, vec!["first", "second"]);
    assert!(summary.trained.is_empty());
    assert!(storage::load_samples(&container, "samples").is_some());
}

#[test]
fn test_insufficient_samples_skips_method() {
    let dir = tempfile::tempdir().unwrap();
    let settings = campaign_settings(dir.path());

    let mut teacher = Teacher::new(
        settings,
        vec![mlp_method("starved", "HiddenLayers=4*N:NCycles=20")],
    );
    for (input, target) in tracklike_samples(50) {
        teacher.add_sample(&input, &target);
    }

    let summary = teacher.finalize().unwrap();
    assert_eq!(summary.skipped, vec!["starved"]);
    assert!(summary.trained.is_empty());
    assert!(summary.failed.is_empty());
}

#[test]
fn test_trained_model_predicts_in_physical_units() {
    let dir = tempfile::tempdir().unwrap();
    let settings = campaign_settings(dir.path());
    let container = settings.container.clone();

    let mut teacher = Teacher::new(
        settings,
        vec![mlp_method("phys", "HiddenLayers=4:NCycles=300:TestRate=60")],
    );
    for (input, target) in tracklike_samples(600) {
        teacher.add_sample(&input, &target);
    }
    teacher.finalize().unwrap();

    let group = storage::load_models(&container, "phys").unwrap();
    let model = &group.models[0];

    // Inputs are raw feature values; outputs come back in target units.
    let mut sq_sum = 0.0;
    let samples = tracklike_samples(600);
    for (input, target) in &samples {
        let predicted = model.run(input).unwrap();
        sq_sum += (predicted - target[0]).powi(2);
    }
    let rms = (sq_sum / samples.len() as f64).sqrt();
    // Target spans roughly [-1, 2.3]; a trained net should sit well under
    // the trivial constant predictor.
    assert!(rms < 0.4, "physical-unit RMS too high: {}", rms);
}

#[test]
fn test_determinism_across_identical_campaigns() {
    let run = |dir: &std::path::Path| -> Vec<f64> {
        let settings = campaign_settings(dir);
        let container = settings.container.clone();
        let mut teacher = Teacher::new(
            settings,
            vec![mlp_method("det", "HiddenLayers=3:NCycles=60:RandomSeeds=2")],
        );
        for (input, target) in tracklike_samples(600) {
            teacher.add_sample(&input, &target);
        }
        teacher.finalize().unwrap();
        let group = storage::load_models(&container, "det").unwrap();
        group.models[0].weights().to_vec()
    };

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    assert_eq!(run(dir_a.path()), run(dir_b.path()));
}
