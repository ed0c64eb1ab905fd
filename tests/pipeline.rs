//! End-to-end pipeline tests with real image fixtures on disk.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use attesta_media::config::{PipelineConfig, ProcessingOptions};
use attesta_media::models::{AssetRecord, AssetStatus, StepOutcome, StepResult};
use attesta_media::orchestrator::ProcessingOrchestrator;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use serde_json::json;
use uuid::Uuid;

fn noise_image(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        Rgb([
            ((x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17))) % 256) as u8,
            ((x.wrapping_mul(151) ^ y.wrapping_mul(83)) % 256) as u8,
            ((x.wrapping_add(y).wrapping_mul(97)) % 256) as u8,
        ])
    })
}

fn write_png(path: &Path, size: u32) {
    noise_image(size).save(path).unwrap();
}

fn write_jpeg(path: &Path, size: u32, quality: u8) {
    let file = File::create(path).unwrap();
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    noise_image(size).write_with_encoder(encoder).unwrap();
}

fn orchestrator_in(dir: &Path) -> ProcessingOrchestrator {
    attesta_media::common::init_logging();
    let mut config = PipelineConfig::default();
    config.derivative_root = dir.join("derived");
    ProcessingOrchestrator::new(config)
}

fn step<'a>(asset: &'a AssetRecord, name: &str) -> StepResult {
    let results = asset
        .metadata
        .get("optimization_results")
        .expect("run should have recorded results");
    let results: Vec<StepResult> = serde_json::from_value(results.clone()).unwrap();
    results
        .into_iter()
        .find(|result| result.step == name)
        .unwrap_or_else(|| panic!("no step named {name}"))
}

#[tokio::test]
async fn square_image_yields_exactly_three_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("proof.png");
    write_png(&source, 1000);

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source);

    let status = orchestrator
        .run(&mut asset, &ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(status, AssetStatus::Processed);
    assert!(asset.status.is_terminal());

    let thumbs = step(&asset, "generate_thumbnails");
    assert_eq!(thumbs.outcome, StepOutcome::Success);
    assert_eq!(thumbs.artifacts.len(), 3);
    for (expected, label) in [(150u32, "small"), (300, "medium"), (600, "large")] {
        let artifact = thumbs
            .artifacts
            .iter()
            .find(|artifact| artifact.label == label)
            .unwrap();
        let (width, height) = image::image_dimensions(&artifact.path).unwrap();
        assert_eq!((width, height), (expected, expected));
    }

    // The medium rendition backs the record's thumbnail.
    let medium: PathBuf = thumbs
        .artifacts
        .iter()
        .find(|artifact| artifact.label == "medium")
        .unwrap()
        .path
        .clone();
    assert_eq!(asset.thumbnail_path, Some(medium));
}

#[tokio::test]
async fn web_version_reports_its_size_reduction() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("proof.jpg");
    // Quality-100 source leaves plenty of room for the quality-85 rendition.
    write_jpeg(&source, 800, 100);

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source);
    orchestrator
        .run(&mut asset, &ProcessingOptions::default())
        .await
        .unwrap();

    let web = step(&asset, "create_web_versions");
    assert_eq!(web.outcome, StepOutcome::Success);
    let reduction = web.details.get("size_reduction").unwrap().as_f64().unwrap();
    assert!(reduction > 0.0, "expected a positive reduction, got {reduction}");
    assert!(web.artifacts[0].path.is_file());
}

#[tokio::test]
async fn corrupt_image_completes_with_errors_not_failed() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.jpg");
    std::fs::write(&source, b"these are not the bytes of any image format").unwrap();

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source);
    let prior_thumbnail = PathBuf::from("derived/earlier/thumb_medium.jpg");
    asset.thumbnail_path = Some(prior_thumbnail.clone());

    let status = orchestrator
        .run(&mut asset, &ProcessingOptions::default())
        .await
        .unwrap();

    // Step-level decode failures are isolated; the run itself completes.
    assert_eq!(status, AssetStatus::CompletedWithErrors);
    assert_ne!(asset.status, AssetStatus::Processing);

    let thumbs = step(&asset, "generate_thumbnails");
    assert_eq!(thumbs.outcome, StepOutcome::Failed);
    assert!(thumbs.artifacts.is_empty());

    // Metadata extraction degrades to the partial, stat-based view.
    let metadata = step(&asset, "extract_metadata");
    assert_eq!(metadata.outcome, StepOutcome::Success);
    assert_eq!(metadata.details.get("mime"), Some(&json!("image/jpeg")));

    // A run that produced no medium rendition keeps the prior thumbnail.
    assert_eq!(asset.thumbnail_path, Some(prior_thumbnail));
}

#[tokio::test]
async fn metadata_merge_preserves_existing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("proof.png");
    write_png(&source, 400);

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source);
    asset.metadata.insert("foo".to_string(), json!("bar"));

    orchestrator
        .run(&mut asset, &ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(asset.metadata.get("foo"), Some(&json!("bar")));
    assert!(asset.metadata.contains_key("optimization_results"));
    assert!(asset.metadata.contains_key("optimized_at"));
}

#[tokio::test]
async fn destructive_optimize_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("proof.jpg");
    write_jpeg(&source, 600, 100);
    let initial_size = std::fs::metadata(&source).unwrap().len();

    let options = ProcessingOptions {
        generate_thumbnails: false,
        create_web_versions: false,
        extract_metadata: false,
        optimize_original: true,
        quality_analysis: false,
    };

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source.clone());

    // First pass: quality-100 noise recompressed at 90 clears the 5% bar.
    orchestrator.run(&mut asset, &options).await.unwrap();
    let optimize = step(&asset, "optimize_original");
    assert_eq!(optimize.details.get("committed"), Some(&json!(true)));
    let after_first = std::fs::read(&source).unwrap();
    assert!((after_first.len() as u64) < initial_size);

    // Second pass: nothing left to shave off, the guard reverts and the
    // file is byte-identical, but the version stamp still refreshes.
    let first_stamp = asset.metadata.get("optimized_at").cloned().unwrap();
    orchestrator.run(&mut asset, &options).await.unwrap();
    let optimize = step(&asset, "optimize_original");
    assert_eq!(optimize.details.get("committed"), Some(&json!(false)));
    assert_eq!(std::fs::read(&source).unwrap(), after_first);
    assert_ne!(asset.metadata.get("optimized_at"), Some(&first_stamp));

    // The guard never leaves a backup behind.
    assert!(!dir.path().join("proof.jpg.bak").exists());
    assert!(!dir.path().join("proof.opt.jpg").exists());
}

#[tokio::test]
async fn spawn_processes_on_the_dedicated_worker_lane() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("proof.png");
    write_png(&source, 400);

    let orchestrator = Arc::new(orchestrator_in(dir.path()));
    let asset = AssetRecord::new(Uuid::new_v4(), source);

    let processed = orchestrator
        .spawn(asset, ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(processed.status, AssetStatus::Processed);
    assert!(processed.thumbnail_path.is_some());
}

#[tokio::test]
async fn unknown_extension_routes_to_the_generic_handler() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("attachment.dat");
    std::fs::write(&source, vec![1u8; 2048]).unwrap();

    let orchestrator = orchestrator_in(dir.path());
    let mut asset = AssetRecord::new(Uuid::new_v4(), source);

    let status = orchestrator
        .run(&mut asset, &ProcessingOptions::default())
        .await
        .unwrap();

    assert_eq!(status, AssetStatus::Processed);
    let metadata = step(&asset, "extract_metadata");
    assert_eq!(metadata.details.get("size"), Some(&json!(2048)));
    assert_eq!(
        metadata.details.get("mime"),
        Some(&json!("application/octet-stream"))
    );
    assert!(metadata.details.contains_key("modified"));
}
