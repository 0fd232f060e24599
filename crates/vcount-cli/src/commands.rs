//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use vcount_calibrate::{LineCalibrator, RasterSurface, ReferenceFrame};
use vcount_client::BackendClient;
use vcount_jobs::{
    JobOrchestrator, OrchestratorConfig, PlateQuery, PlateSortField, SortDirection, VehicleQuery,
    VehicleSortField,
};
use vcount_media::{ProbeConfig, VideoProbe};
use vcount_models::{JobConfig, JobPhase, Thresholds, VideoSource};

use crate::cli::{CalibrateArgs, RunArgs};

pub async fn run_job(client: BackendClient, args: RunArgs) -> anyhow::Result<()> {
    let mut config = JobConfig::new(args.kind.into())
        .with_video(VideoSource::new(&args.video))
        .with_start_time(args.start_time)
        .with_direction(args.direction)
        .with_orientation(args.orientation)
        .with_thresholds(Thresholds::new(args.motion_threshold, args.confidence_threshold));
    if let Some(line) = args.line {
        config = config.with_counting_line(line);
    }
    let output_name = args
        .output_name
        .or_else(|| config.suggested_output_name())
        .unwrap_or_default();
    config = config.with_output_name(output_name);

    let mut orchestrator = JobOrchestrator::new(Arc::new(client), OrchestratorConfig::from_env());
    if !args.no_probe {
        orchestrator = orchestrator.with_probe(VideoProbe::ffprobe(ProbeConfig::from_env()));
    }

    let job_id = orchestrator.submit(config).await?;
    info!(job_id = %job_id, "Job submitted");

    let mut snapshots = orchestrator.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last_decile = None;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            let decile = (snapshot.progress.percent / 10.0).floor() as u8;
            if last_decile != Some(decile) {
                last_decile = Some(decile);
                info!(
                    phase = %snapshot.phase,
                    progress = snapshot.progress.percent,
                    results = snapshot.result_count,
                    "Processing"
                );
            }
            if snapshot.phase.is_terminal() {
                break;
            }
        }
    });

    let finished = tokio::select! {
        phase = orchestrator.wait_for_terminal() => Some(phase),
        _ = tokio::signal::ctrl_c() => None,
    };
    reporter.abort();

    let Some(phase) = finished else {
        warn!("Interrupted, stopping job polling");
        orchestrator.dispose();
        bail!("interrupted");
    };

    if phase != JobPhase::Completed {
        let reason = orchestrator.failure().unwrap_or_else(|| phase.to_string());
        bail!("job failed: {}", reason);
    }

    if let Some(summary) = orchestrator.summary() {
        info!("{}", summary.describe());
    }

    let direction = SortDirection::from_str_or_default(&args.order);
    let sort = args.sort.as_deref().unwrap_or_default();

    if let Some(view) = orchestrator.plate_view(&PlateQuery {
        search: args.search.clone(),
        sort: PlateSortField::from_str_or_default(sort),
        direction,
    }) {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!("{} readings, {} unique plates", view.total, view.unique_plates);
            for row in &view.rows {
                println!(
                    "{:>4}  {:<10}  {:>6.1}%  {:?}  {}",
                    row.id,
                    row.plate,
                    row.confidence,
                    row.band(),
                    row.display_timestamp(true)
                );
            }
        }
    }

    if let Some(view) = orchestrator.vehicle_view(&VehicleQuery {
        search: args.search,
        sort: VehicleSortField::from_str_or_default(sort),
        direction,
    }) {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            println!("{} vehicles, {} tracks", view.total_vehicles, view.unique_tracks);
            for (category, count) in view.counts.iter() {
                println!("  {:<12} {}", category, count);
            }
        }
    }

    Ok(())
}

pub async fn calibrate(client: &BackendClient, args: CalibrateArgs) -> anyhow::Result<()> {
    if args.clicks.len() != 2 {
        bail!("expected exactly two --click positions, got {}", args.clicks.len());
    }

    let bytes = client
        .extract_first_frame(&VideoSource::new(&args.video))
        .await
        .context("fetching first frame")?;
    let frame = ReferenceFrame::decode(&bytes).context("decoding first frame")?;

    let mut calibrator = LineCalibrator::new(RasterSurface::new());
    calibrator.load_image(frame)?;
    if let Some(display) = args.display {
        calibrator.set_display_size(display)?;
    }

    for click in &args.clicks {
        calibrator.pointer_move(*click)?;
        calibrator.click(*click)?;
    }
    let line = calibrator.confirm()?;

    calibrator.surface().save(&args.preview)?;
    info!(preview = %args.preview.display(), "Wrote calibration preview");

    println!("{},{},{},{}", line.x1, line.y1, line.x2, line.y2);
    Ok(())
}

pub async fn health(client: &BackendClient) -> anyhow::Result<()> {
    let health = client.health().await?;
    println!(
        "{}",
        health
            .message
            .or(health.status)
            .unwrap_or_else(|| "ok".to_string())
    );
    Ok(())
}

pub async fn download_csv(client: &BackendClient, out: &Path) -> anyhow::Result<()> {
    let bytes = client.download_csv().await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), bytes = bytes.len(), "Saved results CSV");
    Ok(())
}
