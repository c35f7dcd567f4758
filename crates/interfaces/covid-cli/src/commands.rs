use crate::RunContext;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use covid_core::SyncPlan;
use covid_pipeline::inventory::{self, ContagionsInventory, VaccinationsInventory};
use covid_pipeline::{
    DefaultSyncEngine, FreshnessCheck, ProgressTracker, SyncError, SyncEvent, SyncRequest,
    SyncResult, TransferSnapshot, VaccinationsOutcome,
};
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::future::Future;
use tokio::sync::mpsc::{self, Sender};

fn build_engine(ctx: &RunContext) -> Result<DefaultSyncEngine> {
    let client = covid_infra::net::default_http_client().context("Failed to build HTTP client")?;
    Ok(DefaultSyncEngine::with_base_urls(
        client,
        &ctx.contagions_base_url,
        &ctx.vaccinations_base_url,
    ))
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn progress_message(label: &str, snap: &TransferSnapshot) -> String {
    let mut msg = format!(
        "{label}: {} written ({}, {}/s), {} skipped, {} failed, {} present",
        snap.written_items,
        format_size(snap.written_bytes, DECIMAL),
        format_size(snap.speed_bps, DECIMAL),
        snap.skipped_items,
        snap.failed_items,
        snap.present_items
    );
    if let Some(key) = snap.in_flight.first() {
        msg.push_str(&format!(" | {key}"));
        if snap.in_flight.len() > 1 {
            msg.push_str(&format!(" +{}", snap.in_flight.len() - 1));
        }
    }
    msg
}

/// Run a sync call, rendering its events on a progress bar when enabled.
async fn with_progress<T, F>(
    ctx: &RunContext,
    label: &str,
    run: impl FnOnce(Option<Sender<SyncEvent>>) -> F,
) -> T
where
    F: Future<Output = T>,
{
    // Verbose output is line oriented; a bar would interleave with it.
    if !ctx.options.show_progress || ctx.options.verbose {
        return run(None).await;
    }

    let (tx, mut rx) = mpsc::channel(100);
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style());
    pb.set_message(format!("{label}: planning..."));

    let render = {
        let pb = pb.clone();
        let label = label.to_string();
        async move {
            let mut tracker = ProgressTracker::new();
            while let Some(ev) = rx.recv().await {
                tracker.update(ev);
                let snap = tracker.get_snapshot();
                pb.set_length(snap.total_items);
                pb.set_position(snap.completed_items());
                pb.set_message(progress_message(&label, &snap));
            }
        }
    };

    let (out, ()) = tokio::join!(run(Some(tx)), render);
    pb.finish();
    out
}

fn print_result(result: &SyncResult) {
    println!("   Written:  {}", result.written.len());
    println!("   Skipped:  {}", result.skipped.len());
    println!("   Failed:   {}", result.failures.len());
    for failure in &result.failures {
        println!("     - {failure}");
    }
}

pub async fn cmd_sync_contagions(
    ctx: &RunContext,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
) -> Result<SyncResult> {
    let target = ctx.contagions_dir();
    println!(":: Synchronizing contagions...");
    println!("   Target: {}", target);

    let engine = build_engine(ctx)?;
    let req = SyncRequest::new(target)
        .with_range(start, end)
        .with_force(force)
        .with_options(ctx.options.clone());

    let outcome = with_progress(ctx, "contagions", |tx| engine.sync_contagions(&req, tx)).await;
    match outcome {
        Ok(result) => {
            print_result(&result);
            Ok(result)
        }
        Err(SyncError::Incomplete(report)) => {
            print_result(&report);
            anyhow::bail!(
                "{} contagion files could not be downloaded",
                report.failures.len()
            )
        }
        Err(e) => Err(e).context("Contagions sync failed"),
    }
}

pub async fn cmd_sync_vaccinations(ctx: &RunContext, force: bool) -> Result<VaccinationsOutcome> {
    let target = ctx.vaccinations_dir();
    println!(":: Synchronizing vaccinations...");
    println!("   Target: {}", target);

    let engine = build_engine(ctx)?;
    let req = SyncRequest::new(target)
        .with_force(force)
        .with_options(ctx.options.clone());

    let outcome = with_progress(ctx, "vaccinations", |tx| engine.sync_vaccinations(&req, tx))
        .await
        .context("Vaccinations sync failed")?;

    match &outcome {
        VaccinationsOutcome::UpToDate { local } => {
            println!("   Status:   Up to date (last update {})", local.timestamp);
        }
        VaccinationsOutcome::Synced {
            result,
            marker,
            marker_persisted,
        } => {
            print_result(result);
            println!("   Updated:  {}", marker.timestamp);
            if !marker_persisted {
                println!("   Warning:  update marker not saved, next run will download again");
            }
        }
    }
    Ok(outcome)
}

/// Contagions then vaccinations. Both run even if the first fails.
pub async fn cmd_sync_all(
    ctx: &RunContext,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
) -> Result<()> {
    let contagions = cmd_sync_contagions(ctx, start, end, force).await;
    let vaccinations = cmd_sync_vaccinations(ctx, force).await;

    match (contagions, vaccinations) {
        (Ok(_), Ok(_)) => Ok(()),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(c), Err(v)) => Err(c.context(format!("vaccinations also failed: {v:#}"))),
    }
}

#[derive(Debug)]
pub struct CheckReport {
    pub contagions: SyncPlan,
    pub vaccinations: FreshnessCheck,
}

/// Dry run: what a sync would fetch, without downloading data files.
pub async fn cmd_check(
    ctx: &RunContext,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<CheckReport> {
    println!(":: Analyzing state...");
    println!("   Data: {}", ctx.data_dir);

    let engine = build_engine(ctx)?;

    let contagions_req = SyncRequest::new(ctx.contagions_dir())
        .with_range(start, end)
        .with_options(ctx.options.clone());
    let contagions = engine
        .plan_contagions(&contagions_req)
        .context("Contagions planning failed")?;

    let vaccinations_req =
        SyncRequest::new(ctx.vaccinations_dir()).with_options(ctx.options.clone());
    let vaccinations = engine
        .check_vaccinations(&vaccinations_req)
        .await
        .context("Vaccinations freshness check failed")?;

    println!("\n:: Contagions");
    println!("   Pending Downloads: {}", contagions.pending.len());
    println!("   Present Files:     {}", contagions.present.len());

    println!("\n:: Vaccinations");
    println!("   Remote Update:     {}", vaccinations.remote.timestamp);
    if vaccinations.local.is_epoch() {
        println!("   Local Update:      never");
    } else {
        println!("   Local Update:      {}", vaccinations.local.timestamp);
    }
    if vaccinations.should_proceed(false) {
        println!("   Status:            Updates available (run `sync vaccinations`)");
    } else {
        println!("   Status:            Up to date");
    }

    Ok(CheckReport {
        contagions,
        vaccinations,
    })
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub contagions: ContagionsInventory,
    pub vaccinations: VaccinationsInventory,
}

/// Local inventory of both datasets. No network.
pub fn cmd_status(ctx: &RunContext, json: bool) -> Result<StatusReport> {
    let report = StatusReport {
        contagions: inventory::scan_contagions(&ctx.contagions_dir())
            .context("Failed to read contagions directory")?,
        vaccinations: inventory::scan_vaccinations(&ctx.vaccinations_dir())
            .context("Failed to read vaccinations directory")?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!(":: Contagions ({})", report.contagions.root);
    for scope in &report.contagions.scopes {
        match (scope.first, scope.last) {
            (Some(first), Some(last)) => println!(
                "   {:<9} {} files, {} .. {}, {} missing",
                scope.scope.to_string(),
                scope.files,
                first,
                last,
                scope.missing.len()
            ),
            _ => println!("   {:<9} no files", scope.scope.to_string()),
        }
    }

    println!("\n:: Vaccinations ({})", report.vaccinations.root);
    for file in &report.vaccinations.files {
        match file.size {
            Some(size) => println!("   {:<40} {}", file.name, format_size(size, DECIMAL)),
            None => println!("   {:<40} missing", file.name),
        }
    }
    match &report.vaccinations.marker {
        Some(marker) => println!("   Last Update: {}", marker.timestamp),
        None => println!("   Last Update: never synced"),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covid_core::WorkKey;

    fn snapshot() -> TransferSnapshot {
        TransferSnapshot {
            total_items: 4,
            present_items: 6,
            written_items: 2,
            skipped_items: 1,
            failed_items: 0,
            written_bytes: 2_500,
            speed_bps: 1_200,
            in_flight: vec![WorkKey::Name("platea.csv".into())],
        }
    }

    #[test]
    fn progress_message_shows_rate_and_current_file() {
        let msg = progress_message("vaccinations", &snapshot());
        let expected = format!(
            "vaccinations: 2 written ({}, {}/s)",
            format_size(2_500u64, DECIMAL),
            format_size(1_200u64, DECIMAL)
        );
        assert!(msg.starts_with(&expected), "{msg}");
        assert!(msg.contains("1 skipped, 0 failed, 6 present"), "{msg}");
        assert!(msg.ends_with("| platea.csv"), "{msg}");
    }

    #[test]
    fn progress_message_counts_extra_in_flight_items() {
        let mut snap = snapshot();
        snap.in_flight.push(WorkKey::Name("somministrazioni.csv".into()));
        snap.speed_bps = 0;
        let msg = progress_message("vaccinations", &snap);
        assert!(msg.contains(&format!("{}/s", format_size(0u64, DECIMAL))), "{msg}");
        assert!(msg.ends_with("| platea.csv +1"), "{msg}");
    }
}
