//! Example walking through a comparison and a bulk rollback
//!
//! Run with: cargo run --example compare_demo

use chrono::{Duration, Utc};
use config_history::backend::{FileRef, MemoryBackend, ScopeRef, VersionStore};
use config_history::compare_backend::CompareBackend;
use config_history::config::Settings;
use config_history::history::{DiffView, HistoryPanel};
use config_history::logging;
use config_history::rollback::RollbackPlanner;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::default();
    logging::init(&settings);

    println!("=== Config History Demo ===\n");

    let store = Arc::new(MemoryBackend::new());
    let scope = ScopeRef::new("web-01");
    let file = FileRef::new("etc/nginx.conf");
    let now = Utc::now();
    store.add_to_scope(&scope, &file);

    let base: Vec<String> = (1..=30).map(|i| format!("setting_{} on;", i)).collect();
    let mut edited = base.clone();
    edited[14] = "setting_15 off;".to_string();
    store.save_at(&file, &base.join("\n"), now - Duration::days(2), Some("initial"));
    store.save_at(&file, &edited.join("\n"), now - Duration::hours(3), Some("toggle 15"));

    // History panel: compare the older version against the live file
    let mut panel = HistoryPanel::new(file.clone(), &settings);
    panel.reload(&*store)?;
    let pair = panel.compare_to_current(1)?;

    // Run the diff on the background worker
    let mut worker = CompareBackend::new(store.clone(), settings.diff_timeout());
    worker.request(file.clone(), pair);
    let outcome = worker
        .recv_timeout(std::time::Duration::from_secs(5))
        .ok_or("comparison did not finish")?;
    let diff = outcome.result?;

    println!("Comparing {} (+{} -{})", file, diff.summary.added, diff.summary.removed);
    match panel.view(&diff) {
        DiffView::Identical => println!("No differences"),
        DiffView::Units(units) => {
            for unit in &units {
                println!("{}", unit);
            }
        }
    }

    // Roll the whole scope back to a day ago
    let mut planner = RollbackPlanner::new(scope, now, &settings);
    planner.fetch_changes(&*store)?;
    for summary in planner.summaries() {
        println!(
            "\n{} changed {} time(s), rolling back to {}",
            summary.file_name, summary.versions_since_cutoff, summary.rollback_target_version_id
        );
    }
    let plan = planner.confirm()?;
    println!("Plan covers {} file(s)", plan.len());
    planner.submit(&*store)?;

    let live = store.get_live_content(&file)?.unwrap_or_default();
    println!(
        "\n✅ Rollback done, line 15 is now: {}",
        live.lines().nth(14).unwrap_or_default()
    );

    Ok(())
}
