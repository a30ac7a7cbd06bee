use anyhow::Result;
use depot_config::Config;
use depot_engine::{Coordinator, ReconcileReport};
use std::sync::Arc;

use super::open_store;

pub async fn handle(config: &Config, prune_partials: bool, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let coordinator = Coordinator::new(Arc::new(store.clone()));

    let report = coordinator
        .reconcile(&config.storage.folder, prune_partials)
        .await;
    store.close().await;
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }

    if !report.is_consistent() {
        anyhow::bail!(
            "{} orphan blob(s), {} orphan record(s)",
            report.orphan_blobs.len(),
            report.orphan_records.len()
        );
    }
    Ok(())
}

fn render(report: &ReconcileReport) -> String {
    let mut out = String::new();
    if report.is_consistent() {
        out.push_str("Blobs and records agree.\n");
    }
    if !report.orphan_blobs.is_empty() {
        out.push_str("Blobs without a record:\n");
        for id in &report.orphan_blobs {
            out.push_str(&format!("  {}\n", id));
        }
    }
    if !report.orphan_records.is_empty() {
        out.push_str("Records without a blob:\n");
        for record in &report.orphan_records {
            out.push_str(&format!("  {}  {}\n", record.id, record.logical_name));
        }
    }
    if report.partial_files > 0 {
        out.push_str(&format!(
            "Temporary upload files: {} ({} removed)\n",
            report.partial_files, report.partials_removed
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::FileRecord;

    #[test]
    fn test_render_consistent() {
        assert_eq!(
            render(&ReconcileReport::default()),
            "Blobs and records agree.\n"
        );
    }

    #[test]
    fn test_render_orphans() {
        let report = ReconcileReport {
            orphan_blobs: vec!["stray".to_string()],
            orphan_records: vec![FileRecord::new("lost.txt")],
            partial_files: 2,
            partials_removed: 2,
        };
        let out = render(&report);
        assert!(out.contains("Blobs without a record:\n  stray\n"));
        assert!(out.contains("lost.txt"));
        assert!(out.contains("Temporary upload files: 2 (2 removed)"));
        assert!(!out.contains("agree"));
    }
}
