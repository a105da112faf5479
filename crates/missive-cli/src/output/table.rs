use missive_core::model::{MigrationOutcome, RecordId};
use std::collections::BTreeSet;

pub fn print(outcome: &MigrationOutcome) {
    println!("=== Migration ===\n");
    println!(
        "  Overall: {} record(s): {} succeeded, {} failed, {} skipped\n",
        outcome.total(),
        outcome.succeeded.len(),
        outcome.failed.len(),
        outcome.skipped.len()
    );

    // failures first, they need attention
    print_group("Failed (PDF kept)", &outcome.failed);
    print_group("Skipped", &outcome.skipped);
    print_group("Succeeded", &outcome.succeeded);
}

fn print_group(title: &str, ids: &BTreeSet<RecordId>) {
    if ids.is_empty() {
        return;
    }
    println!("  {title}:");
    for id in ids {
        println!("    {id}");
    }
    println!();
}
