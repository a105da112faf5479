use missive_core::error::MissiveError;
use missive_core::model::MigrationOutcome;

pub fn print(outcome: &MigrationOutcome) -> Result<(), MissiveError> {
    let json = serde_json::to_string_pretty(outcome)?;
    println!("{json}");
    Ok(())
}
