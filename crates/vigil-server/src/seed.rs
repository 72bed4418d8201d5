use crate::config::AlertsSeedFile;
use crate::state::Store;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub users: usize,
}

/// Writes the seed's users and alerts into `store`. Alerts whose id already
/// exists are left untouched.
pub async fn apply_seed(store: &Store, seed: &AlertsSeedFile) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for user in &seed.users {
        store.set_email(&user.user_id, &user.email)?;
        summary.users += 1;
    }

    let repository = store.alerts();
    for alert in &seed.alerts {
        if let Err(e) = alert.condition.validate() {
            tracing::warn!(
                alert_id = %alert.id,
                error = %e,
                "Seeded alert has an invalid condition and will be skipped at evaluation"
            );
        }
        if repository.insert(alert).await? {
            tracing::info!(alert_id = %alert.id, name = %alert.display_name(), "Alert seeded");
            summary.inserted += 1;
        } else {
            tracing::info!(alert_id = %alert.id, "Alert already exists, skipped");
            summary.skipped += 1;
        }
    }

    Ok(summary)
}
