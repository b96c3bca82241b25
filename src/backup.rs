use crate::clock::Clock;
use crate::error::EconomyError;
use crate::model::{
    empty_db, Activity, Bonus, BonusMilestone, Db, Domain, LedgerEntry, Redemption, Session, Settings, ShopItem,
};
use crate::reconcile::{reconcile, ReconcileReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub const BACKUP_VERSION: u32 = 1;

/// Verbatim snapshot of every table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub data: BackupData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub domains: Vec<Domain>,
    pub activities: Vec<Activity>,
    pub sessions: Vec<Session>,
    pub bonuses: Vec<Bonus>,
    pub shop_items: Vec<ShopItem>,
    pub redemptions: Vec<Redemption>,
    pub ledger: Vec<LedgerEntry>,
    #[serde(default)]
    pub bonus_milestones: Vec<BonusMilestone>,
    #[serde(default)]
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoreReport {
    pub domains: usize,
    pub sessions: usize,
    pub redemptions: usize,
    pub ledger_entries: usize,
    pub reconcile: ReconcileReport,
}

pub fn export_backup(db: &Db, clock: &Clock) -> BackupDocument {
    BackupDocument {
        version: BACKUP_VERSION,
        exported_at: clock.now(),
        data: BackupData {
            domains: db.domains.clone(),
            activities: db.activities.clone(),
            sessions: db.sessions.clone(),
            bonuses: db.bonuses.clone(),
            shop_items: db.shop_items.clone(),
            redemptions: db.redemptions.clone(),
            ledger: db.ledger.clone(),
            bonus_milestones: db.bonus_milestones.clone(),
            settings: Some(db.settings.clone()),
        },
    }
}

pub fn parse_backup(text: &str) -> Result<BackupDocument, EconomyError> {
    let doc: BackupDocument = serde_json::from_str(text)
        .map_err(|e| EconomyError::invalid_format(format!("backup: {}", e)))?;
    if doc.version != BACKUP_VERSION {
        return Err(EconomyError::invalid_format(format!(
            "unsupported backup version {}",
            doc.version
        )));
    }
    Ok(doc)
}

/// One past the largest numeric suffix among `ids` with the given prefix.
fn next_number<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> u32 {
    ids.filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .map_or(1, |n| n.saturating_add(1))
}

/// Clears every table, inserts the snapshot, then repairs orphans and derived fields.
pub fn restore_backup(db: &mut Db, doc: BackupDocument) -> Result<RestoreReport, EconomyError> {
    if doc.version != BACKUP_VERSION {
        return Err(EconomyError::invalid_format(format!(
            "unsupported backup version {}",
            doc.version
        )));
    }

    let mut fresh = empty_db();
    let data = doc.data;
    if let Some(mut settings) = data.settings {
        settings.active_session = None;
        fresh.settings = settings;
    }
    fresh.domains = data.domains;
    fresh.activities = data.activities;
    fresh.sessions = data.sessions;
    fresh.bonuses = data.bonuses;
    fresh.shop_items = data.shop_items;
    fresh.redemptions = data.redemptions;
    fresh.ledger = data.ledger;
    fresh.bonus_milestones = data.bonus_milestones;

    // Catalog counters also clear every id history still references.
    fresh.meta.next_domain_number = next_number(
        fresh
            .domains
            .iter()
            .map(|d| d.id.as_str())
            .chain(fresh.sessions.iter().map(|s| s.domain_id.as_str())),
        "d",
    );
    fresh.meta.next_activity_number = next_number(
        fresh
            .activities
            .iter()
            .map(|a| a.id.as_str())
            .chain(fresh.sessions.iter().filter_map(|s| s.activity_id.as_deref())),
        "a",
    );
    fresh.meta.next_shop_item_number = next_number(
        fresh
            .shop_items
            .iter()
            .map(|i| i.id.as_str())
            .chain(fresh.redemptions.iter().map(|r| r.shop_item_id.as_str())),
        "i",
    );
    fresh.meta.next_session_number = next_number(fresh.sessions.iter().map(|s| s.id.as_str()), "s");
    fresh.meta.next_bonus_number = next_number(fresh.bonuses.iter().map(|b| b.id.as_str()), "b");
    fresh.meta.next_redemption_number = next_number(fresh.redemptions.iter().map(|r| r.id.as_str()), "r");
    fresh.meta.next_ledger_number = next_number(fresh.ledger.iter().map(|e| e.id.as_str()), "l");

    let report = reconcile(&mut fresh);
    *db = fresh;

    tracing::info!(
        sessions = db.sessions.len(),
        ledger = db.ledger.len(),
        "backup restored"
    );

    Ok(RestoreReport {
        domains: db.domains.len(),
        sessions: db.sessions.len(),
        redemptions: db.redemptions.len(),
        ledger_entries: db.ledger.len(),
        reconcile: report,
    })
}

fn csv_escape(value: &str) -> String {
    if value.contains(['\n', '\r', '"', ',']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn ledger_to_csv(entries: &[LedgerEntry]) -> String {
    let mut lines: Vec<String> = vec!["id,timestamp,type,points_delta,reference_id,description".to_string()];
    for e in entries.iter() {
        let cells = [
            e.id.clone(),
            e.timestamp.to_rfc3339(),
            e.kind.as_str().to_string(),
            e.points_delta.to_string(),
            e.reference_id.clone(),
            e.description.clone(),
        ];
        lines.push(cells.iter().map(|c| csv_escape(c)).collect::<Vec<String>>().join(","));
    }
    lines.join("\n") + "\n"
}

/// Writes a private (0600 on unix) export file.
pub fn write_private_file(path: &str, data: &str) -> Result<(), EconomyError> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|_| EconomyError::io("Export IO error"))?;
    }
    let mut f = fs::File::create(path).map_err(|_| EconomyError::io("Export IO error"))?;
    #[cfg(unix)]
    {
        let _ = f.set_permissions(fs::Permissions::from_mode(0o600));
    }
    f.write_all(data.as_bytes())
        .map_err(|_| EconomyError::io("Export IO error"))?;
    Ok(())
}
