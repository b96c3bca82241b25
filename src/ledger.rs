use crate::error::EconomyError;
use crate::model::{Db, LedgerEntry, LedgerKind};
use chrono::{DateTime, Utc};

pub fn validate_delta(kind: LedgerKind, points_delta: i64) -> Result<(), EconomyError> {
    let ok = match kind {
        LedgerKind::EarnSession | LedgerKind::EarnBonus => points_delta > 0,
        LedgerKind::SpendShop => points_delta < 0,
    };
    if ok {
        Ok(())
    } else {
        Err(EconomyError::InvalidEntry(format!(
            "{} requires a {} delta, got {}",
            kind.as_str(),
            if kind == LedgerKind::SpendShop { "negative" } else { "positive" },
            points_delta
        )))
    }
}

pub fn append(
    db: &mut Db,
    kind: LedgerKind,
    points_delta: i64,
    reference_id: &str,
    description: &str,
    timestamp: DateTime<Utc>,
) -> Result<LedgerEntry, EconomyError> {
    validate_delta(kind, points_delta)?;

    let entry = LedgerEntry {
        id: db.meta.next_ledger_id(),
        timestamp,
        kind,
        points_delta,
        reference_id: reference_id.to_string(),
        description: description.to_string(),
    };
    db.ledger.push(entry.clone());
    tracing::debug!(id = %entry.id, kind = kind.as_str(), points_delta, "ledger entry appended");
    Ok(entry)
}

/// Balance is never stored; it is the sum of every delta.
pub fn balance_of(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.points_delta).sum()
}

pub fn balance(db: &Db) -> i64 {
    balance_of(&db.ledger)
}

/// Minutes of sessions starting in `[start, end)`, optionally for one domain.
pub fn minutes_in_range(
    db: &Db,
    domain_id: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> u32 {
    db.sessions
        .iter()
        .filter(|s| domain_id.map_or(true, |d| s.domain_id == d))
        .filter(|s| s.start_time >= start && s.start_time < end)
        .fold(0u32, |acc, s| acc.saturating_add(s.duration_minutes))
}

pub fn total_minutes_in_range(db: &Db, start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    minutes_in_range(db, None, start, end)
}

pub fn earned_in_range(db: &Db, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    db.ledger
        .iter()
        .filter(|e| e.points_delta > 0)
        .filter(|e| e.timestamp >= start && e.timestamp < end)
        .map(|e| e.points_delta)
        .sum()
}

/// Newest first; ties keep insertion order reversed.
pub fn list_entries(db: &Db, limit: Option<usize>) -> Vec<LedgerEntry> {
    let mut out: Vec<LedgerEntry> = db.ledger.iter().rev().cloned().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if let Some(n) = limit {
        out.truncate(n);
    }
    out
}
