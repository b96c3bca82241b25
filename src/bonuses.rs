use crate::clock::Clock;
use crate::error::EconomyError;
use crate::ledger::{append, validate_delta};
use crate::model::{Bonus, BonusMilestone, Db, LedgerEntry, LedgerKind};

#[derive(Debug, Clone, serde::Serialize)]
pub struct BonusOutcome {
    pub bonus: Bonus,
    pub ledger_entry: LedgerEntry,
}

/// Records a one-off award and its `earn_bonus` entry as a pair.
pub fn award_bonus(
    db: &mut Db,
    clock: &Clock,
    title: &str,
    points: i64,
    notes: Option<&str>,
) -> Result<BonusOutcome, EconomyError> {
    let t = title.trim();
    if t.is_empty() {
        return Err(EconomyError::usage("Bonus title is required"));
    }
    validate_delta(LedgerKind::EarnBonus, points)?;

    let bonus = Bonus {
        id: db.meta.next_bonus_id(),
        timestamp: clock.now(),
        title: t.to_string(),
        points,
        notes: notes.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    db.bonuses.push(bonus.clone());

    let ledger_entry = append(
        db,
        LedgerKind::EarnBonus,
        points,
        &bonus.id,
        &format!("Bonus: {}", bonus.title),
        bonus.timestamp,
    )?;

    tracing::info!(bonus = %bonus.id, points, "bonus awarded");
    Ok(BonusOutcome { bonus, ledger_entry })
}

pub fn find_milestone<'a>(db: &'a Db, title: &str) -> Result<&'a BonusMilestone, EconomyError> {
    let wanted = title.trim().to_lowercase();
    if let Some(m) = db.bonus_milestones.iter().find(|m| m.title.to_lowercase() == wanted) {
        return Ok(m);
    }
    let mut prefixed = db
        .bonus_milestones
        .iter()
        .filter(|m| m.title.to_lowercase().starts_with(&wanted));
    match (prefixed.next(), prefixed.next()) {
        (Some(m), None) => Ok(m),
        (None, _) => Err(EconomyError::not_found(format!("Bonus milestone not found: {}", title))),
        (Some(_), Some(_)) => Err(EconomyError::Ambiguous(format!(
            "Ambiguous milestone '{}'",
            title
        ))),
    }
}

pub fn award_milestone(
    db: &mut Db,
    clock: &Clock,
    title: &str,
    notes: Option<&str>,
) -> Result<BonusOutcome, EconomyError> {
    let milestone = find_milestone(db, title)?.clone();
    award_bonus(db, clock, &milestone.title, milestone.points, notes)
}

pub fn list_bonuses(db: &Db) -> Vec<Bonus> {
    let mut out = db.bonuses.clone();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    out
}
