use crate::model::{Db, LedgerKind};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ReconcileReport {
    pub dropped_redemptions: Vec<String>,
    pub dropped_bonuses: Vec<String>,
    pub dropped_sessions: Vec<String>,
    pub dropped_ledger_entries: Vec<String>,
    pub recomputed_domains: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_redemptions.is_empty()
            && self.dropped_bonuses.is_empty()
            && self.dropped_sessions.is_empty()
            && self.dropped_ledger_entries.is_empty()
            && self.recomputed_domains.is_empty()
    }
}

fn entry_matches(kind: LedgerKind, delta: i64, db: &Db, reference_id: &str) -> bool {
    match kind {
        LedgerKind::SpendShop => db
            .redemptions
            .iter()
            .any(|r| r.id == reference_id && -r.price_points == delta),
        LedgerKind::EarnBonus => db
            .bonuses
            .iter()
            .any(|b| b.id == reference_id && b.points == delta),
        LedgerKind::EarnSession => db
            .sessions
            .iter()
            .any(|s| s.id == reference_id && s.points_awarded == delta),
    }
}

/// Every redemption, bonus and point-earning session keeps exactly one ledger
/// entry referencing it, and every entry references an existing record of the
/// matching kind. Orphans on either side are dropped.
pub fn reconcile(db: &mut Db) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    // Ledger entries first: a sign violation or dangling reference is an orphan.
    let mut seen_refs: BTreeSet<(LedgerKind, String)> = BTreeSet::new();
    let snapshot = db.clone();
    db.ledger.retain(|e| {
        let valid = crate::ledger::validate_delta(e.kind, e.points_delta).is_ok()
            && entry_matches(e.kind, e.points_delta, &snapshot, &e.reference_id)
            && seen_refs.insert((e.kind, e.reference_id.clone()));
        if !valid {
            report.dropped_ledger_entries.push(e.id.clone());
        }
        valid
    });

    // `seen_refs` now holds exactly the references of the surviving entries.
    let has = |kind: LedgerKind, id: &str| seen_refs.contains(&(kind, id.to_string()));

    let mut dropped_redemptions = Vec::new();
    db.redemptions.retain(|r| {
        let keep = has(LedgerKind::SpendShop, &r.id);
        if !keep {
            dropped_redemptions.push(r.id.clone());
        }
        keep
    });

    let mut dropped_bonuses = Vec::new();
    db.bonuses.retain(|b| {
        let keep = has(LedgerKind::EarnBonus, &b.id);
        if !keep {
            dropped_bonuses.push(b.id.clone());
        }
        keep
    });

    let mut dropped_sessions = Vec::new();
    db.sessions.retain(|s| {
        let keep = s.points_awarded == 0 || has(LedgerKind::EarnSession, &s.id);
        if !keep {
            dropped_sessions.push(s.id.clone());
        }
        keep
    });

    report.dropped_redemptions = dropped_redemptions;
    report.dropped_bonuses = dropped_bonuses;
    report.dropped_sessions = dropped_sessions;

    for d in db.domains.iter_mut() {
        let (level, multiplier) = (d.level, d.multiplier);
        d.recompute_level();
        if d.level != level || d.multiplier != multiplier {
            report.recomputed_domains.push(d.id.clone());
        }
    }

    if report.is_clean() {
        tracing::debug!("reconcile: store is consistent");
    } else {
        tracing::warn!(
            redemptions = report.dropped_redemptions.len(),
            bonuses = report.dropped_bonuses.len(),
            sessions = report.dropped_sessions.len(),
            ledger = report.dropped_ledger_entries.len(),
            domains = report.recomputed_domains.len(),
            "reconcile repaired the store"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonuses::award_bonus;
    use crate::clock::{parse_timestamp, Clock};
    use crate::ledger::balance;
    use crate::model::{default_db, Redemption};
    use crate::sessions::log_manual;
    use crate::shop::purchase;

    fn clock() -> Clock {
        Clock::fixed(parse_timestamp("2026-02-01T10:00:00Z", "now").unwrap())
    }

    fn busy_db() -> Db {
        let mut db = default_db();
        let c = clock();
        award_bonus(&mut db, &c, "seed", 100, None).unwrap();
        log_manual(&mut db, &c, "d0001", 60, None, None, None).unwrap();
        log_manual(&mut db, &c, "d0002", 3, None, None, None).unwrap();
        purchase(&mut db, &c, "fancy", None).unwrap();
        db
    }

    #[test]
    fn consistent_store_is_left_alone() {
        let mut db = busy_db();
        let before = db.clone();
        assert!(reconcile(&mut db).is_clean());
        assert_eq!(db, before);
    }

    #[test]
    fn redemption_without_debit_is_dropped() {
        let mut db = busy_db();
        db.redemptions.push(Redemption {
            id: "r000099".to_string(),
            timestamp: clock().now(),
            shop_item_id: "i0002".to_string(),
            price_points: 60,
            notes: None,
        });
        let report = reconcile(&mut db);
        assert_eq!(report.dropped_redemptions, vec!["r000099".to_string()]);
        assert_eq!(db.redemptions.len(), 1);
    }

    #[test]
    fn dangling_ledger_entries_and_their_orphans_go_together() {
        let mut db = busy_db();
        db.bonuses.clear();
        let report = reconcile(&mut db);

        assert_eq!(report.dropped_ledger_entries.len(), 1);
        assert_eq!(balance(&db), 10 - 15);
        assert!(db.ledger.iter().all(|e| e.kind != LedgerKind::EarnBonus));
    }

    #[test]
    fn derived_levels_are_recomputed() {
        let mut db = busy_db();
        db.domains[0].level = 7;
        db.domains[0].multiplier = 2.1;
        let report = reconcile(&mut db);
        assert_eq!(report.recomputed_domains, vec!["d0001".to_string()]);
        assert_eq!((db.domains[0].level, db.domains[0].multiplier), (1, 1.0));
    }
}
