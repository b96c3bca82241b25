use crate::catalog::select_shop_item_index;
use crate::clock::{Clock, DAY_MS};
use crate::error::EconomyError;
use crate::ledger::{append, balance, validate_delta};
use crate::model::{Db, LedgerEntry, LedgerKind, Redemption, ShopItem};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, serde::Serialize)]
pub struct PurchaseOutcome {
    pub redemption: Redemption,
    pub ledger_entry: LedgerEntry,
    pub balance_after: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ShopRow {
    pub item: ShopItem,
    pub achieved_count: usize,
    pub cooldown_days_left: Option<i64>,
    pub affordable: bool,
}

pub fn redemptions_for_item(db: &Db, item_id: &str) -> Vec<Redemption> {
    db.redemptions
        .iter()
        .filter(|r| r.shop_item_id == item_id)
        .cloned()
        .collect()
}

/// Whole days (rounded up) until the item can be bought again, if still cooling down.
pub fn cooldown_days_left(item: &ShopItem, history: &[Redemption], now: DateTime<Utc>) -> Option<i64> {
    let days = item.cooldown_days?;
    let last = history.iter().map(|r| r.timestamp).max()?;
    let cooldown_ms = days as i64 * DAY_MS;
    let elapsed_ms = (now - last).num_milliseconds();
    if elapsed_ms >= cooldown_ms {
        return None;
    }
    let remaining_ms = cooldown_ms - elapsed_ms;
    Some((remaining_ms + DAY_MS - 1) / DAY_MS)
}

/// Balance first, then cooldown. Review gating is left to the caller.
pub fn check_purchase(
    item: &ShopItem,
    current_balance: i64,
    history_for_item: &[Redemption],
    now: DateTime<Utc>,
) -> Result<(), EconomyError> {
    if current_balance < item.price_points {
        return Err(EconomyError::InsufficientBalance {
            balance: current_balance,
            price: item.price_points,
        });
    }
    if let Some(days_left) = cooldown_days_left(item, history_for_item, now) {
        return Err(EconomyError::OnCooldown { days_left });
    }
    Ok(())
}

pub fn purchasable_item(db: &Db, selector: &str) -> Result<ShopItem, EconomyError> {
    let i = select_shop_item_index(db, selector)?;
    let item = db.shop_items[i].clone();
    if !item.is_active {
        return Err(EconomyError::usage(format!("Shop item is inactive: {}", item.name)));
    }
    Ok(item)
}

/// Creates the redemption (with a price snapshot) and its `spend_shop` debit.
/// Callers run this inside a store transaction so both land or neither does.
pub fn purchase(
    db: &mut Db,
    clock: &Clock,
    selector: &str,
    notes: Option<&str>,
) -> Result<PurchaseOutcome, EconomyError> {
    let item = purchasable_item(db, selector)?;
    let now = clock.now();
    let current = balance(db);
    let history = redemptions_for_item(db, &item.id);

    if let Err(e) = check_purchase(&item, current, &history, now) {
        tracing::info!(item = %item.id, balance = current, "purchase rejected: {}", e);
        return Err(e);
    }
    validate_delta(LedgerKind::SpendShop, -item.price_points)?;

    let redemption = Redemption {
        id: db.meta.next_redemption_id(),
        timestamp: now,
        shop_item_id: item.id.clone(),
        price_points: item.price_points,
        notes: notes.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    db.redemptions.push(redemption.clone());

    let ledger_entry = append(
        db,
        LedgerKind::SpendShop,
        -redemption.price_points,
        &redemption.id,
        &format!("Redeemed: {}", item.name),
        now,
    )?;

    let balance_after = balance(db);
    tracing::info!(redemption = %redemption.id, item = %item.id, price = item.price_points, balance_after, "item redeemed");

    Ok(PurchaseOutcome {
        redemption,
        ledger_entry,
        balance_after,
    })
}

pub fn list_shop(db: &Db, clock: &Clock, include_inactive: bool) -> Vec<ShopRow> {
    let current = balance(db);
    let now = clock.now();
    db.shop_items
        .iter()
        .filter(|i| include_inactive || i.is_active)
        .map(|i| {
            let history = redemptions_for_item(db, &i.id);
            ShopRow {
                item: i.clone(),
                achieved_count: history.len(),
                cooldown_days_left: cooldown_days_left(i, &history, now),
                affordable: current >= i.price_points,
            }
        })
        .collect()
}

pub fn list_redemptions(db: &Db) -> Vec<Redemption> {
    let mut out = db.redemptions.clone();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonuses::award_bonus;
    use crate::clock::parse_timestamp;
    use crate::model::default_db;

    fn clock(s: &str) -> Clock {
        Clock::fixed(parse_timestamp(s, "now").unwrap())
    }

    fn funded_db(points: i64) -> Db {
        let mut db = default_db();
        award_bonus(&mut db, &clock("2026-01-01T08:00:00Z"), "seed", points, None).unwrap();
        db
    }

    #[test]
    fn insufficient_balance_is_checked_first() {
        let mut db = funded_db(10);
        let before = db.clone();
        let err = purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "Movie night", None).unwrap_err();
        assert_eq!(err, EconomyError::InsufficientBalance { balance: 10, price: 60 });
        assert_eq!(db, before);
    }

    #[test]
    fn cooldown_blocks_repurchase_until_it_elapses() {
        let mut db = funded_db(500);
        purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "movie", None).unwrap();

        let err = purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "movie", None).unwrap_err();
        assert_eq!(err, EconomyError::OnCooldown { days_left: 7 });

        let err = purchase(&mut db, &clock("2026-01-08T09:00:00Z"), "movie", None).unwrap_err();
        assert_eq!(err, EconomyError::OnCooldown { days_left: 1 });

        assert!(purchase(&mut db, &clock("2026-01-10T08:00:00Z"), "movie", None).is_ok());
        assert_eq!(redemptions_for_item(&db, "i0002").len(), 2);
    }

    #[test]
    fn redemption_pairs_with_spend_entry_and_snapshots_price() {
        let mut db = funded_db(100);
        let out = purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "i0001", Some("oat latte")).unwrap();

        assert_eq!(out.ledger_entry.kind, LedgerKind::SpendShop);
        assert_eq!(out.ledger_entry.reference_id, out.redemption.id);
        assert_eq!(out.ledger_entry.points_delta, -out.redemption.price_points);
        assert_eq!(out.balance_after, 85);

        db.shop_items[0].price_points = 999;
        assert_eq!(db.redemptions[0].price_points, 15);
    }

    #[test]
    fn inactive_items_cannot_be_bought() {
        let mut db = funded_db(100);
        db.shop_items[0].is_active = false;
        assert!(matches!(
            purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "i0001", None),
            Err(EconomyError::Usage(_))
        ));
    }

    #[test]
    fn shop_listing_derives_counts_and_cooldowns() {
        let mut db = funded_db(100);
        purchase(&mut db, &clock("2026-01-02T08:00:00Z"), "movie", None).unwrap();
        let rows = list_shop(&db, &clock("2026-01-04T08:00:00Z"), false);

        let movie = rows.iter().find(|r| r.item.id == "i0002").unwrap();
        assert_eq!(movie.achieved_count, 1);
        assert_eq!(movie.cooldown_days_left, Some(5));
        let coffee = rows.iter().find(|r| r.item.id == "i0001").unwrap();
        assert!(coffee.affordable);
        assert_eq!(coffee.cooldown_days_left, None);
    }
}
