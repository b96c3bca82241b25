use crate::catalog::find_domain;
use crate::clock::Clock;
use crate::error::EconomyError;
use crate::ledger::{balance, earned_in_range, minutes_in_range, total_minutes_in_range};
use crate::level::{hours_to_next_level, is_max_level, LEVEL_THRESHOLD_HOURS};
use crate::model::{CatalogSource, Db, Domain};
use crate::sessions::DAILY_HARD_CAP_MINUTES;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Status {
    pub now: String,
    pub balance: i64,
    pub earned_today: i64,
    pub minutes_today: u32,
    pub daily_hard_cap_minutes: u32,
    pub catalog_source: CatalogSource,
    pub active_session: Option<ActiveTimerRow>,
    pub domains: Vec<DomainProgress>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ActiveTimerRow {
    pub domain_id: String,
    pub domain_name: String,
    pub activity_id: Option<String>,
    pub started_at: String,
    pub elapsed_minutes: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DomainProgress {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub multiplier: f64,
    pub max_level: bool,
    pub lifetime_minutes: u64,
    pub hours_to_next_level: Option<f64>,
    /// Share of the way from the current level threshold to the next; `None` at max level.
    pub level_progress_percent: Option<u32>,
    pub minutes_today: u32,
    pub daily_soft_cap_minutes: u32,
    pub daily_hard_cap_minutes: Option<u32>,
    pub over_soft_cap: bool,
    pub is_active: bool,
}

fn level_progress_percent(domain: &Domain) -> Option<u32> {
    let i = (domain.level as usize).checked_sub(1)?;
    let floor = *LEVEL_THRESHOLD_HOURS.get(i)?;
    let ceiling = *LEVEL_THRESHOLD_HOURS.get(i + 1)?;
    let hours = domain.lifetime_minutes as f64 / 60.0;
    let pct = ((hours - floor) / (ceiling - floor) * 100.0).floor();
    Some(pct.clamp(0.0, 100.0) as u32)
}

pub fn domain_progress(db: &Db, clock: &Clock, include_inactive: bool) -> Result<Vec<DomainProgress>, EconomyError> {
    let (start, end) = clock.today()?;
    Ok(db
        .domains
        .iter()
        .filter(|d| include_inactive || d.is_active)
        .map(|d| {
            let minutes_today = minutes_in_range(db, Some(d.id.as_str()), start, end);
            DomainProgress {
                id: d.id.clone(),
                name: d.name.clone(),
                level: d.level,
                multiplier: d.multiplier,
                max_level: is_max_level(d.level),
                lifetime_minutes: d.lifetime_minutes,
                hours_to_next_level: hours_to_next_level(d.lifetime_minutes),
                level_progress_percent: level_progress_percent(d),
                minutes_today,
                daily_soft_cap_minutes: d.daily_soft_cap_minutes,
                daily_hard_cap_minutes: d.daily_hard_cap_minutes,
                over_soft_cap: minutes_today >= d.daily_soft_cap_minutes,
                is_active: d.is_active,
            }
        })
        .collect())
}

pub fn build_status(db: &Db, clock: &Clock) -> Result<Status, EconomyError> {
    let (start, end) = clock.today()?;
    let now = clock.now();

    let active_session = db.settings.active_session.as_ref().map(|a| ActiveTimerRow {
        domain_id: a.domain_id.clone(),
        domain_name: find_domain(db, &a.domain_id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|_| a.domain_id.clone()),
        activity_id: a.activity_id.clone(),
        started_at: clock.local(a.started_at).to_rfc3339(),
        elapsed_minutes: (now - a.started_at).num_minutes().max(0),
    });

    Ok(Status {
        now: clock.local(now).to_rfc3339(),
        balance: balance(db),
        earned_today: earned_in_range(db, start, end),
        minutes_today: total_minutes_in_range(db, start, end),
        daily_hard_cap_minutes: DAILY_HARD_CAP_MINUTES,
        catalog_source: db.settings.catalog_source,
        active_session,
        domains: domain_progress(db, clock, false)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonuses::award_bonus;
    use crate::clock::parse_timestamp;
    use crate::model::default_db;
    use crate::sessions::{log_manual, start_timer};

    fn clock(s: &str) -> Clock {
        Clock::fixed(parse_timestamp(s, "now").unwrap())
    }

    #[test]
    fn today_counts_only_the_local_day() {
        let mut db = default_db();
        // Ends 23:50 local the previous evening.
        log_manual(&mut db, &clock("2026-03-09T23:50:00+02:00"), "Deep", 60, None, None, None).unwrap();
        log_manual(&mut db, &clock("2026-03-10T10:00:00+02:00"), "Deep", 90, None, None, None).unwrap();
        award_bonus(&mut db, &clock("2026-03-10T10:05:00+02:00"), "streak", 40, None).unwrap();

        let status = build_status(&db, &clock("2026-03-10T12:00:00+02:00")).unwrap();
        assert_eq!(status.minutes_today, 90);
        assert_eq!(status.earned_today, 15 + 40);
        assert_eq!(status.balance, 10 + 15 + 40);
        assert_eq!(status.catalog_source, CatalogSource::Placeholder);

        let deep = &status.domains[0];
        assert_eq!(deep.minutes_today, 90);
        assert_eq!(deep.lifetime_minutes, 150);
        assert_eq!(deep.level_progress_percent, Some(10));
        assert!(!deep.over_soft_cap);
    }

    #[test]
    fn active_timer_shows_elapsed_minutes() {
        let mut db = default_db();
        start_timer(&mut db, &clock("2026-03-10T09:00:00Z"), "fitness", Some("run"), None).unwrap();
        let status = build_status(&db, &clock("2026-03-10T09:42:30Z")).unwrap();
        let timer = status.active_session.unwrap();
        assert_eq!(timer.domain_name, "Fitness");
        assert_eq!(timer.elapsed_minutes, 42);
    }

    #[test]
    fn max_level_has_no_next_threshold() {
        let mut d = Domain::new("d0009".to_string(), "Veteran", 10.0);
        d.lifetime_minutes = 5000 * 60;
        d.recompute_level();
        assert_eq!(level_progress_percent(&d), None);
        d.lifetime_minutes = 50 * 60;
        d.recompute_level();
        assert_eq!(level_progress_percent(&d), Some(50));
    }
}
