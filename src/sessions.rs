use crate::catalog::{find_domain, select_activity_index, select_domain_index};
use crate::clock::Clock;
use crate::error::EconomyError;
use crate::ledger::{append, minutes_in_range, total_minutes_in_range};
use crate::model::{ActiveSession, Activity, Db, Domain, LedgerEntry, LedgerKind, Session, SessionSource};
use chrono::{DateTime, Duration, Utc};

pub const MINIMUM_SESSION_MINUTES: u32 = 5;
pub const DAILY_HARD_CAP_MINUTES: u32 = 720;
pub const SOFT_CAP_PENALTY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Award {
    pub points: i64,
    pub applies_penalty: bool,
    pub below_minimum: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionOutcome {
    pub session: Session,
    pub award: Award,
    pub ledger_entry: Option<LedgerEntry>,
    pub domain: Domain,
    pub leveled_up: bool,
}

/// Rounded half away from zero; zero below the minimum session length.
pub fn calculate_points(duration_minutes: u32, base_rate: f64, multiplier: f64, penalty: bool) -> i64 {
    if duration_minutes < MINIMUM_SESSION_MINUTES {
        return 0;
    }
    let mut raw = (duration_minutes as f64 / 60.0) * base_rate * multiplier;
    if penalty {
        raw *= 1.0 - SOFT_CAP_PENALTY;
    }
    raw.round() as i64
}

/// Prices a session against the domain's current (pre-session) multiplier.
pub fn award_session(
    domain: &Domain,
    activity: Option<&Activity>,
    duration_minutes: u32,
    minutes_in_domain_today: u32,
    total_minutes_today: u32,
) -> Result<Award, EconomyError> {
    if total_minutes_today.saturating_add(duration_minutes) > DAILY_HARD_CAP_MINUTES {
        return Err(EconomyError::HardCapExceeded {
            total_today: total_minutes_today,
            duration: duration_minutes,
            cap: DAILY_HARD_CAP_MINUTES,
        });
    }

    if duration_minutes < MINIMUM_SESSION_MINUTES {
        return Ok(Award {
            points: 0,
            applies_penalty: false,
            below_minimum: true,
        });
    }

    let base_rate = activity
        .and_then(|a| a.rate_override)
        .unwrap_or(domain.base_rate);
    let applies_penalty = minutes_in_domain_today >= domain.daily_soft_cap_minutes;

    Ok(Award {
        points: calculate_points(duration_minutes, base_rate, domain.multiplier, applies_penalty),
        applies_penalty,
        below_minimum: false,
    })
}

#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub domain_id: String,
    pub activity_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub source: SessionSource,
    pub notes: Option<String>,
}

/// Prices, stores and posts one session. Callers run this inside a store
/// transaction so an error leaves nothing behind.
pub fn record_session(db: &mut Db, clock: &Clock, draft: SessionDraft) -> Result<SessionOutcome, EconomyError> {
    let domain_idx = db
        .domains
        .iter()
        .position(|d| d.id == draft.domain_id)
        .ok_or_else(|| EconomyError::DomainNotFound(draft.domain_id.clone()))?;

    let activity: Option<Activity> = match draft.activity_id.as_deref() {
        Some(aid) => Some(
            db.activities
                .iter()
                .find(|a| a.id == aid && a.domain_id == draft.domain_id)
                .cloned()
                .ok_or_else(|| EconomyError::not_found(format!("Activity not found: {}", aid)))?,
        ),
        None => None,
    };

    if draft.duration_minutes == 0 {
        return Err(EconomyError::SessionTooShort("duration must be at least one minute".to_string()));
    }

    let (day_start, day_end) = clock.day_window(draft.start_time)?;
    let in_domain = minutes_in_range(db, Some(draft.domain_id.as_str()), day_start, day_end);
    let total = total_minutes_in_range(db, day_start, day_end);

    let award = match award_session(
        &db.domains[domain_idx],
        activity.as_ref(),
        draft.duration_minutes,
        in_domain,
        total,
    ) {
        Ok(a) => a,
        Err(e) => {
            tracing::info!(domain = %draft.domain_id, minutes = draft.duration_minutes, total_today = total, "session rejected: {}", e);
            return Err(e);
        }
    };

    let session = Session {
        id: db.meta.next_session_id(),
        start_time: draft.start_time,
        end_time: draft.start_time + Duration::minutes(draft.duration_minutes as i64),
        duration_minutes: draft.duration_minutes,
        domain_id: draft.domain_id.clone(),
        activity_id: draft.activity_id.clone(),
        points_awarded: award.points,
        source: draft.source,
        review_flag: draft.source == SessionSource::Manual,
        notes: draft.notes.clone(),
    };
    db.sessions.push(session.clone());

    let ledger_entry = if award.points > 0 {
        let description = format!(
            "{}: {} min{}",
            db.domains[domain_idx].name,
            session.duration_minutes,
            if award.applies_penalty { " (soft cap)" } else { "" }
        );
        Some(append(
            db,
            LedgerKind::EarnSession,
            award.points,
            &session.id,
            &description,
            session.end_time,
        )?)
    } else {
        None
    };

    let before = db.domains[domain_idx].level;
    db.domains[domain_idx].add_lifetime_minutes(session.duration_minutes);
    let domain = db.domains[domain_idx].clone();
    let leveled_up = domain.level > before;

    tracing::info!(
        session = %session.id,
        domain = %domain.id,
        minutes = session.duration_minutes,
        points = award.points,
        penalty = award.applies_penalty,
        "session recorded"
    );
    if leveled_up {
        tracing::info!(domain = %domain.id, level = domain.level, "domain leveled up");
    }

    Ok(SessionOutcome {
        session,
        award,
        ledger_entry,
        domain,
        leveled_up,
    })
}

fn resolve_target(
    db: &Db,
    domain_selector: &str,
    activity_selector: Option<&str>,
) -> Result<(String, Option<String>), EconomyError> {
    let di = select_domain_index(db, domain_selector)?;
    let domain = &db.domains[di];
    if !domain.is_active {
        return Err(EconomyError::usage(format!("Domain is inactive: {}", domain.name)));
    }
    let activity_id = match activity_selector {
        Some(sel) => {
            let ai = select_activity_index(db, &domain.id, sel)?;
            Some(db.activities[ai].id.clone())
        }
        None => None,
    };
    Ok((domain.id.clone(), activity_id))
}

pub fn start_timer(
    db: &mut Db,
    clock: &Clock,
    domain_selector: &str,
    activity_selector: Option<&str>,
    notes: Option<&str>,
) -> Result<ActiveSession, EconomyError> {
    if let Some(active) = db.settings.active_session.as_ref() {
        return Err(EconomyError::SessionAlreadyActive {
            started_at: active.started_at.to_rfc3339(),
        });
    }

    let (domain_id, activity_id) = resolve_target(db, domain_selector, activity_selector)?;
    let active = ActiveSession {
        domain_id,
        activity_id,
        started_at: clock.now(),
        notes: notes.map(|s| s.to_string()),
    };
    db.settings.active_session = Some(active.clone());
    tracing::info!(domain = %active.domain_id, "timer started");
    Ok(active)
}

pub fn stop_timer(db: &mut Db, clock: &Clock) -> Result<SessionOutcome, EconomyError> {
    let active = db
        .settings
        .active_session
        .clone()
        .ok_or_else(|| EconomyError::usage("No active session"))?;

    let elapsed = (clock.now() - active.started_at).num_minutes();
    if elapsed <= 0 {
        return Err(EconomyError::SessionTooShort(format!(
            "less than a minute since {}",
            active.started_at.to_rfc3339()
        )));
    }

    let outcome = record_session(
        db,
        clock,
        SessionDraft {
            domain_id: active.domain_id,
            activity_id: active.activity_id,
            start_time: active.started_at,
            duration_minutes: u32::try_from(elapsed).unwrap_or(u32::MAX),
            source: SessionSource::Timer,
            notes: active.notes,
        },
    )?;
    db.settings.active_session = None;
    Ok(outcome)
}

pub fn cancel_timer(db: &mut Db) -> Result<ActiveSession, EconomyError> {
    let active = db
        .settings
        .active_session
        .take()
        .ok_or_else(|| EconomyError::usage("No active session"))?;
    tracing::info!(domain = %active.domain_id, "timer cancelled");
    Ok(active)
}

/// Manual entries are always flagged for review.
pub fn log_manual(
    db: &mut Db,
    clock: &Clock,
    domain_selector: &str,
    minutes: u32,
    started_at: Option<DateTime<Utc>>,
    activity_selector: Option<&str>,
    notes: Option<&str>,
) -> Result<SessionOutcome, EconomyError> {
    if minutes == 0 {
        return Err(EconomyError::SessionTooShort("minutes must be at least 1".to_string()));
    }
    let (domain_id, activity_id) = resolve_target(db, domain_selector, activity_selector)?;
    let start_time = started_at.unwrap_or_else(|| clock.now() - Duration::minutes(minutes as i64));

    record_session(
        db,
        clock,
        SessionDraft {
            domain_id,
            activity_id,
            start_time,
            duration_minutes: minutes,
            source: SessionSource::Manual,
            notes: notes.map(|s| s.to_string()),
        },
    )
}

/// Sessions starting in `[from, to)`, newest first.
pub fn list_sessions(
    db: &Db,
    domain_id: Option<&str>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<Session> {
    let mut out: Vec<Session> = db
        .sessions
        .iter()
        .filter(|s| domain_id.map_or(true, |d| s.domain_id == d))
        .filter(|s| from.map_or(true, |f| s.start_time >= f))
        .filter(|s| to.map_or(true, |t| s.start_time < t))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.id.cmp(&a.id)));
    out
}

pub fn domain_name(db: &Db, domain_id: &str) -> String {
    find_domain(db, domain_id)
        .map(|d| d.name.clone())
        .unwrap_or_else(|_| domain_id.to_string())
}
