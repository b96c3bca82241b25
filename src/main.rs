mod backup;
mod bonuses;
mod catalog;
mod clock;
mod config_import;
mod db;
mod error;
mod ledger;
mod level;
mod model;
mod output;
mod reconcile;
mod sessions;
mod shop;
mod status;

use crate::backup::{export_backup, ledger_to_csv, parse_backup, restore_backup, write_private_file};
use crate::bonuses::{award_bonus, award_milestone, list_bonuses};
use crate::catalog::{list_activities, list_domains, select_domain_index, set_domain_active, set_shop_item_active};
use crate::clock::{format_local, parse_boundary, parse_timestamp, Clock};
use crate::config_import::{import_config, PersonalConfig};
use crate::db::{read_db, resolve_db_path, update_db};
use crate::error::EconomyError;
use crate::ledger::{balance, list_entries};
use crate::model::{default_db, CatalogSource};
use crate::output::{format_minutes, progress_bar, Styler, Table};
use crate::reconcile::reconcile;
use crate::sessions::{cancel_timer, domain_name, list_sessions, log_manual, start_timer, stop_timer, SessionOutcome};
use crate::shop::{list_redemptions, list_shop, purchasable_item, purchase};
use crate::status::{build_status, domain_progress, DomainProgress};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use tracing_subscriber::EnvFilter;

const NOW_ENV: &str = "GRIND_NOW";
const LOG_ENV: &str = "GRIND_LOG";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "grind", version, about = "Points economy for time spent on what matters")]
struct Cli {
    /// Overrides the data file path for this invocation.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Overrides "now" (RFC3339 with offset); the offset also defines the local day.
    #[arg(long, global = true)]
    now: Option<String>,

    /// Output format. `csv` is only supported by `export`.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: Format,

    /// Disables ANSI color output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Balance, today's minutes and per-domain progress.
    Status,
    Balance,
    /// Level, multiplier and hours to the next level per domain.
    Level(LevelArgs),
    Domain(DomainArgs),
    Activity(ActivityArgs),
    /// Starts the session timer.
    Start(StartArgs),
    /// Stops the timer and awards points for the elapsed minutes.
    Stop,
    /// Discards the running timer without recording anything.
    Cancel,
    /// Records a completed session manually (flagged for review).
    Log(LogArgs),
    Sessions(SessionsArgs),
    Bonus(BonusArgs),
    Ledger(LedgerArgs),
    Shop(ShopArgs),
    Buy(BuyArgs),
    Redemptions,
    /// Replaces the catalog from a v1/v2 personal configuration file.
    Import(ImportArgs),
    /// Full backup (json) or ledger export (csv).
    Export(ExportArgs),
    /// Replaces all data with a backup file.
    Restore(RestoreArgs),
    /// Drops orphaned records and recomputes derived fields.
    Reconcile,
    /// Erases all data and reinstalls the placeholder catalog.
    Reset(ConfirmArgs),
}

#[derive(Args, Debug)]
struct LevelArgs {
    /// Domain selector: id (d0001) or unique name prefix
    domain: Option<String>,
}

#[derive(Args, Debug)]
struct DomainArgs {
    #[command(subcommand)]
    command: DomainCommand,
}

#[derive(Subcommand, Debug)]
enum DomainCommand {
    List(ListArgs),
    Activate(SelectorArgs),
    Deactivate(SelectorArgs),
}

#[derive(Args, Debug)]
struct ActivityArgs {
    #[command(subcommand)]
    command: ActivityCommand,
}

#[derive(Subcommand, Debug)]
enum ActivityCommand {
    List(ActivityListArgs),
}

#[derive(Args, Debug)]
struct ActivityListArgs {
    #[arg(long)]
    domain: Option<String>,

    /// Include inactive activities
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Include inactive entries
    #[arg(long)]
    all: bool,
}

#[derive(Args, Debug)]
struct SelectorArgs {
    /// Exact id, exact name or unique name prefix (case-insensitive)
    selector: String,
}

#[derive(Args, Debug)]
struct StartArgs {
    domain: String,

    #[arg(long)]
    activity: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct LogArgs {
    domain: String,

    #[arg(long)]
    minutes: u32,

    /// Session start (RFC3339). Defaults to `now - minutes`.
    #[arg(long)]
    at: Option<String>,

    #[arg(long)]
    activity: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct SessionsArgs {
    #[arg(long)]
    domain: Option<String>,

    /// YYYY-MM-DD (local) or RFC3339, inclusive
    #[arg(long)]
    from: Option<String>,

    /// YYYY-MM-DD (local) or RFC3339, exclusive
    #[arg(long)]
    to: Option<String>,
}

#[derive(Args, Debug)]
struct BonusArgs {
    #[command(subcommand)]
    command: BonusCommand,
}

#[derive(Subcommand, Debug)]
enum BonusCommand {
    /// Awards a bonus. Without --points the title must match a configured milestone.
    Award(BonusAwardArgs),
    List,
    Milestones,
}

#[derive(Args, Debug)]
struct BonusAwardArgs {
    title: String,

    #[arg(long)]
    points: Option<i64>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct LedgerArgs {
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct ShopArgs {
    #[command(subcommand)]
    command: ShopCommand,
}

#[derive(Subcommand, Debug)]
enum ShopCommand {
    List(ListArgs),
    Activate(SelectorArgs),
    Deactivate(SelectorArgs),
}

#[derive(Args, Debug)]
struct BuyArgs {
    item: String,

    #[arg(long)]
    notes: Option<String>,

    /// Confirms the purchase.
    #[arg(long)]
    yes: bool,

    /// Confirms the item's requirements were reviewed (needed for review items).
    #[arg(long)]
    reviewed: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    file: String,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    out: Option<String>,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    file: String,

    #[arg(long)]
    yes: bool,
}

#[derive(Args, Debug)]
struct ConfirmArgs {
    #[arg(long)]
    yes: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let code = if e.use_stderr() { 2 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing();

    let exit = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            e.exit_code()
        }
    };

    std::process::exit(exit);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_line(s: &str) {
    println!("{}", s);
}

fn print_json<T: serde::Serialize>(obj: &T) -> Result<(), EconomyError> {
    let s = serde_json::to_string_pretty(obj).map_err(|e| EconomyError::io(e.to_string()))?;
    println!("{}", s);
    Ok(())
}

fn resolve_clock(cli_now: Option<&str>) -> Result<Clock, EconomyError> {
    if let Some(t) = cli_now {
        return Ok(Clock::fixed(parse_timestamp(t, "--now")?));
    }
    if let Ok(t) = std::env::var(NOW_ENV) {
        if !t.trim().is_empty() {
            return Ok(Clock::fixed(parse_timestamp(&t, NOW_ENV)?));
        }
    }
    Ok(Clock::system())
}

fn resolve_color_enabled(no_color_flag: bool) -> bool {
    !no_color_flag && std::env::var_os("NO_COLOR").is_none()
}

fn ensure_format_supported(format: Format, allow_csv: bool) -> Result<(), EconomyError> {
    if format == Format::Csv && !allow_csv {
        return Err(EconomyError::usage("--format csv is only supported by `grind export`"));
    }
    Ok(())
}

fn require_yes(yes: bool, what: &str) -> Result<(), EconomyError> {
    if yes {
        Ok(())
    } else {
        Err(EconomyError::usage(format!("{} requires --yes to confirm", what)))
    }
}

fn yes_no(b: bool) -> String {
    let s = if b { "yes" } else { "no" };
    s.to_string()
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "-".to_string())
}

fn read_file(path: &str) -> Result<String, EconomyError> {
    fs::read_to_string(path).map_err(|e| EconomyError::io(format!("cannot read {}: {}", path, e)))
}

fn progress_table(rows: &[DomainProgress]) -> Table {
    let mut t = Table::new(&["id", "domain", "level", "mult", "progress", "lifetime", "to next", "today"])
        .numeric(&[2, 3, 5, 6]);
    for p in rows.iter() {
        t.row(vec![
            p.id.clone(),
            p.name.clone(),
            p.level.to_string(),
            format!("x{:.2}", p.multiplier),
            progress_bar(p.level_progress_percent, 10),
            format_minutes(p.lifetime_minutes),
            p.hours_to_next_level
                .map(|h| format!("{:.1}h", h))
                .unwrap_or_else(|| "max".to_string()),
            format!("{}/{}m", p.minutes_today, p.daily_soft_cap_minutes),
        ]);
    }
    t
}

fn print_session_outcome(out: &SessionOutcome, db_balance: i64, styler: &Styler) {
    let mut line = format!(
        "{} {} min in {}: {} points",
        out.session.id,
        out.session.duration_minutes,
        out.domain.name,
        styler.points(out.award.points)
    );
    if out.award.below_minimum {
        line.push_str(&styler.dim(" (below minimum, minutes still count toward level)"));
    } else if out.award.applies_penalty {
        line.push_str(&styler.yellow(" (soft cap reached, reduced rate)"));
    }
    print_line(&line);
    if out.leveled_up {
        print_line(&styler.green(&format!(
            "{} reached level {} (x{:.2})",
            out.domain.name, out.domain.level, out.domain.multiplier
        )));
    }
    print_line(&format!("Balance: {}", db_balance));
}

fn run(cli: Cli) -> Result<(), EconomyError> {
    let db_path = resolve_db_path(cli.db.as_deref())?;
    let clock = resolve_clock(cli.now.as_deref())?;
    let styler = Styler::new(resolve_color_enabled(cli.no_color));
    let format = cli.format;
    ensure_format_supported(format, matches!(cli.command, Command::Export(_)))?;

    tracing::debug!(db = %db_path.display(), now = %clock.now(), "resolved environment");

    match cli.command {
        Command::Status => {
            let db = read_db(&db_path)?;
            let status = build_status(&db, &clock)?;
            if format == Format::Json {
                return print_json(&status);
            }

            print_line(&format!(
                "Balance: {}   Earned today: {}   Logged today: {} / {}m",
                status.balance,
                styler.points(status.earned_today),
                format_minutes(status.minutes_today as u64),
                status.daily_hard_cap_minutes
            ));
            if status.catalog_source == CatalogSource::Placeholder {
                print_line(&styler.dim("Using the placeholder catalog; `grind import <file>` loads your own."));
            }
            if let Some(timer) = status.active_session.as_ref() {
                print_line(&format!(
                    "Timer: {} running for {}",
                    timer.domain_name,
                    format_minutes(timer.elapsed_minutes as u64)
                ));
            }
            print_line("");
            print_line(&progress_table(&status.domains).render());
            Ok(())
        }

        Command::Balance => {
            let db = read_db(&db_path)?;
            let b = balance(&db);
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    balance: i64,
                }
                print_json(&Out { balance: b })
            } else {
                print_line(&b.to_string());
                Ok(())
            }
        }

        Command::Level(args) => {
            let db = read_db(&db_path)?;
            let mut rows = domain_progress(&db, &clock, true)?;
            if let Some(sel) = args.domain.as_deref() {
                let id = db.domains[select_domain_index(&db, sel)?].id.clone();
                rows.retain(|r| r.id == id);
            }
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    domains: Vec<DomainProgress>,
                }
                print_json(&Out { domains: rows })
            } else {
                print_line(&progress_table(&rows).render());
                Ok(())
            }
        }

        Command::Domain(args) => match args.command {
            DomainCommand::List(a) => {
                let db = read_db(&db_path)?;
                let domains = list_domains(&db, a.all);
                if format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        domains: Vec<crate::model::Domain>,
                    }
                    return print_json(&Out { domains });
                }
                let mut t = Table::new(&["id", "name", "rate/h", "level", "soft cap", "hard cap", "active"])
                    .numeric(&[2, 3, 4, 5]);
                for d in domains.iter() {
                    t.row(vec![
                        d.id.clone(),
                        d.name.clone(),
                        d.base_rate.to_string(),
                        d.level.to_string(),
                        d.daily_soft_cap_minutes.to_string(),
                        opt(d.daily_hard_cap_minutes),
                        yes_no(d.is_active),
                    ]);
                }
                print_line(&t.render());
                Ok(())
            }
            DomainCommand::Activate(a) => toggle_domain(&db_path, &a.selector, true, format),
            DomainCommand::Deactivate(a) => toggle_domain(&db_path, &a.selector, false, format),
        },

        Command::Activity(args) => match args.command {
            ActivityCommand::List(a) => {
                let db = read_db(&db_path)?;
                let domain_id = match a.domain.as_deref() {
                    Some(sel) => Some(db.domains[select_domain_index(&db, sel)?].id.clone()),
                    None => None,
                };
                let activities = list_activities(&db, domain_id.as_deref(), a.all);
                if format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        activities: Vec<crate::model::Activity>,
                    }
                    return print_json(&Out { activities });
                }
                let mut t = Table::new(&["id", "domain", "name", "rate/h", "tags"]);
                for act in activities.iter() {
                    t.row(vec![
                        act.id.clone(),
                        domain_name(&db, &act.domain_id),
                        act.name.clone(),
                        opt(act.rate_override),
                        act.tags.join(","),
                    ]);
                }
                print_line(&t.render());
                Ok(())
            }
        },

        Command::Start(args) => {
            let active = update_db(&db_path, |db| {
                start_timer(db, &clock, &args.domain, args.activity.as_deref(), args.notes.as_deref())
            })?;
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    active_session: crate::model::ActiveSession,
                }
                return print_json(&Out { active_session: active });
            }
            let db = read_db(&db_path)?;
            print_line(&format!(
                "Timer started for {} at {}",
                domain_name(&db, &active.domain_id),
                format_local(&clock, active.started_at)
            ));
            Ok(())
        }

        Command::Stop => {
            let (outcome, after) = update_db(&db_path, |db| {
                let out = stop_timer(db, &clock)?;
                Ok((out, balance(db)))
            })?;
            if format == Format::Json {
                return print_json(&outcome);
            }
            print_session_outcome(&outcome, after, &styler);
            Ok(())
        }

        Command::Cancel => {
            let cancelled = update_db(&db_path, cancel_timer)?;
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    cancelled: crate::model::ActiveSession,
                }
                return print_json(&Out { cancelled });
            }
            print_line(&format!(
                "Timer cancelled (started {})",
                format_local(&clock, cancelled.started_at)
            ));
            Ok(())
        }

        Command::Log(args) => {
            let started_at = match args.at.as_deref() {
                Some(t) => Some(parse_timestamp(t, "--at")?.with_timezone(&chrono::Utc)),
                None => None,
            };
            let (outcome, after) = update_db(&db_path, |db| {
                let out = log_manual(
                    db,
                    &clock,
                    &args.domain,
                    args.minutes,
                    started_at,
                    args.activity.as_deref(),
                    args.notes.as_deref(),
                )?;
                Ok((out, balance(db)))
            })?;
            if format == Format::Json {
                return print_json(&outcome);
            }
            print_session_outcome(&outcome, after, &styler);
            Ok(())
        }

        Command::Sessions(args) => {
            let db = read_db(&db_path)?;
            let domain_id = match args.domain.as_deref() {
                Some(sel) => Some(db.domains[select_domain_index(&db, sel)?].id.clone()),
                None => None,
            };
            let from = args.from.as_deref().map(|f| parse_boundary(&clock, f, "from")).transpose()?;
            let to = args.to.as_deref().map(|t| parse_boundary(&clock, t, "to")).transpose()?;
            if let (Some(f), Some(t)) = (from, to) {
                if f > t {
                    return Err(EconomyError::usage("Invalid range: from > to"));
                }
            }
            let sessions = list_sessions(&db, domain_id.as_deref(), from, to);
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    sessions: Vec<crate::model::Session>,
                }
                return print_json(&Out { sessions });
            }
            let mut t = Table::new(&["id", "start", "domain", "min", "points", "source", "review"])
                .numeric(&[3, 4]);
            for s in sessions.iter() {
                t.row(vec![
                    s.id.clone(),
                    format_local(&clock, s.start_time),
                    domain_name(&db, &s.domain_id),
                    s.duration_minutes.to_string(),
                    s.points_awarded.to_string(),
                    s.source.as_str().to_string(),
                    if s.review_flag { "!".to_string() } else { String::new() },
                ]);
            }
            print_line(&t.render());
            Ok(())
        }

        Command::Bonus(args) => match args.command {
            BonusCommand::Award(a) => {
                let (outcome, after) = update_db(&db_path, |db| {
                    let out = match a.points {
                        Some(points) => award_bonus(db, &clock, &a.title, points, a.notes.as_deref())?,
                        None => award_milestone(db, &clock, &a.title, a.notes.as_deref())?,
                    };
                    Ok((out, balance(db)))
                })?;
                if format == Format::Json {
                    return print_json(&outcome);
                }
                print_line(&format!(
                    "{} {}: {} points",
                    outcome.bonus.id,
                    outcome.bonus.title,
                    styler.points(outcome.bonus.points)
                ));
                print_line(&format!("Balance: {}", after));
                Ok(())
            }
            BonusCommand::List => {
                let db = read_db(&db_path)?;
                let bonuses = list_bonuses(&db);
                if format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        bonuses: Vec<crate::model::Bonus>,
                    }
                    return print_json(&Out { bonuses });
                }
                let mut t = Table::new(&["id", "when", "title", "points"]).numeric(&[3]);
                for b in bonuses.iter() {
                    t.row(vec![
                        b.id.clone(),
                        format_local(&clock, b.timestamp),
                        b.title.clone(),
                        b.points.to_string(),
                    ]);
                }
                print_line(&t.render());
                Ok(())
            }
            BonusCommand::Milestones => {
                let db = read_db(&db_path)?;
                if format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out<'a> {
                        bonus_milestones: &'a [crate::model::BonusMilestone],
                    }
                    return print_json(&Out {
                        bonus_milestones: &db.bonus_milestones,
                    });
                }
                let mut t = Table::new(&["title", "points"]).numeric(&[1]);
                for m in db.bonus_milestones.iter() {
                    t.row(vec![m.title.clone(), m.points.to_string()]);
                }
                print_line(&t.render());
                Ok(())
            }
        },

        Command::Ledger(args) => {
            let db = read_db(&db_path)?;
            let entries = list_entries(&db, args.limit);
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    balance: i64,
                    entries: Vec<crate::model::LedgerEntry>,
                }
                return print_json(&Out {
                    balance: balance(&db),
                    entries,
                });
            }
            let mut t = Table::new(&["id", "when", "type", "delta", "ref", "description"]).numeric(&[3]);
            for e in entries.iter() {
                t.row(vec![
                    e.id.clone(),
                    format_local(&clock, e.timestamp),
                    e.kind.as_str().to_string(),
                    styler.points(e.points_delta),
                    e.reference_id.clone(),
                    e.description.clone(),
                ]);
            }
            print_line(&t.render());
            Ok(())
        }

        Command::Shop(args) => match args.command {
            ShopCommand::List(a) => {
                let db = read_db(&db_path)?;
                let rows = list_shop(&db, &clock, a.all);
                if format == Format::Json {
                    #[derive(serde::Serialize)]
                    struct Out {
                        balance: i64,
                        items: Vec<crate::shop::ShopRow>,
                    }
                    return print_json(&Out {
                        balance: balance(&db),
                        items: rows,
                    });
                }
                let mut t = Table::new(&["id", "category", "name", "price", "cooldown", "bought", "status"])
                    .numeric(&[3, 5]);
                for r in rows.iter() {
                    let state = match r.cooldown_days_left {
                        Some(d) => styler.yellow(&format!("{}d left", d)),
                        None if !r.affordable => styler.dim("need more points"),
                        None => styler.green("available"),
                    };
                    t.row(vec![
                        r.item.id.clone(),
                        r.item.category.clone(),
                        if r.item.requires_review {
                            format!("{} *", r.item.name)
                        } else {
                            r.item.name.clone()
                        },
                        r.item.price_points.to_string(),
                        r.item.cooldown_days.map(|d| format!("{}d", d)).unwrap_or_else(|| "-".to_string()),
                        r.achieved_count.to_string(),
                        state,
                    ]);
                }
                print_line(&t.render());
                Ok(())
            }
            ShopCommand::Activate(a) => toggle_shop_item(&db_path, &a.selector, true, format),
            ShopCommand::Deactivate(a) => toggle_shop_item(&db_path, &a.selector, false, format),
        },

        Command::Buy(args) => {
            require_yes(args.yes, "purchase")?;
            let outcome = update_db(&db_path, |db| {
                let item = purchasable_item(db, &args.item)?;
                if item.requires_review && !args.reviewed {
                    let reqs = if item.requirements.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", item.requirements.join("; "))
                    };
                    return Err(EconomyError::usage(format!(
                        "{} requires review{}; pass --reviewed once confirmed",
                        item.name, reqs
                    )));
                }
                purchase(db, &clock, &item.id, args.notes.as_deref())
            })?;
            if format == Format::Json {
                return print_json(&outcome);
            }
            print_line(&format!(
                "{} ({})",
                outcome.ledger_entry.description,
                styler.points(outcome.ledger_entry.points_delta)
            ));
            print_line(&format!("Balance: {}", outcome.balance_after));
            Ok(())
        }

        Command::Redemptions => {
            let db = read_db(&db_path)?;
            let redemptions = list_redemptions(&db);
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    redemptions: Vec<crate::model::Redemption>,
                }
                return print_json(&Out { redemptions });
            }
            let mut t = Table::new(&["id", "when", "item", "price", "notes"]).numeric(&[3]);
            for r in redemptions.iter() {
                let name = db
                    .shop_items
                    .iter()
                    .find(|i| i.id == r.shop_item_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| r.shop_item_id.clone());
                t.row(vec![
                    r.id.clone(),
                    format_local(&clock, r.timestamp),
                    name,
                    r.price_points.to_string(),
                    r.notes.clone().unwrap_or_default(),
                ]);
            }
            print_line(&t.render());
            Ok(())
        }

        Command::Import(args) => {
            let config = PersonalConfig::parse(&read_file(&args.file)?)?;
            let report = update_db(&db_path, |db| import_config(db, &clock, &config))?;
            if format == Format::Json {
                return print_json(&report);
            }
            print_line(&report.message);
            if report.dropped_activities > 0 {
                print_line(&styler.yellow(&format!(
                    "{} activities skipped: unknown domain",
                    report.dropped_activities
                )));
            }
            Ok(())
        }

        Command::Export(args) => {
            let db = read_db(&db_path)?;
            let data = match format {
                Format::Csv => ledger_to_csv(&db.ledger),
                _ => {
                    serde_json::to_string_pretty(&export_backup(&db, &clock))
                        .map_err(|e| EconomyError::io(e.to_string()))?
                        + "\n"
                }
            };
            match args.out.as_deref() {
                Some(path) => {
                    write_private_file(path, &data)?;
                    tracing::info!(path, "export written");
                }
                None => print!("{}", data),
            }
            Ok(())
        }

        Command::Restore(args) => {
            require_yes(args.yes, "restore")?;
            let doc = parse_backup(&read_file(&args.file)?)?;
            let report = update_db(&db_path, |db| restore_backup(db, doc))?;
            if format == Format::Json {
                return print_json(&report);
            }
            print_line(&format!(
                "Restored {} domains, {} sessions, {} redemptions, {} ledger entries",
                report.domains, report.sessions, report.redemptions, report.ledger_entries
            ));
            if !report.reconcile.is_clean() {
                print_line(&styler.yellow("Backup contained inconsistent records; see `grind reconcile`."));
            }
            Ok(())
        }

        Command::Reconcile => {
            let report = update_db(&db_path, |db| Ok(reconcile(db)))?;
            if format == Format::Json {
                return print_json(&report);
            }
            if report.is_clean() {
                print_line("Nothing to repair");
            } else {
                let mut t = Table::new(&["record", "dropped / recomputed"]);
                for (label, ids) in [
                    ("redemptions", &report.dropped_redemptions),
                    ("bonuses", &report.dropped_bonuses),
                    ("sessions", &report.dropped_sessions),
                    ("ledger", &report.dropped_ledger_entries),
                    ("domain levels", &report.recomputed_domains),
                ] {
                    if !ids.is_empty() {
                        t.row(vec![label.to_string(), ids.join(", ")]);
                    }
                }
                print_line(&t.render());
            }
            Ok(())
        }

        Command::Reset(args) => {
            require_yes(args.yes, "reset")?;
            update_db(&db_path, |db| {
                *db = default_db();
                Ok(())
            })?;
            tracing::info!(db = %db_path.display(), "all data erased");
            if format == Format::Json {
                #[derive(serde::Serialize)]
                struct Out {
                    success: bool,
                }
                return print_json(&Out { success: true });
            }
            print_line("All data erased; placeholder catalog installed");
            Ok(())
        }
    }
}

fn toggle_domain(db_path: &std::path::Path, selector: &str, active: bool, format: Format) -> Result<(), EconomyError> {
    let domain = update_db(db_path, |db| set_domain_active(db, selector, active))?;
    if format == Format::Json {
        #[derive(serde::Serialize)]
        struct Out {
            domain: crate::model::Domain,
        }
        return print_json(&Out { domain });
    }
    print_line(&format!(
        "{} {}",
        domain.name,
        if active { "activated" } else { "deactivated" }
    ));
    Ok(())
}

fn toggle_shop_item(db_path: &std::path::Path, selector: &str, active: bool, format: Format) -> Result<(), EconomyError> {
    let item = update_db(db_path, |db| set_shop_item_active(db, selector, active))?;
    if format == Format::Json {
        #[derive(serde::Serialize)]
        struct Out {
            item: crate::model::ShopItem,
        }
        return print_json(&Out { item });
    }
    print_line(&format!(
        "{} {}",
        item.name,
        if active { "activated" } else { "deactivated" }
    ));
    Ok(())
}
