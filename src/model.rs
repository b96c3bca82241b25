use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DB_VERSION: u32 = 1;
pub const DEFAULT_DAILY_SOFT_CAP_MINUTES: u32 = 360;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Db {
    pub version: u32,
    pub meta: Meta,
    pub settings: Settings,
    pub domains: Vec<Domain>,
    pub activities: Vec<Activity>,
    pub shop_items: Vec<ShopItem>,
    #[serde(default)]
    pub bonus_milestones: Vec<BonusMilestone>,
    pub sessions: Vec<Session>,
    pub bonuses: Vec<Bonus>,
    pub redemptions: Vec<Redemption>,
    pub ledger: Vec<LedgerEntry>,
}

/// Id counters. They only move forward; `reset` starts them over with a fresh store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub next_domain_number: u32,
    pub next_activity_number: u32,
    pub next_shop_item_number: u32,
    pub next_session_number: u32,
    pub next_bonus_number: u32,
    pub next_redemption_number: u32,
    pub next_ledger_number: u32,
}

fn take(counter: &mut u32, prefix: &str, width: usize) -> String {
    let n = *counter;
    *counter = n + 1;
    format!("{}{:0width$}", prefix, n, width = width)
}

impl Meta {
    pub fn fresh() -> Self {
        Self {
            next_domain_number: 1,
            next_activity_number: 1,
            next_shop_item_number: 1,
            next_session_number: 1,
            next_bonus_number: 1,
            next_redemption_number: 1,
            next_ledger_number: 1,
        }
    }

    pub fn next_domain_id(&mut self) -> String {
        take(&mut self.next_domain_number, "d", 4)
    }

    pub fn next_activity_id(&mut self) -> String {
        take(&mut self.next_activity_number, "a", 4)
    }

    pub fn next_shop_item_id(&mut self) -> String {
        take(&mut self.next_shop_item_number, "i", 4)
    }

    pub fn next_session_id(&mut self) -> String {
        take(&mut self.next_session_number, "s", 6)
    }

    pub fn next_bonus_id(&mut self) -> String {
        take(&mut self.next_bonus_number, "b", 6)
    }

    pub fn next_redemption_id(&mut self) -> String {
        take(&mut self.next_redemption_number, "r", 6)
    }

    pub fn next_ledger_id(&mut self) -> String {
        take(&mut self.next_ledger_number, "l", 6)
    }

    pub fn all_counters_valid(&self) -> bool {
        [
            self.next_domain_number,
            self.next_activity_number,
            self.next_shop_item_number,
            self.next_session_number,
            self.next_bonus_number,
            self.next_redemption_number,
            self.next_ledger_number,
        ]
        .iter()
        .all(|n| *n >= 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Placeholder,
    Imported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub catalog_source: CatalogSource,
    pub imported_at: Option<DateTime<Utc>>,
    pub config_version: Option<u32>,
    pub config_meta: Option<ConfigMeta>,
    pub active_session: Option<ActiveSession>,
}

/// Advisory metadata kept from a v2 document. Never read by the point math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMeta {
    pub meta: Option<serde_json::Value>,
    pub economy: Option<serde_json::Value>,
    pub requirements_library: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub domain_id: String,
    pub activity_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub external_config_id: Option<String>,
    pub name: String,
    /// Points per hour before the level multiplier.
    pub base_rate: f64,
    pub lifetime_minutes: u64,
    pub level: u32,
    pub multiplier: f64,
    pub daily_soft_cap_minutes: u32,
    pub daily_hard_cap_minutes: Option<u32>,
    pub color_hint: Option<String>,
    pub is_active: bool,
}

impl Domain {
    pub fn new(id: String, name: &str, base_rate: f64) -> Self {
        let mut domain = Self {
            id,
            external_config_id: None,
            name: name.to_string(),
            base_rate,
            lifetime_minutes: 0,
            level: 1,
            multiplier: 1.0,
            daily_soft_cap_minutes: DEFAULT_DAILY_SOFT_CAP_MINUTES,
            daily_hard_cap_minutes: None,
            color_hint: None,
            is_active: true,
        };
        domain.recompute_level();
        domain
    }

    /// The only place level and multiplier are written.
    pub fn recompute_level(&mut self) {
        let (level, multiplier) = crate::level::level_and_multiplier(self.lifetime_minutes);
        self.level = level;
        self.multiplier = multiplier;
    }

    pub fn add_lifetime_minutes(&mut self, minutes: u32) {
        self.lifetime_minutes = self.lifetime_minutes.saturating_add(minutes as u64);
        self.recompute_level();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub domain_id: String,
    pub external_config_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub rate_override: Option<f64>,
    #[serde(default)]
    pub deep_work_eligible: bool,
    pub min_block_minutes: Option<u32>,
    pub notes_prompt: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Timer,
    Manual,
}

impl SessionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::Timer => "timer",
            SessionSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub domain_id: String,
    pub activity_id: Option<String>,
    pub points_awarded: i64,
    pub source: SessionSource,
    pub review_flag: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub points: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusMilestone {
    pub title: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: String,
    pub category: String,
    pub name: String,
    pub price_points: i64,
    pub cooldown_days: Option<u32>,
    pub requires_review: bool,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub shop_item_id: String,
    /// Price at purchase time; later catalog changes never touch it.
    pub price_points: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    EarnSession,
    EarnBonus,
    SpendShop,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::EarnSession => "earn_session",
            LedgerKind::EarnBonus => "earn_bonus",
            LedgerKind::SpendShop => "spend_shop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LedgerKind,
    pub points_delta: i64,
    pub reference_id: String,
    pub description: String,
}

pub fn empty_db() -> Db {
    Db {
        version: DB_VERSION,
        meta: Meta::fresh(),
        settings: Settings {
            catalog_source: CatalogSource::Placeholder,
            imported_at: None,
            config_version: None,
            config_meta: None,
            active_session: None,
        },
        domains: Vec::new(),
        activities: Vec::new(),
        shop_items: Vec::new(),
        bonus_milestones: Vec::new(),
        sessions: Vec::new(),
        bonuses: Vec::new(),
        redemptions: Vec::new(),
        ledger: Vec::new(),
    }
}

/// First-run state: an empty history with the placeholder catalog installed.
pub fn default_db() -> Db {
    let mut db = empty_db();
    crate::catalog::install_placeholders(&mut db);
    db
}
