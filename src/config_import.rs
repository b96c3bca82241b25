use crate::clock::Clock;
use crate::error::EconomyError;
use crate::model::{Activity, BonusMilestone, CatalogSource, ConfigMeta, Db, Domain, ShopItem};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigShopItem {
    pub category: String,
    pub name: String,
    pub price_points: i64,
    pub cooldown_days: Option<u32>,
    #[serde(default)]
    pub requires_review: bool,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigMilestone {
    pub title: String,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Domain {
    pub name: String,
    pub base_rate: f64,
    pub daily_soft_cap_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1ActivityGroup {
    pub domain_name: String,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigV1 {
    pub domains: Vec<V1Domain>,
    pub activities: Vec<V1ActivityGroup>,
    pub shop_items: Vec<ConfigShopItem>,
    #[serde(default)]
    pub bonus_milestones: Vec<ConfigMilestone>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Domain {
    pub id: String,
    pub name: String,
    pub base_rate: f64,
    pub daily_soft_cap_minutes: Option<u32>,
    pub daily_hard_cap_minutes: Option<u32>,
    pub color_hint: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Activity {
    pub id: String,
    pub domain_id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub rate_override: Option<f64>,
    #[serde(default)]
    pub deep_work_eligible: bool,
    pub min_block_minutes: Option<u32>,
    pub notes_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigV2 {
    pub meta: Option<Value>,
    pub economy: Option<Value>,
    pub domains: Vec<V2Domain>,
    pub activity_library: Vec<V2Activity>,
    pub shop_items: Vec<ConfigShopItem>,
    #[serde(default)]
    pub bonus_milestones: Vec<ConfigMilestone>,
    pub requirements_library: Option<Value>,
}

/// The `version` field selects the variant; every other shape is rejected
/// before the catalog is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonalConfig {
    V1(ConfigV1),
    V2(ConfigV2),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub version: u32,
    pub domains: usize,
    pub activities: usize,
    pub dropped_activities: usize,
    pub shop_items: usize,
    pub bonus_milestones: usize,
}

fn require_array(obj: &serde_json::Map<String, Value>, key: &str) -> Result<(), EconomyError> {
    match obj.get(key) {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(EconomyError::invalid_format(format!("`{}` must be an array", key))),
        None => Err(EconomyError::invalid_format(format!("missing `{}` section", key))),
    }
}

fn decode<T: serde::de::DeserializeOwned>(v: Value, version: u64) -> Result<T, EconomyError> {
    serde_json::from_value(v)
        .map_err(|e| EconomyError::invalid_format(format!("v{} config: {}", version, e)))
}

impl PersonalConfig {
    pub fn parse(text: &str) -> Result<Self, EconomyError> {
        let v: Value = serde_json::from_str(text)
            .map_err(|e| EconomyError::invalid_format(format!("not valid JSON: {}", e)))?;
        Self::from_value(v)
    }

    pub fn from_value(v: Value) -> Result<Self, EconomyError> {
        let obj = v
            .as_object()
            .ok_or_else(|| EconomyError::invalid_format("expected a JSON object"))?;
        let version = obj
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| EconomyError::invalid_format("missing or non-numeric `version`"))?;

        let config = match version {
            1 => {
                for key in ["domains", "shopItems", "activities"] {
                    require_array(obj, key)?;
                }
                PersonalConfig::V1(decode(v, version)?)
            }
            2 => {
                for key in ["domains", "shopItems", "activityLibrary"] {
                    require_array(obj, key)?;
                }
                PersonalConfig::V2(decode(v, version)?)
            }
            other => {
                return Err(EconomyError::invalid_format(format!(
                    "unsupported config version {}",
                    other
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn version(&self) -> u32 {
        match self {
            PersonalConfig::V1(_) => 1,
            PersonalConfig::V2(_) => 2,
        }
    }

    fn validate(&self) -> Result<(), EconomyError> {
        let (domains, items, milestones): (Vec<(&str, &str, f64)>, &[ConfigShopItem], &[ConfigMilestone]) = match self {
            PersonalConfig::V1(c) => (
                c.domains.iter().map(|d| (d.name.as_str(), d.name.as_str(), d.base_rate)).collect(),
                c.shop_items.as_slice(),
                c.bonus_milestones.as_slice(),
            ),
            PersonalConfig::V2(c) => (
                c.domains.iter().map(|d| (d.id.as_str(), d.name.as_str(), d.base_rate)).collect(),
                c.shop_items.as_slice(),
                c.bonus_milestones.as_slice(),
            ),
        };

        let mut keys: BTreeSet<String> = BTreeSet::new();
        for (key, name, rate) in domains.iter() {
            if name.trim().is_empty() {
                return Err(EconomyError::invalid_format("domain name is required"));
            }
            if !rate.is_finite() || *rate < 0.0 {
                return Err(EconomyError::invalid_format(format!("domain {}: invalid baseRate", name)));
            }
            if !keys.insert(key.trim().to_string()) {
                return Err(EconomyError::invalid_format(format!("duplicate domain: {}", key)));
            }
        }

        for item in items.iter() {
            if item.name.trim().is_empty() {
                return Err(EconomyError::invalid_format("shop item name is required"));
            }
            if item.price_points <= 0 {
                return Err(EconomyError::invalid_format(format!(
                    "shop item {}: pricePoints must be positive",
                    item.name
                )));
            }
        }

        for m in milestones.iter() {
            if m.title.trim().is_empty() || m.points <= 0 {
                return Err(EconomyError::invalid_format(format!(
                    "bonus milestone '{}' needs a title and positive points",
                    m.title
                )));
            }
        }

        if let PersonalConfig::V2(c) = self {
            for a in c.activity_library.iter() {
                if let Some(rate) = a.rate_override {
                    if !rate.is_finite() || rate < 0.0 {
                        return Err(EconomyError::invalid_format(format!(
                            "activity {}: invalid rateOverride",
                            a.id
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn new_activity(id: String, domain_id: &str, name: &str) -> Activity {
    Activity {
        id,
        domain_id: domain_id.to_string(),
        external_config_id: None,
        name: name.trim().to_string(),
        tags: Vec::new(),
        rate_override: None,
        deep_work_eligible: false,
        min_block_minutes: None,
        notes_prompt: None,
        is_active: true,
    }
}

fn insert_shop_items(db: &mut Db, items: &[ConfigShopItem]) {
    for it in items.iter() {
        let id = db.meta.next_shop_item_id();
        db.shop_items.push(ShopItem {
            id,
            category: it.category.trim().to_string(),
            name: it.name.trim().to_string(),
            price_points: it.price_points,
            cooldown_days: it.cooldown_days,
            requires_review: it.requires_review,
            requirements: it.requirements.clone(),
            is_active: it.is_active,
        });
    }
}

fn insert_milestones(db: &mut Db, milestones: &[ConfigMilestone]) {
    db.bonus_milestones = milestones
        .iter()
        .map(|m| BonusMilestone {
            title: m.title.trim().to_string(),
            points: m.points,
        })
        .collect();
}

/// Returns `(activities inserted, activities dropped)`.
fn import_v1(db: &mut Db, c: &ConfigV1) -> (usize, usize) {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    for d in c.domains.iter() {
        let mut domain = Domain::new(db.meta.next_domain_id(), d.name.trim(), d.base_rate);
        if let Some(cap) = d.daily_soft_cap_minutes {
            domain.daily_soft_cap_minutes = cap;
        }
        domain.is_active = d.is_active;
        by_name.insert(d.name.trim().to_string(), domain.id.clone());
        db.domains.push(domain);
    }

    let (mut inserted, mut dropped) = (0usize, 0usize);
    for group in c.activities.iter() {
        let Some(domain_id) = by_name.get(group.domain_name.trim()).cloned() else {
            tracing::debug!(domain = %group.domain_name, "dropping activities for unknown domain");
            dropped += group.activities.len();
            continue;
        };
        for name in group.activities.iter().filter(|n| !n.trim().is_empty()) {
            let id = db.meta.next_activity_id();
            db.activities.push(new_activity(id, &domain_id, name));
            inserted += 1;
        }
    }

    insert_shop_items(db, &c.shop_items);
    insert_milestones(db, &c.bonus_milestones);
    (inserted, dropped)
}

fn import_v2(db: &mut Db, c: &ConfigV2) -> (usize, usize) {
    let mut by_id: BTreeMap<String, String> = BTreeMap::new();
    for d in c.domains.iter() {
        let mut domain = Domain::new(db.meta.next_domain_id(), d.name.trim(), d.base_rate);
        domain.external_config_id = Some(d.id.clone());
        if let Some(cap) = d.daily_soft_cap_minutes {
            domain.daily_soft_cap_minutes = cap;
        }
        domain.daily_hard_cap_minutes = d.daily_hard_cap_minutes;
        domain.color_hint = d.color_hint.clone();
        domain.is_active = d.is_active;
        by_id.insert(d.id.trim().to_string(), domain.id.clone());
        db.domains.push(domain);
    }

    let (mut inserted, mut dropped) = (0usize, 0usize);
    for a in c.activity_library.iter() {
        let Some(domain_id) = by_id.get(a.domain_id.trim()).cloned() else {
            tracing::debug!(activity = %a.id, domain = %a.domain_id, "dropping activity for unknown domain");
            dropped += 1;
            continue;
        };
        let id = db.meta.next_activity_id();
        let mut activity = new_activity(id, &domain_id, &a.name);
        activity.external_config_id = Some(a.id.clone());
        activity.tags = a.tags.clone();
        activity.rate_override = a.rate_override;
        activity.deep_work_eligible = a.deep_work_eligible;
        activity.min_block_minutes = a.min_block_minutes;
        activity.notes_prompt = a.notes_prompt.clone();
        db.activities.push(activity);
        inserted += 1;
    }

    insert_shop_items(db, &c.shop_items);
    insert_milestones(db, &c.bonus_milestones);
    (inserted, dropped)
}

/// Replaces the catalog wholesale. Sessions, bonuses, redemptions and the
/// ledger are never touched. Run inside a store transaction.
pub fn import_config(db: &mut Db, clock: &Clock, config: &PersonalConfig) -> Result<ImportReport, EconomyError> {
    let active_domain_name = db.settings.active_session.as_ref().and_then(|a| {
        db.domains
            .iter()
            .find(|d| d.id == a.domain_id)
            .map(|d| d.name.clone())
    });

    db.domains.clear();
    db.activities.clear();
    db.shop_items.clear();
    db.bonus_milestones.clear();

    // Counters keep running so new catalog ids never collide with ids history still holds.
    let (activities, dropped) = match config {
        PersonalConfig::V1(c) => import_v1(db, c),
        PersonalConfig::V2(c) => import_v2(db, c),
    };

    db.settings.catalog_source = CatalogSource::Imported;
    db.settings.imported_at = Some(clock.now());
    db.settings.config_version = Some(config.version());
    db.settings.config_meta = match config {
        PersonalConfig::V1(_) => None,
        PersonalConfig::V2(c) => Some(ConfigMeta {
            meta: c.meta.clone(),
            economy: c.economy.clone(),
            requirements_library: c.requirements_library.clone(),
        }),
    };

    // A running timer follows its domain by name; otherwise it is dropped.
    if let Some(active) = db.settings.active_session.as_mut() {
        let remapped = active_domain_name
            .as_deref()
            .and_then(|name| db.domains.iter().find(|d| d.name == name));
        match remapped {
            Some(d) => {
                active.domain_id = d.id.clone();
                active.activity_id = None;
            }
            None => {
                tracing::warn!("active timer dropped: its domain is not in the imported config");
                db.settings.active_session = None;
            }
        }
    }

    let report = ImportReport {
        success: true,
        message: format!(
            "Imported v{} config: {} domains, {} activities, {} shop items",
            config.version(),
            db.domains.len(),
            activities,
            db.shop_items.len()
        ),
        version: config.version(),
        domains: db.domains.len(),
        activities,
        dropped_activities: dropped,
        shop_items: db.shop_items.len(),
        bonus_milestones: db.bonus_milestones.len(),
    };
    tracing::info!(version = report.version, dropped_activities = dropped, "{}", report.message);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::parse_timestamp;
    use crate::model::default_db;
    use crate::sessions::log_manual;
    use serde_json::json;

    fn clock() -> Clock {
        Clock::fixed(parse_timestamp("2026-02-01T10:00:00Z", "now").unwrap())
    }

    fn v1_doc() -> Value {
        json!({
            "version": 1,
            "domains": [
                {"name": "Writing", "baseRate": 12, "dailySoftCapMinutes": 240, "isActive": true},
                {"name": "Guitar", "baseRate": 6, "isActive": true}
            ],
            "activities": [
                {"domainName": "Writing", "activities": ["Essay", "Journal"]},
                {"domainName": "Cooking", "activities": ["Bread"]}
            ],
            "shopItems": [
                {"category": "treat", "name": "Cinema", "pricePoints": 80, "cooldownDays": 7, "requiresReview": false, "isActive": true}
            ],
            "bonusMilestones": [{"title": "Finish draft", "points": 200}]
        })
    }

    fn v2_doc() -> Value {
        json!({
            "version": 2,
            "meta": {"owner": "sam", "timezone": "Europe/Berlin"},
            "economy": {"softCapPenalty": 0.3},
            "domains": [
                {"id": "dw", "name": "Deep Work", "baseRate": 10, "dailyHardCapMinutes": 480, "colorHint": "#336699", "isActive": true}
            ],
            "activityLibrary": [
                {"id": "act-draft", "domainId": "dw", "name": "Drafting", "tags": ["focus"], "rateOverride": 14, "deepWorkEligible": true, "minBlockMinutes": 50},
                {"id": "act-ghost", "domainId": "gone", "name": "Orphan"}
            ],
            "shopItems": [
                {"category": "big", "name": "Weekend trip", "pricePoints": 900, "cooldownDays": 60, "requiresReview": true, "requirements": ["no-debt"], "isActive": true}
            ],
            "requirementsLibrary": {"no-debt": "No outstanding obligations"}
        })
    }

    #[test]
    fn unknown_version_and_missing_sections_are_invalid_format() {
        for doc in [
            json!({"version": 3, "domains": [], "shopItems": []}),
            json!({"domains": []}),
            json!({"version": 1, "domains": [], "shopItems": []}),
            json!({"version": 2, "domains": [], "shopItems": [], "activities": []}),
            json!([1, 2]),
        ] {
            assert!(matches!(
                PersonalConfig::from_value(doc),
                Err(EconomyError::InvalidFormat(_))
            ));
        }
        assert!(matches!(PersonalConfig::parse("{nope"), Err(EconomyError::InvalidFormat(_))));
    }

    #[test]
    fn non_positive_prices_are_rejected() {
        let mut doc = v1_doc();
        doc["shopItems"][0]["pricePoints"] = json!(0);
        assert!(matches!(
            PersonalConfig::from_value(doc),
            Err(EconomyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn v1_import_maps_by_name_and_drops_unresolved_activities() {
        let mut db = default_db();
        let cfg = PersonalConfig::from_value(v1_doc()).unwrap();
        let report = import_config(&mut db, &clock(), &cfg).unwrap();

        assert!(report.success);
        assert_eq!(report.domains, 2);
        assert_eq!(report.activities, 2);
        assert_eq!(report.dropped_activities, 1);
        assert_eq!(db.domains[0].daily_soft_cap_minutes, 240);
        assert_eq!(db.domains[1].daily_soft_cap_minutes, 360);
        assert_eq!(db.domains[0].id, "d0004");
        assert!(db.activities.iter().all(|a| a.domain_id == db.domains[0].id));
        assert_eq!(db.bonus_milestones.len(), 1);
        assert_eq!(db.settings.catalog_source, CatalogSource::Imported);
        assert!(db.settings.config_meta.is_none());
    }

    /// The catalog with ids blanked, and references rewritten to names.
    fn catalog_without_ids(db: &Db) -> (Vec<Domain>, Vec<Activity>, Vec<ShopItem>) {
        let domains = db
            .domains
            .iter()
            .map(|d| Domain { id: String::new(), ..d.clone() })
            .collect();
        let activities = db
            .activities
            .iter()
            .map(|a| Activity {
                id: String::new(),
                domain_id: db
                    .domains
                    .iter()
                    .find(|d| d.id == a.domain_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_default(),
                ..a.clone()
            })
            .collect();
        let items = db
            .shop_items
            .iter()
            .map(|i| ShopItem { id: String::new(), ..i.clone() })
            .collect();
        (domains, activities, items)
    }

    #[test]
    fn reimporting_is_idempotent_and_keeps_history() {
        let mut db = default_db();
        log_manual(&mut db, &clock(), "d0001", 60, None, None, None).unwrap();
        let sessions = db.sessions.clone();
        let ledger = db.ledger.clone();

        let cfg = PersonalConfig::from_value(v1_doc()).unwrap();
        import_config(&mut db, &clock(), &cfg).unwrap();
        let first = catalog_without_ids(&db);
        let first_ids: Vec<String> = db.domains.iter().map(|d| d.id.clone()).collect();
        import_config(&mut db, &clock(), &cfg).unwrap();
        import_config(&mut db, &clock(), &cfg).unwrap();

        assert_eq!(first, catalog_without_ids(&db));
        assert!(db.domains.iter().all(|d| !first_ids.contains(&d.id)));
        assert_eq!(db.sessions, sessions);
        assert_eq!(db.ledger, ledger);
        assert!(db.domains.iter().all(|d| d.lifetime_minutes == 0 && d.level == 1));
    }

    #[test]
    fn v2_import_keeps_detail_and_advisory_metadata() {
        let mut db = default_db();
        let cfg = PersonalConfig::from_value(v2_doc()).unwrap();
        let report = import_config(&mut db, &clock(), &cfg).unwrap();

        assert_eq!(report.version, 2);
        assert_eq!(report.dropped_activities, 1);
        let d = &db.domains[0];
        assert_eq!(d.external_config_id.as_deref(), Some("dw"));
        assert_eq!(d.daily_hard_cap_minutes, Some(480));
        let a = &db.activities[0];
        assert_eq!(a.rate_override, Some(14.0));
        assert_eq!(a.tags, vec!["focus".to_string()]);
        assert_eq!(db.shop_items[0].requirements, vec!["no-debt".to_string()]);

        let meta = db.settings.config_meta.as_ref().unwrap();
        assert_eq!(meta.meta.as_ref().unwrap()["owner"], "sam");
        assert!(meta.requirements_library.is_some());
    }

    #[test]
    fn running_timer_follows_its_domain_by_name() {
        let mut db = default_db();
        crate::sessions::start_timer(&mut db, &clock(), "Learning", None, None).unwrap();
        let cfg = PersonalConfig::from_value(v2_doc()).unwrap();
        import_config(&mut db, &clock(), &cfg).unwrap();
        assert!(db.settings.active_session.is_none());

        let mut db = default_db();
        crate::sessions::start_timer(&mut db, &clock(), "Deep Work", Some("Coding"), None).unwrap();
        import_config(&mut db, &clock(), &cfg).unwrap();
        let active = db.settings.active_session.clone().unwrap();
        assert_eq!(active.domain_id, db.domains[0].id);
        assert_ne!(active.domain_id, "d0001");
        assert_eq!(active.activity_id, None);
    }

    #[test]
    fn imported_domain_does_not_inherit_old_history() {
        let mut db = default_db();
        log_manual(&mut db, &clock(), "Deep Work", 400, None, None, None).unwrap();
        let old_domain = db.sessions[0].domain_id.clone();

        let cfg = PersonalConfig::from_value(json!({
            "version": 1,
            "domains": [{"name": "Guitar", "baseRate": 10, "isActive": true}],
            "activities": [],
            "shopItems": []
        }))
        .unwrap();
        import_config(&mut db, &clock(), &cfg).unwrap();

        let guitar = db.domains[0].id.clone();
        assert_eq!(guitar, "d0004");
        assert_ne!(guitar, old_domain);

        let later = Clock::fixed(parse_timestamp("2026-02-01T12:00:00Z", "now").unwrap());
        let outcome = log_manual(&mut db, &later, "Guitar", 60, None, None, None).unwrap();
        assert!(!outcome.award.applies_penalty);
        assert_eq!(outcome.award.points, 10);
        assert_eq!(db.sessions[0].domain_id, old_domain);
    }
}
