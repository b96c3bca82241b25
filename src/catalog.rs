use crate::error::EconomyError;
use crate::model::{Activity, CatalogSource, Db, Domain, ShopItem};

fn select_index<T>(
    items: &[T],
    selector: &str,
    id_of: impl Fn(&T) -> &str,
    name_of: impl Fn(&T) -> &str,
    not_found: impl Fn(&str) -> EconomyError,
) -> Result<usize, EconomyError> {
    let s = selector.trim();
    if s.is_empty() {
        return Err(EconomyError::usage("Selector is required"));
    }

    if let Some(i) = items.iter().position(|it| id_of(it) == s) {
        return Ok(i);
    }

    let wanted = s.to_lowercase();
    if let Some(i) = items.iter().position(|it| name_of(it).to_lowercase() == wanted) {
        return Ok(i);
    }

    let matches: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, it)| name_of(*it).to_lowercase().starts_with(&wanted))
        .map(|(i, _)| i)
        .collect();

    match matches.len() {
        0 => Err(not_found(selector)),
        1 => Ok(matches[0]),
        _ => {
            let candidates = matches
                .iter()
                .map(|i| format!("{} {}", id_of(&items[*i]), name_of(&items[*i])))
                .collect::<Vec<String>>()
                .join(", ");
            Err(EconomyError::Ambiguous(format!(
                "Ambiguous selector '{}'. Candidates: {}",
                selector, candidates
            )))
        }
    }
}

/// Exact id, exact name, or unique name prefix (case-insensitive).
pub fn select_domain_index(db: &Db, selector: &str) -> Result<usize, EconomyError> {
    select_index(
        &db.domains,
        selector,
        |d| d.id.as_str(),
        |d| d.name.as_str(),
        |s| EconomyError::DomainNotFound(s.to_string()),
    )
}

pub fn select_activity_index(db: &Db, domain_id: &str, selector: &str) -> Result<usize, EconomyError> {
    let owned: Vec<(usize, &Activity)> = db
        .activities
        .iter()
        .enumerate()
        .filter(|(_, a)| a.domain_id == domain_id)
        .collect();
    let picked = select_index(
        &owned,
        selector,
        |(_, a)| a.id.as_str(),
        |(_, a)| a.name.as_str(),
        |s| EconomyError::not_found(format!("Activity not found in domain {}: {}", domain_id, s)),
    )?;
    Ok(owned[picked].0)
}

pub fn select_shop_item_index(db: &Db, selector: &str) -> Result<usize, EconomyError> {
    select_index(
        &db.shop_items,
        selector,
        |i| i.id.as_str(),
        |i| i.name.as_str(),
        |s| EconomyError::not_found(format!("Shop item not found: {}", s)),
    )
}

pub fn find_domain<'a>(db: &'a Db, domain_id: &str) -> Result<&'a Domain, EconomyError> {
    db.domains
        .iter()
        .find(|d| d.id == domain_id)
        .ok_or_else(|| EconomyError::DomainNotFound(domain_id.to_string()))
}

pub fn set_domain_active(db: &mut Db, selector: &str, active: bool) -> Result<Domain, EconomyError> {
    let i = select_domain_index(db, selector)?;
    db.domains[i].is_active = active;
    Ok(db.domains[i].clone())
}

pub fn set_shop_item_active(db: &mut Db, selector: &str, active: bool) -> Result<ShopItem, EconomyError> {
    let i = select_shop_item_index(db, selector)?;
    db.shop_items[i].is_active = active;
    Ok(db.shop_items[i].clone())
}

pub fn list_domains(db: &Db, include_inactive: bool) -> Vec<Domain> {
    db.domains
        .iter()
        .filter(|d| include_inactive || d.is_active)
        .cloned()
        .collect()
}

pub fn list_activities(db: &Db, domain_id: Option<&str>, include_inactive: bool) -> Vec<Activity> {
    db.activities
        .iter()
        .filter(|a| domain_id.map_or(true, |d| a.domain_id == d))
        .filter(|a| include_inactive || a.is_active)
        .cloned()
        .collect()
}

fn placeholder_domain(db: &mut Db, name: &str, base_rate: f64) -> String {
    let domain = Domain::new(db.meta.next_domain_id(), name, base_rate);
    let id = domain.id.clone();
    db.domains.push(domain);
    id
}

fn placeholder_activity(db: &mut Db, domain_id: &str, name: &str) {
    let id = db.meta.next_activity_id();
    db.activities.push(Activity {
        id,
        domain_id: domain_id.to_string(),
        external_config_id: None,
        name: name.to_string(),
        tags: Vec::new(),
        rate_override: None,
        deep_work_eligible: false,
        min_block_minutes: None,
        notes_prompt: None,
        is_active: true,
    });
}

fn placeholder_item(db: &mut Db, category: &str, name: &str, price: i64, cooldown: Option<u32>, review: bool) {
    let id = db.meta.next_shop_item_id();
    db.shop_items.push(ShopItem {
        id,
        category: category.to_string(),
        name: name.to_string(),
        price_points: price,
        cooldown_days: cooldown,
        requires_review: review,
        requirements: Vec::new(),
        is_active: true,
    });
}

/// Replaces the catalog with the first-run defaults. History is untouched.
pub fn install_placeholders(db: &mut Db) {
    db.domains.clear();
    db.activities.clear();
    db.shop_items.clear();
    db.bonus_milestones.clear();

    let work = placeholder_domain(db, "Deep Work", 10.0);
    placeholder_activity(db, &work, "Writing");
    placeholder_activity(db, &work, "Coding");
    let fitness = placeholder_domain(db, "Fitness", 8.0);
    placeholder_activity(db, &fitness, "Running");
    let learning = placeholder_domain(db, "Learning", 10.0);
    placeholder_activity(db, &learning, "Reading");

    placeholder_item(db, "treats", "Fancy coffee", 15, Some(1), false);
    placeholder_item(db, "leisure", "Movie night", 60, Some(7), false);
    placeholder_item(db, "big", "Day off", 400, Some(30), true);

    db.settings.catalog_source = CatalogSource::Placeholder;
    db.settings.imported_at = None;
    db.settings.config_version = None;
    db.settings.config_meta = None;
}
