use crate::utils::damage::{
    AttackProfile, CriticalEffect, DEFAULT_CRITICAL_THRESHOLD, Damage, NO_SAVE, SAVE_RANGE,
    expected_damage,
};
use crate::utils::dice::{average_dice, parse_numeric, x_plus_threshold};
use crate::utils::reference::UnitRecord;
use serde::Serialize;
use serde_json::Value;

const WEAPON_BUCKETS: [&str; 3] = ["basic", "advanced", "selected"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponKind {
    Melee,
    Ranged,
}

impl WeaponKind {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.as_i64() == Some(0) => Some(WeaponKind::Melee),
            Value::Number(n) if n.as_i64() == Some(1) => Some(WeaponKind::Ranged),
            Value::String(s) if s.eq_ignore_ascii_case("melee") => Some(WeaponKind::Melee),
            Value::String(s) if s.eq_ignore_ascii_case("ranged") => Some(WeaponKind::Ranged),
            _ => None,
        }
    }
}

/// One weapon profile read from a unit, with how many of it each model carries.
#[derive(Debug, Clone)]
pub struct WeaponProfile {
    pub name: String,
    pub kind: Option<WeaponKind>,
    pub per_model: f64,
    pub profile: AttackProfile,
}

/// Expected-damage summary attached to a unit before it is shown or sent to the LLM.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DerivedStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_model_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_model_health: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_total_health: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_model_expected_melee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_expected_melee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_model_expected_ranged: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_expected_ranged: Option<f64>,
    /// (save, unit melee damage) for 2+..6+, with rend and crits applied.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unit_melee_vs_save: Vec<(i32, f64)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unit_ranged_vs_save: Vec<(i32, f64)>,
    /// Names of the weapon profiles that fed the numbers above.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub weapons_counted: Vec<String>,
    pub notes: Vec<&'static str>,
}

pub fn estimate_model_count(unit: &Value) -> Option<u32> {
    let from_models = unit
        .get("models")
        .and_then(Value::as_array)
        .and_then(|models| models.first())
        .and_then(|first| first.get("max"))
        .and_then(parse_numeric);
    let from_profile = || {
        unit.get("battleProfile")
            .and_then(|bp| bp.get("unit_size"))
            .and_then(parse_numeric)
    };
    from_models
        .or_else(from_profile)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
}

/// Attack counts may be dice ("2D6"), so try the dice average before a plain number.
fn average_stat(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => average_dice(s).or_else(|| parse_numeric(&Value::String(s.clone()))),
        other => parse_numeric(other),
    }
}

fn damage_stat(value: Option<&Value>) -> Option<Damage> {
    match value? {
        Value::Number(n) => n.as_f64().map(Damage::Fixed),
        Value::String(s) => Damage::from_weapon_stat(s)
            .or_else(|| parse_numeric(&Value::String(s.clone())).map(Damage::Fixed)),
        _ => None,
    }
}

fn critical_effect(weapon: &Value) -> CriticalEffect {
    let abilities = match weapon.get("abilities") {
        Some(Value::String(s)) => s.to_lowercase(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.to_lowercase()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_lowercase),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => return CriticalEffect::None,
    };
    if abilities.contains("crit (mortal)") {
        CriticalEffect::Mortal
    } else if abilities.contains("crit (auto-wound)") || abilities.contains("crit (auto wound)") {
        CriticalEffect::AutoWound
    } else if abilities.contains("crit (2 hits)") {
        CriticalEffect::ExtraHit
    } else {
        CriticalEffect::None
    }
}

fn is_per_model(group: &Value) -> bool {
    group
        .get("per")
        .and_then(Value::as_str)
        .is_some_and(|per| per.eq_ignore_ascii_case("model"))
}

fn group_count_per_model(group: &Value) -> f64 {
    if !is_per_model(group) {
        return 1.0;
    }
    group
        .get("min")
        .and_then(parse_numeric)
        .or_else(|| group.get("max").and_then(parse_numeric))
        .unwrap_or(1.0)
}

/// Every weapon profile carried by the unit's models. Profiles missing any
/// of attacks, hit, wound or damage are skipped.
pub fn weapon_profiles(unit: &Value) -> Vec<WeaponProfile> {
    let model_count = estimate_model_count(unit).filter(|n| *n > 0).unwrap_or(1) as f64;
    let mut out = Vec::new();

    let Some(models) = unit.get("models").and_then(Value::as_array) else {
        return out;
    };
    for model in models {
        let Some(weapons) = model.get("weapons") else {
            continue;
        };
        for bucket in WEAPON_BUCKETS {
            let Some(groups) = weapons.get(bucket).and_then(Value::as_object) else {
                continue;
            };
            for group in groups.values() {
                let Some(profiles) = group.get("weapons").and_then(Value::as_array) else {
                    continue;
                };
                let count = group_count_per_model(group);
                let per_model = if is_per_model(group) {
                    count
                } else {
                    count / model_count
                };

                for weapon in profiles {
                    let attacks = average_stat(weapon.get("attack"));
                    let to_hit = weapon.get("hit").and_then(x_plus_threshold);
                    let to_wound = weapon.get("wound").and_then(x_plus_threshold);
                    let damage = damage_stat(weapon.get("damage"));
                    let (Some(attacks), Some(to_hit), Some(to_wound), Some(damage)) =
                        (attacks, to_hit, to_wound, damage)
                    else {
                        continue;
                    };
                    let rend = weapon
                        .get("rend")
                        .and_then(parse_numeric)
                        .map(|r| r.abs() as i32)
                        .unwrap_or(0);

                    out.push(WeaponProfile {
                        name: weapon
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("weapon")
                            .to_string(),
                        kind: weapon.get("type").and_then(WeaponKind::from_value),
                        per_model,
                        profile: AttackProfile::new(attacks, to_hit, to_wound, rend, damage)
                            .with_critical(DEFAULT_CRITICAL_THRESHOLD, critical_effect(weapon)),
                    });
                }
            }
        }
    }
    out
}

/// Summed per-model expected damage of one weapon kind against `save`, or
/// `None` when the unit has no such weapons.
fn per_model_damage(weapons: &[WeaponProfile], kind: WeaponKind, save: i32) -> Option<f64> {
    let matching: Vec<&WeaponProfile> = weapons.iter().filter(|w| w.kind == Some(kind)).collect();
    if matching.is_empty() {
        return None;
    }
    Some(
        matching
            .iter()
            .map(|w| w.per_model * expected_damage(&w.profile, save))
            .sum(),
    )
}

pub fn derive_stats(unit: &Value) -> DerivedStats {
    let count = estimate_model_count(unit);
    let per_model_health = unit
        .get("health")
        .or_else(|| unit.get("wounds"))
        .and_then(parse_numeric);
    let weapons = weapon_profiles(unit);

    let per_model_melee = per_model_damage(&weapons, WeaponKind::Melee, NO_SAVE);
    let per_model_ranged = per_model_damage(&weapons, WeaponKind::Ranged, NO_SAVE);
    let times_count = |value: Option<f64>| Some(value? * count? as f64);
    let vs_saves = |kind: WeaponKind| -> Vec<(i32, f64)> {
        let Some(count) = count else {
            return Vec::new();
        };
        SAVE_RANGE
            .iter()
            .filter_map(|&save| {
                per_model_damage(&weapons, kind, save).map(|d| (save, d * count as f64))
            })
            .collect()
    };

    DerivedStats {
        unit_model_count: count,
        per_model_health,
        unit_total_health: times_count(per_model_health),
        per_model_expected_melee: per_model_melee,
        unit_expected_melee: times_count(per_model_melee),
        per_model_expected_ranged: per_model_ranged,
        unit_expected_ranged: times_count(per_model_ranged),
        unit_melee_vs_save: vs_saves(WeaponKind::Melee),
        unit_ranged_vs_save: vs_saves(WeaponKind::Ranged),
        weapons_counted: weapons.iter().fold(Vec::new(), |mut names, w| {
            if w.kind.is_some() && !names.contains(&w.name) {
                names.push(w.name.clone());
            }
            names
        }),
        notes: vec![
            "Expected damage = attacks * P(hit) * P(wound) * avg(damage), summed across profiles, \
             with crit effects on 6s to hit: Mortal skips the wound roll and the save, \
             Auto-wound skips the wound roll, 2 Hits adds a hit.",
            "Per-model values ignore enemy saves; the vs-save tables apply rend and crit effects.",
            "P(X+) = (7-X)/6. Dice averages: D3 = 2, D6 = 3.5. No rerolls or modifiers.",
        ],
    }
}

/// The unit JSON with its faction and derived stats attached, as sent to the LLM.
pub fn with_derived(record: &UnitRecord) -> Value {
    let mut value = record.data.clone();
    if let Value::Object(obj) = &mut value {
        obj.insert("_faction".to_string(), Value::String(record.faction.clone()));
        obj.insert(
            "_derived".to_string(),
            serde_json::to_value(derive_stats(&record.data)).unwrap_or(Value::Null),
        );
    }
    value
}
