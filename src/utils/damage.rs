use crate::utils::dice::{DiceExpr, parse_dice_expr, roll_probability};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Save values covered by the batch table, best to worst.
pub const SAVE_RANGE: [i32; 5] = [2, 3, 4, 5, 6];

/// A save threshold no roll can meet; use it to ignore saves entirely.
pub const NO_SAVE: i32 = 7;

pub const DEFAULT_CRITICAL_THRESHOLD: i32 = 6;

#[derive(Debug, Error, PartialEq)]
pub enum DamageError {
    #[error("invalid damage expression `{0}` (use a number, D3 or D6)")]
    InvalidDamageExpression(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Damage {
    Fixed(f64),
    D3,
    D6,
    Dice { count: u32, sides: u32, modifier: i32 },
}

impl Damage {
    /// Strict parser for user input: a number, `D3` or `D6`.
    pub fn parse(token: &str) -> Result<Self, DamageError> {
        let trimmed = token.trim();
        if trimmed.eq_ignore_ascii_case("d3") {
            return Ok(Damage::D3);
        }
        if trimmed.eq_ignore_ascii_case("d6") {
            return Ok(Damage::D6);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(Damage::Fixed(value)),
            _ => Err(DamageError::InvalidDamageExpression(token.to_string())),
        }
    }

    /// Lenient constructor for weapon tables, which also carry `2D6`, `D3+1` and friends.
    pub fn from_weapon_stat(stat: &str) -> Option<Self> {
        if let Ok(damage) = Damage::parse(stat) {
            return Some(damage);
        }
        let dice = parse_dice_expr(stat)?;
        Some(Damage::Dice {
            count: dice.count,
            sides: dice.sides,
            modifier: dice.modifier,
        })
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Damage::Fixed(value) => value,
            Damage::D3 => 2.0,
            Damage::D6 => 3.5,
            Damage::Dice {
                count,
                sides,
                modifier,
            } => DiceExpr {
                count,
                sides,
                modifier,
            }
            .mean(),
        }
    }
}

impl std::fmt::Display for Damage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Damage::Fixed(value) => write!(f, "{}", value),
            Damage::D3 => write!(f, "D3"),
            Damage::D6 => write!(f, "D6"),
            Damage::Dice {
                count,
                sides,
                modifier,
            } => {
                if *count != 1 {
                    write!(f, "{}", count)?;
                }
                write!(f, "D{}", sides)?;
                if *modifier != 0 {
                    write!(f, "{:+}", modifier)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CriticalEffect {
    #[default]
    None,
    /// Critical hits skip wound and save rolls.
    Mortal,
    /// Critical hits skip the wound roll only.
    AutoWound,
    /// Critical hits score one extra ordinary hit.
    ExtraHit,
}

impl CriticalEffect {
    pub fn label(&self) -> &'static str {
        match self {
            CriticalEffect::None => "none",
            CriticalEffect::Mortal => "mortal",
            CriticalEffect::AutoWound => "auto-wound",
            CriticalEffect::ExtraHit => "2 hits",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackProfile {
    pub attacks: f64,
    pub to_hit: i32,
    pub to_wound: i32,
    pub rend: i32,
    pub damage: Damage,
    pub critical_threshold: i32,
    pub critical_effect: CriticalEffect,
}

impl AttackProfile {
    pub fn new(attacks: f64, to_hit: i32, to_wound: i32, rend: i32, damage: Damage) -> Self {
        Self {
            attacks,
            to_hit,
            to_wound,
            rend,
            damage,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            critical_effect: CriticalEffect::None,
        }
    }

    pub fn with_critical(mut self, threshold: i32, effect: CriticalEffect) -> Self {
        self.critical_threshold = threshold;
        self.critical_effect = effect;
        self
    }
}

/// Expected unsaved damage of one profile against one save value.
///
/// Rolls are independent and unmodified apart from rend; the bonus hit of
/// `ExtraHit` is never itself a critical.
pub fn expected_damage(profile: &AttackProfile, defender_save: i32) -> f64 {
    let p_hit = roll_probability(profile.to_hit);
    let p_crit = roll_probability(profile.to_hit.max(profile.critical_threshold));
    let p_non_crit = (p_hit - p_crit).max(0.0);
    let p_wound = roll_probability(profile.to_wound);
    let p_unsaved = 1.0 - roll_probability(defender_save.saturating_add(profile.rend));
    let damage = profile.damage.mean();
    let attacks = profile.attacks.max(0.0);

    let gated_hit = p_wound * p_unsaved * damage;
    let non_critical = attacks * p_non_crit * gated_hit;
    let critical = match profile.critical_effect {
        CriticalEffect::None => attacks * p_crit * gated_hit,
        CriticalEffect::Mortal => attacks * p_crit * damage,
        CriticalEffect::AutoWound => attacks * p_crit * p_unsaved * damage,
        CriticalEffect::ExtraHit => 2.0 * attacks * p_crit * gated_hit,
    };

    (non_critical + critical).max(0.0)
}

/// Expected damage against every save from 2+ to 6+.
pub fn save_table(profile: &AttackProfile) -> [(i32, f64); 5] {
    SAVE_RANGE.map(|save| (save, expected_damage(profile, save)))
}

#[derive(Debug, Error, PartialEq)]
pub enum ProfileArgsError {
    #[error(transparent)]
    Damage(#[from] DamageError),
    #[error("cannot read a number from `{0}`")]
    InvalidNumber(String),
    #[error("missing {0} (e.g. `10a 3h 3w 1r 2d`)")]
    MissingField(&'static str),
    #[error("{0} was given more than once")]
    DuplicateField(&'static str),
}

static CRIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)?\+?c([mwh])$").expect("crit pattern is valid"));

fn parse_threshold(token: &str, body: &str) -> Result<i32, ProfileArgsError> {
    body.trim_end_matches('+')
        .parse::<i32>()
        .map_err(|_| ProfileArgsError::InvalidNumber(token.to_string()))
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    name: &'static str,
) -> Result<(), ProfileArgsError> {
    if slot.is_some() {
        return Err(ProfileArgsError::DuplicateField(name));
    }
    *slot = Some(value);
    Ok(())
}

/// Parse `!dmg` arguments such as `10a 3h 3w 1r d3 5cm` (any order, any case).
pub fn parse_profile_args(args: &str) -> Result<AttackProfile, ProfileArgsError> {
    let mut attacks = None;
    let mut to_hit = None;
    let mut to_wound = None;
    let mut rend = None;
    let mut damage = None;
    let mut critical = None;

    for raw in args.split_whitespace() {
        let token = raw.to_ascii_lowercase();

        if let Some(captures) = CRIT_RE.captures(&token) {
            let threshold = match captures.get(1) {
                Some(m) => parse_threshold(raw, m.as_str())?,
                None => DEFAULT_CRITICAL_THRESHOLD,
            };
            let effect = match captures.get(2).map(|m| m.as_str()) {
                Some("m") => CriticalEffect::Mortal,
                Some("w") => CriticalEffect::AutoWound,
                _ => CriticalEffect::ExtraHit,
            };
            set_once(&mut critical, (threshold, effect), "critical effect")?;
        } else if let Some(body) = token.strip_suffix('a') {
            let value = body
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| ProfileArgsError::InvalidNumber(raw.to_string()))?;
            set_once(&mut attacks, value, "attacks")?;
        } else if let Some(body) = token.strip_suffix('h') {
            set_once(&mut to_hit, parse_threshold(raw, body)?, "to-hit")?;
        } else if let Some(body) = token.strip_suffix('w') {
            set_once(&mut to_wound, parse_threshold(raw, body)?, "to-wound")?;
        } else if let Some(body) = token.strip_suffix('r') {
            let value = body
                .trim_start_matches('-')
                .parse::<i32>()
                .map_err(|_| ProfileArgsError::InvalidNumber(raw.to_string()))?;
            set_once(&mut rend, value, "rend")?;
        } else {
            let body = token
                .strip_suffix('d')
                .filter(|b| !b.is_empty())
                .unwrap_or(&token);
            set_once(&mut damage, Damage::parse(body)?, "damage")?;
        }
    }

    let profile = AttackProfile::new(
        attacks.ok_or(ProfileArgsError::MissingField("attacks"))?,
        to_hit.ok_or(ProfileArgsError::MissingField("to-hit"))?,
        to_wound.ok_or(ProfileArgsError::MissingField("to-wound"))?,
        rend.unwrap_or(0),
        damage.unwrap_or(Damage::Fixed(1.0)),
    );

    Ok(match critical {
        Some((threshold, effect)) => profile.with_critical(threshold, effect),
        None => profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    fn basic_profile() -> AttackProfile {
        AttackProfile::new(10.0, 3, 3, 0, Damage::Fixed(1.0))
    }

    #[test]
    fn test_plain_profile_against_four_plus() {
        let expected = 10.0 * (3.0 / 6.0 * 4.0 / 6.0 * 3.0 / 6.0)
            + 10.0 * (1.0 / 6.0 * 4.0 / 6.0 * 3.0 / 6.0);
        let result = expected_damage(&basic_profile(), 4);
        approx_eq(result, expected);
        assert!((result - 2.22).abs() < 0.01);
    }

    #[test]
    fn test_mortal_crits_raise_damage() {
        let plain = expected_damage(&basic_profile(), 4);
        let mortal = basic_profile().with_critical(6, CriticalEffect::Mortal);
        let result = expected_damage(&mortal, 4);
        approx_eq(result, 10.0 * (3.0 / 6.0 * 4.0 / 6.0 * 3.0 / 6.0) + 10.0 / 6.0);
        assert!(result > plain);
    }

    #[test]
    fn test_auto_wound_and_extra_hit() {
        let auto_wound = basic_profile().with_critical(6, CriticalEffect::AutoWound);
        approx_eq(
            expected_damage(&auto_wound, 4),
            10.0 * (3.0 / 6.0 * 4.0 / 6.0 * 3.0 / 6.0) + 10.0 * (1.0 / 6.0 * 3.0 / 6.0),
        );

        let extra_hit = basic_profile().with_critical(6, CriticalEffect::ExtraHit);
        let plain = expected_damage(&basic_profile(), 4);
        approx_eq(
            expected_damage(&extra_hit, 4),
            plain + 10.0 * (1.0 / 6.0 * 4.0 / 6.0 * 3.0 / 6.0),
        );
    }

    #[test]
    fn test_zero_attacks_is_zero() {
        let mut profile = basic_profile();
        profile.attacks = 0.0;
        assert_eq!(expected_damage(&profile, 4), 0.0);
    }

    #[test]
    fn test_save_extremes() {
        let profile = basic_profile();
        let unsaved = 4.0 / 6.0 * 4.0 / 6.0 * 10.0;
        // 5/6 save even when the modified save drops below 2.
        approx_eq(expected_damage(&profile, 1), unsaved / 6.0);
        approx_eq(expected_damage(&profile, -4), unsaved / 6.0);
        approx_eq(expected_damage(&profile, 7), unsaved);
        approx_eq(expected_damage(&profile, NO_SAVE), unsaved);

        let mut rended = profile.clone();
        rended.rend = 3;
        approx_eq(expected_damage(&rended, 4), unsaved);
    }

    #[test]
    fn test_out_of_range_thresholds_degrade() {
        let impossible = AttackProfile::new(10.0, 7, 3, 0, Damage::Fixed(1.0));
        assert_eq!(expected_damage(&impossible, 4), 0.0);

        let easy = AttackProfile::new(6.0, 1, 1, 0, Damage::Fixed(1.0));
        let two_plus = AttackProfile::new(6.0, 2, 2, 0, Damage::Fixed(1.0));
        approx_eq(expected_damage(&easy, 4), expected_damage(&two_plus, 4));
    }

    #[test]
    fn test_lower_save_takes_less_damage() {
        let table = save_table(&basic_profile());
        assert_eq!(table.map(|(save, _)| save), SAVE_RANGE);
        for pair in table.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_damage_parse() {
        assert_eq!(Damage::parse("d3"), Ok(Damage::D3));
        assert_eq!(Damage::parse("D6"), Ok(Damage::D6));
        assert_eq!(Damage::parse("2"), Ok(Damage::Fixed(2.0)));
        assert_eq!(
            Damage::parse("2d6"),
            Err(DamageError::InvalidDamageExpression("2d6".to_string()))
        );
        assert!(Damage::parse("d4").is_err());
        assert!(Damage::parse("-1").is_err());
    }

    #[test]
    fn test_damage_from_weapon_stat() {
        assert_eq!(Damage::from_weapon_stat("D3"), Some(Damage::D3));
        let dice = Damage::from_weapon_stat("2D6+1").unwrap();
        approx_eq(dice.mean(), 8.0);
        assert_eq!(dice.to_string(), "2D6+1");
        assert_eq!(Damage::from_weapon_stat("lots"), None);
    }

    #[test]
    fn test_parse_profile_args_full() {
        let profile = parse_profile_args("10A 3h 4+w -1r d3d 5cm").unwrap();
        assert_eq!(profile.attacks, 10.0);
        assert_eq!(profile.to_hit, 3);
        assert_eq!(profile.to_wound, 4);
        assert_eq!(profile.rend, 1);
        assert_eq!(profile.damage, Damage::D3);
        assert_eq!(profile.critical_threshold, 5);
        assert_eq!(profile.critical_effect, CriticalEffect::Mortal);
    }

    #[test]
    fn test_parse_profile_args_defaults() {
        let profile = parse_profile_args("7.5a 4h 4w").unwrap();
        assert_eq!(profile.attacks, 7.5);
        assert_eq!(profile.rend, 0);
        assert_eq!(profile.damage, Damage::Fixed(1.0));
        assert_eq!(profile.critical_threshold, DEFAULT_CRITICAL_THRESHOLD);
        assert_eq!(profile.critical_effect, CriticalEffect::None);

        let with_crit = parse_profile_args("2a 3h 3w 2d ch").unwrap();
        assert_eq!(with_crit.damage, Damage::Fixed(2.0));
        assert_eq!(with_crit.critical_threshold, 6);
        assert_eq!(with_crit.critical_effect, CriticalEffect::ExtraHit);
    }

    #[test]
    fn test_parse_profile_args_errors() {
        assert_eq!(
            parse_profile_args("10a 3h 3w 2d6"),
            Err(ProfileArgsError::Damage(DamageError::InvalidDamageExpression(
                "2d6".to_string()
            )))
        );
        assert_eq!(
            parse_profile_args("3h 3w"),
            Err(ProfileArgsError::MissingField("attacks"))
        );
        assert_eq!(
            parse_profile_args("xa 3h 3w"),
            Err(ProfileArgsError::InvalidNumber("xa".to_string()))
        );
        assert_eq!(
            parse_profile_args("1a 2a 3h 3w"),
            Err(ProfileArgsError::DuplicateField("attacks"))
        );
    }

    fn arb_effect() -> impl Strategy<Value = CriticalEffect> {
        prop_oneof![
            Just(CriticalEffect::None),
            Just(CriticalEffect::Mortal),
            Just(CriticalEffect::AutoWound),
            Just(CriticalEffect::ExtraHit),
        ]
    }

    prop_compose! {
        fn arb_profile()(
            attacks in 0.0f64..40.0,
            to_hit in 0i32..9,
            to_wound in 0i32..9,
            rend in 0i32..4,
            damage in 0.0f64..6.0,
            critical_threshold in 0i32..9,
            critical_effect in arb_effect(),
        ) -> AttackProfile {
            AttackProfile::new(attacks, to_hit, to_wound, rend, Damage::Fixed(damage))
                .with_critical(critical_threshold, critical_effect)
        }
    }

    proptest! {
        #[test]
        fn prop_never_negative(profile in arb_profile(), save in -2i32..10) {
            prop_assert!(expected_damage(&profile, save) >= 0.0);
        }

        #[test]
        fn prop_more_rend_never_less_damage(profile in arb_profile(), save in 2i32..7) {
            let mut harder = profile.clone();
            harder.rend += 1;
            prop_assert!(expected_damage(&harder, save) + 1e-12 >= expected_damage(&profile, save));
        }

        #[test]
        fn prop_linear_in_attacks(profile in arb_profile(), save in 2i32..7, k in 0.1f64..5.0) {
            let mut scaled = profile.clone();
            scaled.attacks *= k;
            let base = expected_damage(&profile, save);
            prop_assert!((expected_damage(&scaled, save) - k * base).abs() < 1e-9);
        }

        #[test]
        fn prop_dice_match_their_averages(profile in arb_profile(), save in 2i32..7) {
            let mut d6 = profile.clone();
            d6.damage = Damage::D6;
            let mut fixed = profile.clone();
            fixed.damage = Damage::Fixed(3.5);
            prop_assert!((expected_damage(&d6, save) - expected_damage(&fixed, save)).abs() < 1e-12);

            d6.damage = Damage::D3;
            fixed.damage = Damage::Fixed(2.0);
            prop_assert!((expected_damage(&d6, save) - expected_damage(&fixed, save)).abs() < 1e-12);
        }

        #[test]
        fn prop_crit_threshold_floors_at_to_hit(profile in arb_profile(), save in 2i32..7, below in 1i32..6) {
            let mut at_hit = profile.clone();
            at_hit.critical_threshold = profile.to_hit;
            let mut under = profile.clone();
            under.critical_threshold = profile.to_hit - below;
            prop_assert!((expected_damage(&at_hit, save) - expected_damage(&under, save)).abs() < 1e-12);
        }
    }
}
