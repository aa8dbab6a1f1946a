use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d*)D(\d+)([+\-]\d+)?$").expect("dice pattern is valid")
});
static PLAIN_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("number pattern is valid"));
static EMBEDDED_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(\.\d+)?)").expect("number pattern is valid"));
static X_PLUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\+?$").expect("threshold pattern is valid"));

/// A parsed `NdM+K` expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceExpr {
    pub fn mean(&self) -> f64 {
        self.count as f64 * (self.sides as f64 + 1.0) / 2.0 + self.modifier as f64
    }
}

/// Parse a dice expression like "D3", "2D6" or "d6+1". Spaces and case are ignored.
pub fn parse_dice_expr(expr: &str) -> Option<DiceExpr> {
    let compact: String = expr
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    let captures = DICE_RE.captures(&compact)?;
    let count = match captures.get(1).map(|m| m.as_str()) {
        Some("") | None => 1,
        Some(count) => count.parse::<u32>().ok()?,
    };
    let sides = captures.get(2)?.as_str().parse::<u32>().ok()?;
    let modifier = match captures.get(3) {
        Some(m) => m.as_str().parse::<i32>().ok()?,
        None => 0,
    };

    Some(DiceExpr {
        count,
        sides,
        modifier,
    })
}

/// Average value of a stat that is either a plain number or a dice expression.
pub fn average_dice(expr: &str) -> Option<f64> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if PLAIN_NUMBER_RE.is_match(&compact) {
        return compact.parse::<f64>().ok();
    }
    parse_dice_expr(&compact).map(|dice| dice.mean())
}

/// Probability that a single D6 meets `threshold`.
///
/// A natural 1 always fails, so anything below 2 is capped at 5/6; anything
/// above 6 can never succeed.
pub fn roll_probability(threshold: i32) -> f64 {
    if threshold < 2 {
        5.0 / 6.0
    } else if threshold > 6 {
        0.0
    } else {
        (7 - threshold) as f64 / 6.0
    }
}

/// Threshold of an "X+" token from reference data ("3+", "4", 3).
pub fn x_plus_threshold(token: &Value) -> Option<i32> {
    let text = match token {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    X_PLUS_RE.captures(&text)?.get(1)?.as_str().parse().ok()
}

/// Lenient numeric read of a stat value: numbers pass through, strings like
/// `4+`, `3"` or `"10"` yield their first number.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s
                .trim()
                .replace(['"', '\u{201c}', '\u{201d}'], "")
                .trim_end_matches('+')
                .to_string();
            if PLAIN_NUMBER_RE.is_match(&cleaned) {
                return cleaned.parse::<f64>().ok();
            }
            EMBEDDED_NUMBER_RE
                .captures(&cleaned)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dice_expr() {
        let dice = parse_dice_expr("2d6+1").unwrap();
        assert_eq!(dice.count, 2);
        assert_eq!(dice.sides, 6);
        assert_eq!(dice.modifier, 1);
    }

    #[test]
    fn test_parse_dice_expr_without_count() {
        let dice = parse_dice_expr("D3").unwrap();
        assert_eq!(dice.count, 1);
        assert_eq!(dice.sides, 3);
        assert_eq!(dice.modifier, 0);
        assert!(parse_dice_expr("3x").is_none());
    }

    #[test]
    fn test_average_dice() {
        assert_eq!(average_dice("D3"), Some(2.0));
        assert_eq!(average_dice("d6"), Some(3.5));
        assert_eq!(average_dice("2D6"), Some(7.0));
        assert_eq!(average_dice("D6 + 1"), Some(4.5));
        assert_eq!(average_dice("2d3-1"), Some(3.0));
        assert_eq!(average_dice("4"), Some(4.0));
        assert_eq!(average_dice("lots"), None);
    }

    #[test]
    fn test_roll_probability_bounds() {
        assert_eq!(roll_probability(1), 5.0 / 6.0);
        assert_eq!(roll_probability(-3), 5.0 / 6.0);
        assert_eq!(roll_probability(2), 5.0 / 6.0);
        assert_eq!(roll_probability(4), 0.5);
        assert_eq!(roll_probability(6), 1.0 / 6.0);
        assert_eq!(roll_probability(7), 0.0);
    }

    #[test]
    fn test_x_plus_threshold() {
        assert_eq!(x_plus_threshold(&json!("3+")), Some(3));
        assert_eq!(x_plus_threshold(&json!(" 4 ")), Some(4));
        assert_eq!(x_plus_threshold(&json!(2)), Some(2));
        assert_eq!(x_plus_threshold(&json!("-")), None);
        assert_eq!(x_plus_threshold(&Value::Null), None);
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(&json!(5)), Some(5.0));
        assert_eq!(parse_numeric(&json!("4+")), Some(4.0));
        assert_eq!(parse_numeric(&json!("12\"")), Some(12.0));
        assert_eq!(parse_numeric(&json!("1.5")), Some(1.5));
        assert_eq!(parse_numeric(&json!("up to 10 models")), Some(10.0));
        assert_eq!(parse_numeric(&json!("-")), None);
        assert_eq!(parse_numeric(&json!(null)), None);
    }
}
