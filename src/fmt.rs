/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    // -0.001 rounds to "0.00"; don't print it as a deduction
    if val < 0.0 && cents != "0.00" {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Format a rate as a percentage: 0.0775 -> "7.75%"
pub fn percent(rate: f64) -> String {
    let s = format!("{:.2}", rate * 100.0);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{s}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "$1,234.56");
        assert_eq!(money(-500.00), "-$500.00");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(1000000.99), "$1,000,000.99");
        assert_eq!(money(42.10), "$42.10");
    }

    #[test]
    fn test_money_negative_zero() {
        assert_eq!(money(-0.0), "$0.00");
        assert_eq!(money(-0.001), "$0.00");
        assert_eq!(money(-0.99), "-$0.99");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.0775), "7.75%");
        assert_eq!(percent(0.3), "30%");
        assert_eq!(percent(0.025), "2.5%");
    }
}
