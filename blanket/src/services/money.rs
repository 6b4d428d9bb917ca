//! Danish money formatting: `1.234,50`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount with `.` thousands grouping, `,` as the decimal mark and
/// exactly two decimals. The fraction is truncated, never rounded.
pub fn format_money(value: Decimal) -> String {
    let truncated = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let negative = truncated.is_sign_negative() && !truncated.is_zero();
    let digits = truncated.abs().to_string();

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits.as_str(), ""),
    };

    let mut out = String::with_capacity(digits.len() + int_part.len() / 3 + 2);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    out.push(',');
    out.push_str(&format!("{:0<2}", frac_part));
    out
}

/// Like [`format_money`], with a missing amount rendered as the empty string.
pub fn format_optional_money(value: Option<Decimal>) -> String {
    value.map(format_money).unwrap_or_default()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn groups_thousands_and_pads_decimals() {
        assert_eq!(format_money(dec!(1234.5)), "1.234,50");
        assert_eq!(format_money(dec!(1234567.891)), "1.234.567,89");
        assert_eq!(format_money(dec!(100)), "100,00");
        assert_eq!(format_money(dec!(0)), "0,00");
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(format_money(dec!(0.999)), "0,99");
        assert_eq!(format_money(dec!(2.005)), "2,00");
        assert_eq!(format_money(dec!(999.999)), "999,99");
    }

    #[test]
    fn negative_amounts_keep_sign() {
        assert_eq!(format_money(dec!(-1234.5)), "-1.234,50");
        assert_eq!(format_money(dec!(-0.001)), "0,00");
    }

    #[test]
    fn missing_amount_is_blank() {
        assert_eq!(format_optional_money(None), "");
        assert_eq!(format_optional_money(Some(dec!(6))), "6,00");
    }
}
