//! Verbose breakdown printing. Purely observational, it never affects the
//! returned valuation.

use crate::valuation::TokenValuation;

/// Symbol column width in the verbose breakdown.
const SYMBOL_WIDTH: usize = 25;

/// Per-token rows sorted descending by USD value.
pub fn sorted_rows(results: &[TokenValuation]) -> Vec<&TokenValuation> {
    let mut rows: Vec<&TokenValuation> = results.iter().collect();
    rows.sort_by(|a, b| b.usd.total_cmp(&a.usd));
    rows
}

/// Print the per-token USD breakdown, biggest first.
pub fn print_breakdown(results: &[TokenValuation]) {
    for row in sorted_rows(results) {
        println!("{:<SYMBOL_WIDTH$} {}", row.symbol, format_usd(row.usd));
    }
}

/// Unit-suffixed USD rendering (e.g. "$1.23M").
pub fn format_usd(n: f64) -> String {
    if n.abs() >= 1_000_000.0 {
        format!("${:.2}M", n / 1_000_000.0)
    } else if n.abs() >= 1_000.0 {
        format!("${:.2}K", n / 1_000.0)
    } else {
        format!("${n:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd_millions() {
        assert_eq!(format_usd(1_234_567.89), "$1.23M");
    }

    #[test]
    fn test_format_usd_thousands() {
        assert_eq!(format_usd(12_345.67), "$12.35K");
    }

    #[test]
    fn test_format_usd_normal() {
        assert_eq!(format_usd(123.456), "$123.46");
    }

    #[test]
    fn test_format_usd_zero() {
        assert_eq!(format_usd(0.0), "$0.00");
    }

    #[test]
    fn test_rows_sorted_descending_by_usd() {
        let results = vec![
            TokenValuation {
                symbol: "SMALL".into(),
                amount: 1.0,
                usd: 5.0,
            },
            TokenValuation {
                symbol: "BIG".into(),
                amount: 1.0,
                usd: 500.0,
            },
            TokenValuation {
                symbol: "MID".into(),
                amount: 1.0,
                usd: 50.0,
            },
        ];
        let rows = sorted_rows(&results);
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["BIG", "MID", "SMALL"]);
    }
}
