//! Fleet-wide daily submission statistics.

use serde::{Deserialize, Serialize};

use crate::sources::{fields, field, Row};

/// Window used when the caller asks for zero or negative days.
pub const DEFAULT_STATS_DAYS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub day: String,
    pub total: u64,
    pub failed: u64,
    pub passed: u64,
}

pub fn effective_days(days: i64) -> i64 {
    if days <= 0 {
        DEFAULT_STATS_DAYS
    } else {
        days
    }
}

/// Rows without a day are skipped; unparsable counts read as zero.
pub fn parse_daily_stats(rows: &[Row]) -> Vec<DailyStat> {
    let count = |row: &Row, name: &str| field(row, name).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);

    let mut stats: Vec<DailyStat> = rows
        .iter()
        .filter_map(|row| {
            let day = field(row, fields::DAY)?;
            let total = count(row, fields::TOTAL);
            let failed = count(row, fields::FAILED);
            Some(DailyStat {
                day: day.to_string(),
                total,
                failed,
                passed: total.saturating_sub(failed),
            })
        })
        .collect();
    stats.sort_by(|a, b| a.day.cmp(&b.day));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_daily_stats() {
        let rows = vec![
            row(&[("day", "2025-06-18"), ("total", "100"), ("failed", "7")]),
            row(&[("day", "2025-06-17"), ("total", "5"), ("failed", "9")]),
            row(&[("total", "1")]),
            row(&[("day", "2025-06-19"), ("total", "oops")]),
        ];
        let stats = parse_daily_stats(&rows);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].day, "2025-06-17");
        assert_eq!(stats[0].passed, 0);
        assert_eq!(stats[1], DailyStat { day: "2025-06-18".to_string(), total: 100, failed: 7, passed: 93 });
        assert_eq!(stats[2].total, 0);
    }

    #[test]
    fn test_effective_days() {
        assert_eq!(effective_days(0), 60);
        assert_eq!(effective_days(-3), 60);
        assert_eq!(effective_days(7), 7);
    }
}
