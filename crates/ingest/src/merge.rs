use std::collections::BTreeMap;

use usage_core::{DailyTotal, RequiredTotals, day_model_key};

/// Adds this run's aggregates onto the persisted `day::model` ledger.
///
/// Keys absent from `aggregates` are left as they were.
pub fn merge_daily_totals(
    mut existing: BTreeMap<String, RequiredTotals>,
    aggregates: &[DailyTotal],
) -> BTreeMap<String, RequiredTotals> {
    for entry in aggregates {
        let slot = existing
            .entry(day_model_key(&entry.day, &entry.model))
            .or_default();
        *slot = slot.saturating_add(entry.tokens);
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(day: &str, model: &str, input: u64, output: u64) -> DailyTotal {
        DailyTotal {
            day: day.to_string(),
            model: model.to_string(),
            tokens: RequiredTotals {
                input,
                output,
                total: input + output,
                ..Default::default()
            },
        }
    }

    #[test]
    fn adds_onto_existing_and_creates_new_keys() {
        let mut ledger = BTreeMap::new();
        ledger.insert(
            "2026-01-01::gpt-4".to_string(),
            RequiredTotals {
                input: 1,
                output: 1,
                total: 2,
                ..Default::default()
            },
        );
        ledger.insert("2025-12-31::gpt-4".to_string(), RequiredTotals::default());

        let merged = merge_daily_totals(
            ledger,
            &[total("2026-01-01", "gpt-4", 4, 2), total("2026-01-02", "o3", 7, 3)],
        );

        assert_eq!(merged.len(), 3);
        let updated = merged["2026-01-01::gpt-4"];
        assert_eq!((updated.input, updated.output, updated.total), (5, 3, 8));
        assert_eq!(merged["2026-01-02::o3"].total, 10);
        assert!(merged["2025-12-31::gpt-4"].is_zero());
    }

    #[test]
    fn empty_run_leaves_ledger_untouched() {
        let mut ledger = BTreeMap::new();
        ledger.insert("2026-01-01::gpt-4".to_string(), RequiredTotals::default());
        let merged = merge_daily_totals(ledger.clone(), &[]);
        assert_eq!(merged, ledger);
    }
}
