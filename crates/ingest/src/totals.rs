use std::collections::BTreeMap;

use usage_core::{DailyTotal, RecordMode, RequiredTotals, UsageRecord};

/// Grand total for a folded group.
///
/// Cache counts as part of input unless it exceeds input, in which case the
/// input figure excluded it. Thinking counts as output. When every component
/// is zero the source's own `total` is kept.
pub fn compose_total(tokens: &RequiredTotals) -> u64 {
    let input_total = if tokens.cache > tokens.input {
        tokens.input.saturating_add(tokens.cache)
    } else {
        tokens.input
    };
    let output_total = tokens.output.saturating_add(tokens.thinking);
    let composed = input_total.saturating_add(output_total);
    if composed > 0 {
        return composed;
    }
    tokens.total
}

#[derive(Default)]
struct Group<'a> {
    day: &'a str,
    model: &'a str,
    summed: RequiredTotals,
    per_source_max: BTreeMap<&'a str, RequiredTotals>,
}

/// Folds records into per-(day, model) totals sorted by day, then model.
///
/// Delta records are summed. Cumulative records that were not reconciled are
/// never summed: each source contributes its per-axis maximum.
pub fn aggregate_usage(records: &[UsageRecord]) -> Vec<DailyTotal> {
    let mut groups: BTreeMap<(&str, &str), Group<'_>> = BTreeMap::new();
    for record in records {
        let group = groups
            .entry((record.day.as_str(), record.model.as_str()))
            .or_insert_with(|| Group {
                day: &record.day,
                model: &record.model,
                ..Group::default()
            });
        let tokens = record.tokens.normalize();
        match record.mode {
            RecordMode::Delta => group.summed = group.summed.saturating_add(tokens),
            RecordMode::Cumulative => {
                let slot = group
                    .per_source_max
                    .entry(record.source.as_str())
                    .or_default();
                *slot = slot.max(tokens);
            }
        }
    }

    groups
        .into_values()
        .map(|group| {
            let mut tokens = group
                .per_source_max
                .into_values()
                .fold(group.summed, RequiredTotals::saturating_add);
            tokens.total = compose_total(&tokens);
            DailyTotal {
                day: group.day.to_string(),
                model: group.model.to_string(),
                tokens,
            }
        })
        .collect()
}
