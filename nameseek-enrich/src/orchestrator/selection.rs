//! Name selection
//!
//! Operates on distinct keys in first-appearance order, so a name that
//! occurs in several base rows is counted and classified once.

use crate::models::{NameRecord, SelectionMode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

/// Pick the records to process
///
/// - `Sequential`: the first `count` records
/// - `Random`: `count` records sampled uniformly without replacement,
///   returned in sampled order. Reproducible only when `seed` is given.
/// - `All`: every record, `count` ignored
pub fn select(
    records: Vec<NameRecord>,
    mode: SelectionMode,
    count: usize,
    seed: Option<u64>,
) -> Vec<NameRecord> {
    let available = records.len();

    let selected: Vec<NameRecord> = match mode {
        SelectionMode::All => records,
        SelectionMode::Sequential => records.into_iter().take(count).collect(),
        SelectionMode::Random => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => {
                    warn!("No seed given, random selection is not reproducible");
                    StdRng::from_entropy()
                }
            };
            let amount = count.min(available);
            let picked = rand::seq::index::sample(&mut rng, available, amount);

            let mut slots: Vec<Option<NameRecord>> = records.into_iter().map(Some).collect();
            picked
                .into_iter()
                .filter_map(|idx| slots[idx].take())
                .collect()
        }
    };

    if mode != SelectionMode::All && count > available {
        warn!(
            requested = count,
            available,
            "Requested more names than the dataset holds, selecting all"
        );
    }

    info!(
        mode = %mode,
        selected = selected.len(),
        available,
        seed = ?seed,
        "Names selected"
    );

    selected
}
