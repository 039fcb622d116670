//! Feature derivation: wide table -> training table.
//!
//! Each wide row becomes a `CalendarFeatures` record plus the road statuses.
//! Rows where any road is null are dropped, so every road trains on the same
//! set of timestamps.

use crate::calendar::{HolidayCalendar, calendar_features};
use crate::domain::{FeatureTable, WideTable};
use crate::error::AppError;

/// Derive calendar features and drop rows with nulls.
pub fn derive_features(wide: &WideTable, calendar: &mut HolidayCalendar) -> Result<FeatureTable, AppError> {
    let mut table = FeatureTable {
        road_ids: wide.road_ids.clone(),
        ..FeatureTable::default()
    };

    for row in &wide.rows {
        let Some(statuses) = row.statuses.iter().copied().collect::<Option<Vec<i64>>>() else {
            table.rows_dropped += 1;
            continue;
        };
        table.calendar.push(calendar_features(row.timestamp, calendar));
        table.statuses.push(statuses);
    }

    if table.rows_dropped > 0 {
        tracing::info!(
            dropped = table.rows_dropped,
            kept = table.n_rows(),
            "dropped wide rows with missing road statuses"
        );
    }

    if table.n_rows() == 0 {
        return Err(AppError::no_data(
            "No complete rows remain after dropping snapshots with missing road statuses.",
        ));
    }

    Ok(table)
}
