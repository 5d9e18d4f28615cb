// =============================================================================
// Date Alignment — inner join of two price series
// =============================================================================
//
// Both inputs are strictly ascending by date (a `PriceSeries` invariant), so
// the join is a single merge pass. Dates present on only one side are dropped;
// nothing is forward-filled or interpolated.
// =============================================================================

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::PriceSeries;

/// One shared trading date with both closes present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignedRow {
    pub date: NaiveDate,
    pub close_a: f64,
    pub close_b: f64,
}

/// Inner join of `a` and `b` on date, ascending.
pub fn align(a: &PriceSeries, b: &PriceSeries) -> Vec<AlignedRow> {
    let (pa, pb) = (a.points(), b.points());
    let mut rows = Vec::with_capacity(pa.len().min(pb.len()));

    let (mut i, mut j) = (0, 0);
    while i < pa.len() && j < pb.len() {
        match pa[i].date.cmp(&pb[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                rows.push(AlignedRow {
                    date: pa[i].date,
                    close_a: pa[i].close,
                    close_b: pb[j].close,
                });
                i += 1;
                j += 1;
            }
        }
    }

    rows
}
