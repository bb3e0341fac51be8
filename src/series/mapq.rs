use super::{PlotDataset, PlotKind, PlotOutcome, Point, Series};
use crate::store::ExperimentRecord;

/// One point per MAPQ value listed for the experiment, zero counts
/// included, as a fraction of the experiment's total reads. A zero or
/// missing total leaves counts unnormalized.
pub fn mapq(records: &[&ExperimentRecord]) -> PlotOutcome {
    let mut ds = PlotDataset::new(PlotKind::Mapq);

    for record in records {
        let total = record.total_reads();
        let denom = if total > 0.0 { total } else { 1.0 };
        let points: Vec<Point> = record
            .mapq
            .listed()
            .map(|(q, count)| Point {
                x: q as f64,
                y: count / denom,
            })
            .collect();
        if let Some(last) = points.last() {
            ds.x_max = ds.x_max.max(last.x);
        }
        ds.push(Series::new(record, points));
    }

    PlotOutcome::Ready(ds)
}
