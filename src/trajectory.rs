use crate::filter::Eligible;
use crate::model::{BroadcastRecord, MovementSegment};
use std::collections::HashMap;

/// Time-ordered broadcasts of one vessel within one archive.
#[derive(Debug)]
pub struct Trajectory {
    pub mmsi: String,
    pub trace: Vec<BroadcastRecord>,
}

impl Trajectory {
    /// The n - 1 movement segments joining consecutive broadcasts.
    pub fn segments(&self) -> impl Iterator<Item = MovementSegment<'_>> {
        self.trace.windows(2).map(|w| MovementSegment {
            from: &w[0],
            to: &w[1],
        })
    }
}

/// Groups eligible records per vessel and orders each group by timestamp.
///
/// Records sharing a timestamp keep their archive order. Trajectories come
/// out in the order of `eligible.vessels`.
pub fn build(eligible: Eligible) -> Vec<Trajectory> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(eligible.vessels.len());
    for (i, mmsi) in eligible.vessels.iter().enumerate() {
        index.insert(mmsi.as_str(), i);
    }

    let mut traces: Vec<Vec<BroadcastRecord>> = vec![Vec::new(); eligible.vessels.len()];
    for record in eligible.records {
        if let Some(&i) = index.get(record.mmsi.as_str()) {
            traces[i].push(record);
        }
    }
    drop(index);

    eligible
        .vessels
        .into_iter()
        .zip(traces)
        .map(|(mmsi, mut trace)| {
            trace.sort_by_key(|r| r.timestamp);
            Trajectory { mmsi, trace }
        })
        .collect()
}
