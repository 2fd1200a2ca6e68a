//! Stage queues.

use std::collections::VecDeque;

use crate::core::unit::{Priority, WorkUnit};
use crate::policies::QueueDiscipline;

/// The inbound queue of one stage: a single FIFO band, or one band per
/// priority class drained highest class first. A unit lives in at most one
/// band of one queue at any time.
#[derive(Debug)]
pub(crate) struct StageQueue {
    bands: Vec<VecDeque<WorkUnit>>,
}

impl StageQueue {
    pub fn new(discipline: QueueDiscipline) -> Self {
        let band_count = match discipline {
            QueueDiscipline::Fifo => 1,
            QueueDiscipline::PriorityBands => Priority::CLASSES,
        };
        Self {
            bands: (0..band_count).map(|_| VecDeque::new()).collect(),
        }
    }

    fn band_for(&self, unit: &WorkUnit) -> usize {
        if self.bands.len() == 1 {
            0
        } else {
            unit.priority().band()
        }
    }

    /// Append a unit to the back of its band.
    pub fn push(&mut self, unit: WorkUnit) {
        let band = self.band_for(&unit);
        self.bands[band].push_back(unit);
    }

    /// Return a unit to the front of its band, preserving order after a
    /// failed dispatch attempt.
    pub fn push_front(&mut self, unit: WorkUnit) {
        let band = self.band_for(&unit);
        self.bands[band].push_front(unit);
    }

    /// Take the next unit: front of the highest non-empty band.
    pub fn pop(&mut self) -> Option<WorkUnit> {
        self.bands
            .iter_mut()
            .find(|band| !band.is_empty())?
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(VecDeque::is_empty)
    }
}
