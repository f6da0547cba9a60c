//! View cursor over the history

use crate::epoch::ProvenanceData;
use serde::{Deserialize, Serialize};

/// Selected prefix of history: an epoch and a position within it
///
/// Always normalized through [`Cursor::clamp`] before use so that it points at
/// an existing (epoch, execution) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub epoch: usize,
    pub cell: usize,
}

impl Cursor {
    #[inline]
    #[must_use]
    pub const fn new(epoch: usize, cell: usize) -> Self {
        Self { epoch, cell }
    }

    /// Last execution of the last epoch
    #[must_use]
    pub fn latest(data: &ProvenanceData) -> Option<Self> {
        let epoch = data.epochs.len().checked_sub(1)?;
        Self::end_of_epoch(data, epoch)
    }

    /// Last execution of `epoch` (clamped)
    #[must_use]
    pub fn end_of_epoch(data: &ProvenanceData, epoch: usize) -> Option<Self> {
        Self::new(epoch, usize::MAX).clamp(data)
    }

    /// Clamp both coordinates into range
    ///
    /// Returns `None` when there is nothing to point at: no epochs, or the
    /// selected epoch holds no executions.
    #[must_use]
    pub fn clamp(self, data: &ProvenanceData) -> Option<Self> {
        let epoch = self.epoch.min(data.epochs.len().checked_sub(1)?);
        let cell = self.cell.min(data.epochs[epoch].data.len().checked_sub(1)?);
        Some(Self { epoch, cell })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CellData, CellId, Environment, Epoch, Modules};
    use proptest::prelude::*;

    fn data_with(epoch_sizes: &[u32]) -> ProvenanceData {
        let mut data = ProvenanceData::new();
        for &size in epoch_sizes {
            let mut epoch = Epoch::open(CellData::new(CellId::new("a"), 1), Modules::new(), Environment::default());
            for count in 2..=size {
                epoch.push(CellData::new(CellId::new("a"), count), Modules::new());
            }
            data.epochs.push(epoch);
        }
        data
    }

    #[test]
    fn latest_points_at_last_execution() {
        let data = data_with(&[2, 4]);
        assert_eq!(Cursor::latest(&data), Some(Cursor::new(1, 3)));
    }

    #[test]
    fn clamp_bounds_both_axes() {
        let data = data_with(&[3, 1]);
        assert_eq!(Cursor::new(9, 9).clamp(&data), Some(Cursor::new(1, 0)));
        assert_eq!(Cursor::new(0, 9).clamp(&data), Some(Cursor::new(0, 2)));
    }

    #[test]
    fn empty_document_has_no_cursor() {
        assert_eq!(Cursor::latest(&ProvenanceData::new()), None);
        assert_eq!(Cursor::new(0, 0).clamp(&ProvenanceData::new()), None);
    }

    proptest! {
        #[test]
        fn prop_clamped_cursor_points_at_execution(
            sizes in prop::collection::vec(1u32..6, 1..4),
            epoch in 0usize..8,
            cell in 0usize..8,
        ) {
            let data = data_with(&sizes);
            let cursor = Cursor::new(epoch, cell).clamp(&data).unwrap();
            prop_assert!(cursor.epoch < data.epochs.len());
            prop_assert!(cursor.cell < data.epochs[cursor.epoch].data.len());
            prop_assert_eq!(cursor.clamp(&data), Some(cursor));
        }
    }
}
