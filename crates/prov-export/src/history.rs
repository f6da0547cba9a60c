//! Source version history of a cell
//!
//! Collects the distinct source texts a cell ran with before a given
//! execution, oldest first, ending with that execution's own source.

use crate::diff::{line_diff, DiffLine};
use crate::error::ExportError;
use prov_model::{CellId, ModelError, ProvenanceData};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One distinct source text of a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVersion {
    pub epoch: usize,
    pub execution_count: u32,
    pub source: String,
}

/// Diff of an older version against the target version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub old: SourceVersion,
    pub current: SourceVersion,
    pub lines: Vec<DiffLine>,
}

/// Distinct earlier sources of `cell_id`, target last
///
/// Scans every epoch before `epoch` and the executions of `epoch` that precede
/// the target. A text is listed once, at its first occurrence; texts equal to
/// the target's source are not repeated.
///
/// # Errors
/// `ExportError::Model` when the epoch or execution does not exist
pub fn version_history(
    data: &ProvenanceData,
    cell_id: &CellId,
    epoch: usize,
    execution_count: u32,
) -> Result<Vec<SourceVersion>, ExportError> {
    let (target_position, target) = data
        .try_epoch(epoch)?
        .find_execution(execution_count)
        .ok_or(ModelError::ExecutionNotFound {
            epoch,
            execution_count,
        })?;

    let mut seen: HashSet<&str> = HashSet::from([target.cell_source.as_str()]);
    let mut versions = Vec::new();

    for (index, candidate_epoch) in data.epochs.iter().enumerate().take(epoch + 1) {
        let limit = if index == epoch {
            target_position
        } else {
            candidate_epoch.len()
        };
        for record in candidate_epoch.data.iter().take(limit) {
            if &record.cell_id == cell_id && seen.insert(record.cell_source.as_str()) {
                versions.push(SourceVersion {
                    epoch: index,
                    execution_count: record.execution_count,
                    source: record.cell_source.clone(),
                });
            }
        }
    }

    versions.push(SourceVersion {
        epoch,
        execution_count,
        source: target.cell_source.clone(),
    });

    tracing::debug!(
        "Found {} source versions for cell {} up to execution {} of epoch {}",
        versions.len(),
        cell_id,
        execution_count,
        epoch
    );
    Ok(versions)
}

/// Compare `history[index]` with the target (last) version
///
/// # Errors
/// `ExportError::VersionOutOfRange` for an index past the end
pub fn compare_versions(history: &[SourceVersion], index: usize) -> Result<VersionDiff, ExportError> {
    let out_of_range = || ExportError::VersionOutOfRange {
        index,
        len: history.len(),
    };
    let old = history.get(index).ok_or_else(out_of_range)?;
    let current = history.last().ok_or_else(out_of_range)?;

    Ok(VersionDiff {
        lines: line_diff(&current.source, &old.source),
        old: old.clone(),
        current: current.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffTag;
    use pretty_assertions::assert_eq;
    use prov_model::{CellData, Environment, Epoch, Modules};

    fn run(cell: &str, count: u32, source: &str) -> CellData {
        CellData::new(CellId::new(cell), count).with_source(source)
    }

    fn epoch(records: Vec<CellData>) -> Epoch {
        let mut records = records.into_iter();
        let environment = Environment::capture(Default::default(), Default::default(), "test");
        let mut epoch = Epoch::open(
            records.next().unwrap_or_else(|| run("x", 1, "")),
            Modules::new(),
            environment,
        );
        for record in records {
            epoch.push(record, Modules::new());
        }
        epoch
    }

    fn sources(history: &[SourceVersion]) -> Vec<&str> {
        history.iter().map(|version| version.source.as_str()).collect()
    }

    #[test]
    fn repeated_sources_are_listed_once() {
        let mut data = ProvenanceData::new();
        data.epochs.push(epoch(vec![run("c", 1, "a"), run("c", 2, "a"), run("c", 3, "b")]));

        let history = version_history(&data, &CellId::new("c"), 0, 3).unwrap();
        assert_eq!(sources(&history), vec!["a", "b"]);
        assert_eq!(history[0].execution_count, 1);
    }

    #[test]
    fn earlier_epochs_and_target_epoch_prefix_are_scanned() {
        let mut data = ProvenanceData::new();
        data.epochs.push(epoch(vec![run("c", 1, "v1"), run("d", 2, "other")]));
        data.epochs.push(epoch(vec![run("c", 1, "v2"), run("c", 2, "v3"), run("c", 3, "v4")]));

        let history = version_history(&data, &CellId::new("c"), 1, 2).unwrap();
        assert_eq!(sources(&history), vec!["v1", "v2", "v3"]);
        assert_eq!((history[0].epoch, history[1].epoch), (0, 1));
    }

    #[test]
    fn target_source_is_not_duplicated() {
        let mut data = ProvenanceData::new();
        data.epochs.push(epoch(vec![run("c", 1, "same"), run("c", 2, "new"), run("c", 3, "same")]));

        let history = version_history(&data, &CellId::new("c"), 0, 3).unwrap();
        assert_eq!(sources(&history), vec!["new", "same"]);
    }

    #[test]
    fn unknown_execution_is_not_found() {
        let mut data = ProvenanceData::new();
        data.epochs.push(epoch(vec![run("c", 1, "a")]));

        let err = version_history(&data, &CellId::new("c"), 0, 9).unwrap_err();
        assert!(err.is_not_found());
        assert!(version_history(&data, &CellId::new("c"), 4, 1).unwrap_err().is_not_found());
    }

    #[test]
    fn compare_diffs_against_last_version() {
        let history = vec![
            SourceVersion {
                epoch: 0,
                execution_count: 1,
                source: "x = 1\n".into(),
            },
            SourceVersion {
                epoch: 0,
                execution_count: 2,
                source: "x = 2\n".into(),
            },
        ];
        let diff = compare_versions(&history, 0).unwrap();
        assert_eq!(diff.current.execution_count, 2);
        assert_eq!(
            diff.lines.iter().map(|line| line.tag).collect::<Vec<_>>(),
            vec![DiffTag::Removed, DiffTag::Added]
        );
        assert!(compare_versions(&history, 2).unwrap_err().is_not_found());
    }
}
