//! Dependency resolution
//!
//! Starting from seed executions, follow each remote symbol backward to the
//! execution that last bound (or imported) it, then repeat from there with the
//! scan ending just before that execution.
//!
//! A work item is `(position, end)`: the execution at `position` whose remote
//! symbols are looked up in `0..end`. Seeds scan from their own position
//! (`end = position + 1`); a resolved source at `p` is revisited as `(p, p)`.
//! Ends strictly decrease along every path, so the walk terminates.

use crate::error::ResolveError;
use indexmap::{IndexMap, IndexSet};
use prov_model::CellData;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag checked between work items
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a symbol reached its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Bound by an assignment or definition
    Data,
    /// Brought in by an import statement
    Import,
}

/// Symbols flowing from one execution to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEdge {
    /// Position of the consuming execution
    pub target: usize,
    /// Position of the execution that provided the symbols
    pub source: usize,
    /// Labels in first-seen order
    pub symbols: Vec<String>,
    pub kind: EdgeKind,
    /// Source is, or depends on, a data source
    pub data_source: bool,
}

/// Result of resolving one set of seeds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// Every execution position reached, ascending
    pub positions: Vec<usize>,
    /// Merged edges in discovery order
    pub edges: Vec<ResolvedEdge>,
    /// Positions that are data sources
    pub data_sources: BTreeSet<usize>,
}

impl Closure {
    #[inline]
    #[must_use]
    pub fn is_data_source(&self, position: usize) -> bool {
        self.data_sources.contains(&position)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.positions.binary_search(&position).is_ok()
    }
}

type Item = (usize, usize);

/// Find the execution in `0..end` providing `symbol`
///
/// At each position a binding wins over an import.
fn find_source(
    executions: &[CellData],
    symbol: &str,
    end: usize,
    include_imports: bool,
) -> Option<(usize, EdgeKind)> {
    (0..end).rev().find_map(|pos| {
        let record = &executions[pos];
        if record.defines(symbol) {
            Some((pos, EdgeKind::Data))
        } else if include_imports && record.imports_symbol(symbol) {
            Some((pos, EdgeKind::Import))
        } else {
            None
        }
    })
}

/// Resolve the dependency closure of `seeds` within one epoch
///
/// # Errors
/// - `ResolveError::PositionOutOfRange` for a seed outside `executions`
/// - `ResolveError::Cancelled` once `cancel` is set
pub fn resolve(
    executions: &[CellData],
    seeds: &[usize],
    include_imports: bool,
    cancel: &CancelFlag,
) -> Result<Closure, ResolveError> {
    if let Some(&position) = seeds.iter().find(|&&p| p >= executions.len()) {
        return Err(ResolveError::PositionOutOfRange {
            position,
            len: executions.len(),
        });
    }

    let mut frontier: VecDeque<Item> = seeds.iter().map(|&p| (p, p + 1)).collect();
    let mut visited: HashSet<Item> = HashSet::new();
    // Sources of each item, for the data-source pass
    let mut children: HashMap<Item, Vec<Item>> = HashMap::new();
    let mut merged: IndexMap<(usize, usize, EdgeKind), IndexSet<String>> = IndexMap::new();

    while let Some(item) = frontier.pop_front() {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if !visited.insert(item) {
            continue;
        }

        let (position, end) = item;
        let mut sources: IndexSet<usize> = IndexSet::new();
        for symbol in &executions[position].remote {
            let Some((source, kind)) = find_source(executions, symbol, end, include_imports) else {
                continue;
            };
            sources.insert(source);
            merged
                .entry((position, source, kind))
                .or_default()
                .insert(symbol.clone());
        }

        let next: Vec<Item> = sources.into_iter().map(|source| (source, source)).collect();
        frontier.extend(next.iter().copied());
        children.insert(item, next);
    }

    // Children always have a smaller end than their parent
    let mut order: Vec<Item> = visited.into_iter().collect();
    order.sort_unstable_by_key(|&(position, end)| (end, position));
    let mut item_source: HashMap<Item, bool> = HashMap::with_capacity(order.len());
    for item in &order {
        let own = executions[item.0].is_data_source();
        let inherited = children
            .get(item)
            .is_some_and(|kids| kids.iter().any(|kid| item_source.get(kid).copied().unwrap_or(false)));
        item_source.insert(*item, own || inherited);
    }

    let data_sources: BTreeSet<usize> = item_source
        .iter()
        .filter_map(|(&(position, _), &is_source)| is_source.then_some(position))
        .collect();
    let positions: Vec<usize> = order
        .iter()
        .map(|&(position, _)| position)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let edges = merged
        .into_iter()
        .map(|((target, source, kind), symbols)| ResolvedEdge {
            target,
            source,
            symbols: symbols.into_iter().collect(),
            kind,
            data_source: item_source.get(&(source, source)).copied().unwrap_or(false),
        })
        .collect();

    tracing::debug!(
        "Resolved {} seeds to {} executions",
        seeds.len(),
        positions.len()
    );
    Ok(Closure {
        positions,
        edges,
        data_sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prov_model::CellId;

    fn exec(cell: &str, count: u32, local: &[&str], remote: &[&str]) -> CellData {
        CellData::new(CellId::new(cell), count)
            .with_local(local.iter().copied())
            .with_remote(remote.iter().copied())
    }

    fn edge(target: usize, source: usize, symbols: &[&str]) -> (usize, usize, Vec<String>) {
        (target, source, symbols.iter().map(ToString::to_string).collect())
    }

    fn summary(closure: &Closure) -> Vec<(usize, usize, Vec<String>)> {
        closure
            .edges
            .iter()
            .map(|e| (e.target, e.source, e.symbols.clone()))
            .collect()
    }

    #[test]
    fn each_symbol_resolves_to_latest_binding() {
        let executions = vec![
            exec("a", 1, &["x"], &[]),
            exec("b", 2, &["y"], &[]),
            exec("c", 3, &["z"], &["x", "y"]),
        ];
        let closure = resolve(&executions, &[2], false, &CancelFlag::new()).unwrap();
        assert_eq!(summary(&closure), vec![edge(2, 0, &["x"]), edge(2, 1, &["y"])]);
        assert_eq!(closure.positions, vec![0, 1, 2]);
    }

    #[test]
    fn symbols_from_one_source_merge() {
        let executions = vec![exec("a", 1, &["x", "y"], &[]), exec("b", 2, &[], &["x", "y"])];
        let closure = resolve(&executions, &[1], false, &CancelFlag::new()).unwrap();
        assert_eq!(summary(&closure), vec![edge(1, 0, &["x", "y"])]);
    }

    #[test]
    fn unresolved_symbol_produces_nothing() {
        let executions = vec![exec("a", 1, &[], &["undefined_name"])];
        let closure = resolve(&executions, &[0], false, &CancelFlag::new()).unwrap();
        assert!(closure.edges.is_empty());
        assert_eq!(closure.positions, vec![0]);
    }

    #[test]
    fn rebinding_stops_the_scan() {
        let executions = vec![
            exec("a", 1, &["x"], &[]),
            exec("b", 2, &["x"], &[]),
            exec("c", 3, &[], &["x"]),
        ];
        let closure = resolve(&executions, &[2], false, &CancelFlag::new()).unwrap();
        assert_eq!(summary(&closure), vec![edge(2, 1, &["x"])]);
        assert!(!closure.contains(0));
    }

    #[test]
    fn seed_scan_includes_itself() {
        // x = x + 1 executed twice
        let executions = vec![exec("a", 1, &["x"], &[]), exec("a", 2, &["x"], &["x"])];
        let closure = resolve(&executions, &[1], false, &CancelFlag::new()).unwrap();
        assert_eq!(summary(&closure), vec![edge(1, 1, &["x"]), edge(1, 0, &["x"])]);
    }

    #[test]
    fn imports_only_when_enabled() {
        let mut importer = exec("a", 1, &[], &[]);
        importer.imports = vec!["pd".into()];
        let executions = vec![importer, exec("b", 2, &["df"], &["pd"])];

        let without = resolve(&executions, &[1], false, &CancelFlag::new()).unwrap();
        assert!(without.edges.is_empty());

        let with = resolve(&executions, &[1], true, &CancelFlag::new()).unwrap();
        assert_eq!(with.edges.len(), 1);
        assert_eq!(with.edges[0].kind, EdgeKind::Import);
    }

    #[test]
    fn data_source_propagates_through_chain() {
        let executions = vec![
            exec("a", 1, &["raw"], &[]).with_data_vars(["raw"]),
            exec("b", 2, &["clean"], &["raw"]),
            exec("c", 3, &["model"], &["clean"]),
            exec("d", 4, &["other"], &[]),
        ];
        let closure = resolve(&executions, &[2, 3], false, &CancelFlag::new()).unwrap();
        assert!(closure.is_data_source(0));
        assert!(closure.is_data_source(1));
        assert!(closure.is_data_source(2));
        assert!(!closure.is_data_source(3));
        assert!(closure.edges.iter().all(|e| e.data_source));
    }

    #[test]
    fn cancelled_walk_stops() {
        let executions = vec![exec("a", 1, &["x"], &[]), exec("b", 2, &[], &["x"])];
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert_eq!(resolve(&executions, &[1], false, &cancel), Err(ResolveError::Cancelled));
    }

    #[test]
    fn out_of_range_seed_is_rejected() {
        let executions = vec![exec("a", 1, &[], &[])];
        assert!(matches!(
            resolve(&executions, &[3], false, &CancelFlag::new()),
            Err(ResolveError::PositionOutOfRange { position: 3, len: 1 })
        ));
    }
}
