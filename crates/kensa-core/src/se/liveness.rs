//! Live tracked symbols per block and per element
//!
//! A symbol is live at a point if some element reachable from it mentions
//! the symbol. Mentions are found through the resolved references of each
//! tracked symbol, mapped to the element whose span contains them.
//! Exception edges count as successors.

use std::collections::BTreeSet;

use swc_common::Span;

use crate::semantic::{BasicBlockId, ControlFlowGraph, SemanticModel, SymbolId};

use super::tracking::TrackedSymbols;

#[derive(Debug, Clone)]
pub struct Liveness {
    live_in: Vec<BTreeSet<SymbolId>>,
    /// `live_after[block][i]`: live once element `i` of `block` has run.
    live_after: Vec<Vec<BTreeSet<SymbolId>>>,
}

impl Liveness {
    pub fn compute(
        cfg: &ControlFlowGraph<'_>,
        model: &SemanticModel,
        tracked: &TrackedSymbols,
    ) -> Self {
        let block_count = cfg.block_count();
        let uses = element_uses(cfg, model, tracked);
        let ids: Vec<BasicBlockId> = cfg.blocks().map(|b| b.id).collect();

        let mut live_in: Vec<BTreeSet<SymbolId>> = vec![BTreeSet::new(); block_count];
        let mut changed = true;
        while changed {
            changed = false;
            for &id in ids.iter().rev() {
                let mut live = live_out(cfg, &live_in, id);
                for used in &uses[id.index()] {
                    live.extend(used.iter().copied());
                }
                if live != live_in[id.index()] {
                    live_in[id.index()] = live;
                    changed = true;
                }
            }
        }

        let live_after = ids
            .iter()
            .map(|&id| {
                let block_uses = &uses[id.index()];
                let mut after = vec![BTreeSet::new(); block_uses.len()];
                let mut live = live_out(cfg, &live_in, id);
                for index in (0..block_uses.len()).rev() {
                    after[index] = live.clone();
                    live.extend(block_uses[index].iter().copied());
                }
                after
            })
            .collect();

        Self {
            live_in,
            live_after,
        }
    }

    pub fn live_in(&self, block: BasicBlockId) -> &BTreeSet<SymbolId> {
        &self.live_in[block.index()]
    }

    pub fn live_after(&self, block: BasicBlockId, element: usize) -> Option<&BTreeSet<SymbolId>> {
        self.live_after.get(block.index())?.get(element)
    }
}

fn live_out(
    cfg: &ControlFlowGraph<'_>,
    live_in: &[BTreeSet<SymbolId>],
    block: BasicBlockId,
) -> BTreeSet<SymbolId> {
    let block = cfg.get(block);
    block
        .successors
        .iter()
        .chain(block.exception_target.iter())
        .flat_map(|succ| live_in[succ.index()].iter().copied())
        .collect()
}

/// Tracked symbols mentioned by each element, indexed by block then element.
fn element_uses(
    cfg: &ControlFlowGraph<'_>,
    model: &SemanticModel,
    tracked: &TrackedSymbols,
) -> Vec<Vec<BTreeSet<SymbolId>>> {
    let mut uses: Vec<Vec<BTreeSet<SymbolId>>> = vec![Vec::new(); cfg.block_count()];
    let mut spans: Vec<(Span, usize, usize)> = Vec::new();
    for block in cfg.blocks() {
        let elements = cfg.elements(block.id);
        uses[block.id.index()] = vec![BTreeSet::new(); elements.len()];
        for (index, element) in elements.iter().enumerate() {
            spans.push((element.span(), block.id.index(), index));
        }
    }
    spans.sort_by_key(|(span, _, _)| span.lo);

    for &symbol in tracked.symbols() {
        for reference in &model.symbol_table.get(symbol).references {
            let position = spans.partition_point(|(span, _, _)| span.lo <= reference.span.lo);
            let Some(&(span, block, index)) = position.checked_sub(1).and_then(|p| spans.get(p))
            else {
                continue;
            };
            if reference.span.hi <= span.hi {
                uses[block][index].insert(symbol);
            }
        }
    }

    uses
}
