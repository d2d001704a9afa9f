//! Control-flow tracking for reaching definitions.
//!
//! The evaluator builds a basic-block graph as it walks control structures;
//! each definition site (assignment, parameter, variable declaration) gets a
//! small-integer definition id. Blocks carry gen/kill bit sets; in/out sets
//! are propagated by fixed-point iteration over predecessor edges. A block
//! marked terminal (after an unconditional return/throw) contributes no
//! reaching definitions and its non-declaration statements are skipped by
//! the evaluator, though declarations inside it still get slot/type setup.

use crate::bitset::BitSet;
use crate::slot::SlotId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const ENTRY: BlockId = BlockId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Block {
    gen_bits: BitSet,
    kill: BitSet,
    in_set: BitSet,
    out_set: BitSet,
    preds: SmallVec<[BlockId; 2]>,
    terminal: bool,
}

/// Per-function flow graph, built incrementally during the walk
#[derive(Debug)]
pub struct FlowGraph {
    blocks: Vec<Block>,
    current: BlockId,
    defs_per_slot: FxHashMap<SlotId, SmallVec<[DefId; 4]>>,
    def_count: u32,
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGraph {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            current: BlockId::ENTRY,
            defs_per_slot: FxHashMap::default(),
            def_count: 0,
        }
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    pub fn def_count(&self) -> u32 {
        self.def_count
    }

    /// Allocate a fresh definition id for a slot
    pub fn new_def(&mut self, slot: SlotId) -> DefId {
        let def = DefId(self.def_count);
        self.def_count += 1;
        self.defs_per_slot.entry(slot).or_default().push(def);
        def
    }

    /// Record that `def` (re)defines `slot` in the current block: the new
    /// definition is generated, every other definition of the slot killed
    pub fn record_def(&mut self, slot: SlotId, def: DefId) {
        let others: SmallVec<[DefId; 4]> = self
            .defs_per_slot
            .get(&slot)
            .map(|defs| defs.iter().copied().filter(|&d| d != def).collect())
            .unwrap_or_default();
        let block = &mut self.blocks[self.current.index()];
        block.gen_bits.set(def.0 as usize);
        block.kill.clear(def.0 as usize);
        for other in others {
            block.kill.set(other.0 as usize);
            block.gen_bits.clear(other.0 as usize);
        }
    }

    /// All definition ids ever assigned to a slot
    pub fn defs_of(&self, slot: SlotId) -> &[DefId] {
        self.defs_per_slot
            .get(&slot)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Start a new block with the given predecessors and make it current.
    /// Terminal predecessors contribute nothing and are dropped; a block
    /// left with no live predecessor is provably unreachable and starts
    /// terminal itself.
    pub fn start_block(&mut self, preds: &[BlockId]) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let mut block = Block::default();
        for &p in preds {
            if !self.blocks[p.index()].terminal {
                block.preds.push(p);
                let pred_out = self.forward_out(p);
                block.in_set.union_with(&pred_out);
            }
        }
        block.terminal = block.preds.is_empty();
        self.blocks.push(block);
        self.current = id;
        id
    }

    /// What flows out of a block given what has been seen so far, for the
    /// single forward pass the evaluator performs while walking
    fn forward_out(&self, id: BlockId) -> BitSet {
        let block = &self.blocks[id.index()];
        let mut out = block.in_set.clone();
        out.difference_with(&block.kill);
        out.union_with(&block.gen_bits);
        out
    }

    /// Definitions reaching the current point of the walk
    pub fn reaching_now(&self) -> BitSet {
        self.forward_out(self.current)
    }

    /// Mark the current block terminal: control provably cannot leave it
    pub fn mark_terminal(&mut self) {
        self.blocks[self.current.index()].terminal = true;
    }

    pub fn is_terminal(&self, id: BlockId) -> bool {
        self.blocks[id.index()].terminal
    }

    pub fn current_is_terminal(&self) -> bool {
        self.is_terminal(self.current)
    }

    /// Add an edge discovered late (e.g. a loop back-edge)
    pub fn add_pred(&mut self, block: BlockId, pred: BlockId) {
        if !self.blocks[pred.index()].terminal {
            let b = &mut self.blocks[block.index()];
            if !b.preds.contains(&pred) {
                b.preds.push(pred);
            }
        }
    }

    /// Solve reaching definitions to a fixed point over all recorded edges
    pub fn solve(&mut self) {
        let n = self.blocks.len();
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                let preds: SmallVec<[BlockId; 2]> = self.blocks[i].preds.clone();
                let mut in_set = BitSet::new();
                for p in preds {
                    in_set.union_with(&self.blocks[p.index()].out_set);
                }
                // seed with what the forward pass already knew
                in_set.union_with(&self.blocks[i].in_set);
                let block = &mut self.blocks[i];
                block.in_set = in_set;
                let mut out = block.in_set.clone();
                out.difference_with(&block.kill);
                out.union_with(&block.gen_bits);
                if block.terminal {
                    // terminal blocks contribute no reaching definitions
                    out.clear_all();
                }
                if out != block.out_set {
                    block.out_set = out;
                    changed = true;
                }
            }
        }
    }

    /// Reaching set at block entry, valid after `solve`
    pub fn reaching_in(&self, id: BlockId) -> &BitSet {
        &self.blocks[id.index()].in_set
    }
}
