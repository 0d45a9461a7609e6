use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::execution::executor::Executor;
use crate::execution::plan::{OrderBy, OrderByType};
use crate::tuple::{Schema, Tuple, Value};

/// One heap entry: the evaluated sort keys plus the row they rank.
///
/// Ordered so the heap's maximum is the entry that sorts last; popping on
/// overflow keeps the N entries that sort first.
struct HeapEntry {
    keys: Vec<Value>,
    directions: Arc<Vec<OrderByType>>,
    tuple: Tuple,
    rid: RecordId,
}

impl HeapEntry {
    fn ranking(&self, other: &Self) -> Ordering {
        for ((a, b), direction) in self.keys.iter().zip(&other.keys).zip(self.directions.iter()) {
            // Incomparable keys (NULLs) rank as equal.
            let ordering = a.compare(b).unwrap_or(Ordering::Equal);
            let ordering = match direction {
                OrderByType::Asc => ordering,
                OrderByType::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ranking(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ranking(other)
    }
}

/// Keeps the first N child rows under the sort order.
///
/// `init` drains the child through a bounded max-heap of size N, then the
/// retained rows are emitted in ascending sort order.
pub struct TopNExecutor {
    n: usize,
    order_bys: Vec<OrderBy>,
    child: Box<Executor>,
    output_schema: Arc<Schema>,
    results: Vec<(Tuple, RecordId)>,
    cursor: usize,
}

impl TopNExecutor {
    pub fn new(
        n: usize,
        order_bys: Vec<OrderBy>,
        child: Box<Executor>,
        output_schema: Arc<Schema>,
    ) -> Self {
        Self {
            n,
            order_bys,
            child,
            output_schema,
            results: Vec::new(),
            cursor: 0,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.results.clear();
        self.cursor = 0;

        let directions = Arc::new(
            self.order_bys
                .iter()
                .map(|(direction, _)| *direction)
                .collect::<Vec<_>>(),
        );
        let child_schema = Arc::clone(self.child.output_schema());

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(self.n + 1);
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = self
                .order_bys
                .iter()
                .map(|(_, expr)| expr.evaluate(&tuple, &child_schema))
                .collect();
            heap.push(HeapEntry {
                keys,
                directions: Arc::clone(&directions),
                tuple,
                rid,
            });
            if heap.len() > self.n {
                // Drop the entry that sorts last.
                heap.pop();
            }
        }

        // Popping yields last-to-first; reverse into emit order.
        let mut drained = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            drained.push((entry.tuple, entry.rid));
        }
        drained.reverse();
        self.results = drained;

        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        let Some((tuple, rid)) = self.results.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some((tuple.clone(), *rid)))
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
