use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::{RecordId, Result};
use crate::execution::executor::{placeholder_rid, Executor};
use crate::execution::expression::Expression;
use crate::execution::plan::AggregationType;
use crate::tuple::{Schema, Tuple, Value};

/// The group-by key of one aggregation group.
///
/// Wraps the evaluated group-by values so they can key a hash map; floats
/// hash and group by their bit patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateKey(pub Vec<Value>);

impl Eq for AggregateKey {}

impl Hash for AggregateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Null => {}
                Value::Boolean(v) => v.hash(state),
                Value::TinyInt(v) => v.hash(state),
                Value::SmallInt(v) => v.hash(state),
                Value::Integer(v) => v.hash(state),
                Value::BigInt(v) => v.hash(state),
                Value::Float(v) => v.to_bits().hash(state),
                Value::Double(v) => v.to_bits().hash(state),
                Value::String(v) => v.hash(state),
                Value::Timestamp(v) => v.hash(state),
            }
        }
    }
}

/// In-memory hash table accumulating per-group aggregate state.
pub struct AggregationHashTable {
    agg_types: Vec<AggregationType>,
    groups: HashMap<AggregateKey, Vec<Value>>,
}

impl AggregationHashTable {
    pub fn new(agg_types: Vec<AggregationType>) -> Self {
        Self {
            agg_types,
            groups: HashMap::new(),
        }
    }

    /// The aggregate state of a group before it has seen any row:
    /// `COUNT(*)` starts at zero, everything else at NULL.
    pub fn initial_values(&self) -> Vec<Value> {
        self.agg_types
            .iter()
            .map(|agg_type| match agg_type {
                AggregationType::CountStar => Value::Integer(0),
                _ => Value::Null,
            })
            .collect()
    }

    /// Folds one input row into its group's state.
    pub fn insert_combine(&mut self, key: AggregateKey, input: Vec<Value>) {
        let initial = self.initial_values();
        let current = self.groups.entry(key).or_insert(initial);

        for (i, agg_type) in self.agg_types.iter().enumerate() {
            let new_value = &input[i];
            let old_value = &mut current[i];

            match agg_type {
                AggregationType::CountStar => {
                    *old_value = old_value
                        .add(&Value::Integer(1))
                        .unwrap_or(Value::Integer(1));
                }
                AggregationType::Count => {
                    if !new_value.is_null() {
                        let base = if old_value.is_null() {
                            Value::Integer(0)
                        } else {
                            old_value.clone()
                        };
                        *old_value = base.add(&Value::Integer(1)).unwrap_or(base);
                    }
                }
                AggregationType::Sum => {
                    if !new_value.is_null() {
                        *old_value = if old_value.is_null() {
                            new_value.clone()
                        } else {
                            old_value.add(new_value).unwrap_or_else(|| old_value.clone())
                        };
                    }
                }
                AggregationType::Min => {
                    if !new_value.is_null() {
                        let replace = old_value.is_null()
                            || new_value.compare(old_value) == Some(Ordering::Less);
                        if replace {
                            *old_value = new_value.clone();
                        }
                    }
                }
                AggregationType::Max => {
                    if !new_value.is_null() {
                        let replace = old_value.is_null()
                            || new_value.compare(old_value) == Some(Ordering::Greater);
                        if replace {
                            *old_value = new_value.clone();
                        }
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Takes every group out of the table.
    pub fn drain(&mut self) -> Vec<(AggregateKey, Vec<Value>)> {
        self.groups.drain().collect()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

/// Hash aggregation over the child stream.
///
/// `init` drains the child into the aggregation table; `next` walks the
/// groups, emitting group-by values followed by aggregate values. With no
/// group-by clause an empty input still yields one row of initial
/// aggregates, so `COUNT(*)` over an empty table returns 0.
pub struct AggregationExecutor {
    group_bys: Vec<Arc<Expression>>,
    aggregates: Vec<Arc<Expression>>,
    table: AggregationHashTable,
    child: Box<Executor>,
    output_schema: Arc<Schema>,
    results: Vec<(AggregateKey, Vec<Value>)>,
    cursor: usize,
    emitted_empty_result: bool,
}

impl AggregationExecutor {
    pub fn new(
        group_bys: Vec<Arc<Expression>>,
        aggregates: Vec<Arc<Expression>>,
        agg_types: Vec<AggregationType>,
        child: Box<Executor>,
        output_schema: Arc<Schema>,
    ) -> Self {
        Self {
            group_bys,
            aggregates,
            table: AggregationHashTable::new(agg_types),
            child,
            output_schema,
            results: Vec::new(),
            cursor: 0,
            emitted_empty_result: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.table.clear();
        self.cursor = 0;
        self.emitted_empty_result = false;

        let child_schema = Arc::clone(self.child.output_schema());
        while let Some((tuple, _)) = self.child.next()? {
            let key = AggregateKey(
                self.group_bys
                    .iter()
                    .map(|expr| expr.evaluate(&tuple, &child_schema))
                    .collect(),
            );
            let input = self
                .aggregates
                .iter()
                .map(|expr| expr.evaluate(&tuple, &child_schema))
                .collect();
            self.table.insert_combine(key, input);
        }

        self.results = self.table.drain();
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<(Tuple, RecordId)>> {
        if let Some((key, aggregates)) = self.results.get(self.cursor) {
            self.cursor += 1;
            let mut values = key.0.clone();
            values.extend(aggregates.iter().cloned());
            let tuple = Tuple::new(Arc::clone(&self.output_schema), values);
            return Ok(Some((tuple, placeholder_rid())));
        }

        // Aggregating nothing without group-bys still produces one row.
        if self.results.is_empty() && self.group_bys.is_empty() && !self.emitted_empty_result {
            self.emitted_empty_result = true;
            let tuple = Tuple::new(Arc::clone(&self.output_schema), self.table.initial_values());
            return Ok(Some((tuple, placeholder_rid())));
        }

        Ok(None)
    }

    pub fn output_schema(&self) -> &Arc<Schema> {
        &self.output_schema
    }
}
