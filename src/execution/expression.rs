use std::cmp::Ordering;
use std::sync::Arc;

use crate::tuple::{DataType, Schema, Tuple, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// An expression tree evaluated against tuples.
///
/// Variants are dispatched on kind; children are shared behind `Arc` so
/// optimizer rewrites can recombine subtrees without cloning them.
#[derive(Debug, Clone)]
pub enum Expression {
    /// References a column of an input tuple. `tuple_idx` picks the side
    /// in a join context (0 = left/outer, 1 = right/inner).
    ColumnRef {
        tuple_idx: usize,
        col_idx: usize,
        return_type: DataType,
    },
    /// A literal value
    Constant { value: Value },
    /// Binary comparison producing a boolean (NULL on NULL input)
    Comparison {
        op: ComparisonOp,
        left: Arc<Expression>,
        right: Arc<Expression>,
    },
    /// Binary arithmetic over numeric operands
    Arithmetic {
        op: ArithmeticOp,
        left: Arc<Expression>,
        right: Arc<Expression>,
    },
    /// Boolean connective with three-valued NULL handling
    Logic {
        op: LogicOp,
        left: Arc<Expression>,
        right: Arc<Expression>,
    },
}

impl Expression {
    pub fn column(tuple_idx: usize, col_idx: usize, return_type: DataType) -> Arc<Expression> {
        Arc::new(Expression::ColumnRef {
            tuple_idx,
            col_idx,
            return_type,
        })
    }

    pub fn constant(value: impl Into<Value>) -> Arc<Expression> {
        Arc::new(Expression::Constant {
            value: value.into(),
        })
    }

    pub fn comparison(
        op: ComparisonOp,
        left: Arc<Expression>,
        right: Arc<Expression>,
    ) -> Arc<Expression> {
        Arc::new(Expression::Comparison { op, left, right })
    }

    pub fn arithmetic(
        op: ArithmeticOp,
        left: Arc<Expression>,
        right: Arc<Expression>,
    ) -> Arc<Expression> {
        Arc::new(Expression::Arithmetic { op, left, right })
    }

    pub fn logic(op: LogicOp, left: Arc<Expression>, right: Arc<Expression>) -> Arc<Expression> {
        Arc::new(Expression::Logic { op, left, right })
    }

    /// Evaluates against a single tuple.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        match self {
            Expression::ColumnRef { col_idx, .. } => {
                tuple.value(*col_idx).cloned().unwrap_or(Value::Null)
            }
            Expression::Constant { value } => value.clone(),
            Expression::Comparison { op, left, right } => Self::compare_values(
                *op,
                &left.evaluate(tuple, schema),
                &right.evaluate(tuple, schema),
            ),
            Expression::Arithmetic { op, left, right } => Self::arith_values(
                *op,
                &left.evaluate(tuple, schema),
                &right.evaluate(tuple, schema),
            ),
            Expression::Logic { op, left, right } => Self::logic_values(
                *op,
                &left.evaluate(tuple, schema),
                &right.evaluate(tuple, schema),
            ),
        }
    }

    /// Evaluates in a join context: column references pick their tuple by
    /// `tuple_idx`.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        match self {
            Expression::ColumnRef {
                tuple_idx, col_idx, ..
            } => {
                let tuple = if *tuple_idx == 0 { left_tuple } else { right_tuple };
                tuple.value(*col_idx).cloned().unwrap_or(Value::Null)
            }
            Expression::Constant { value } => value.clone(),
            Expression::Comparison { op, left, right } => Self::compare_values(
                *op,
                &left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
                &right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
            ),
            Expression::Arithmetic { op, left, right } => Self::arith_values(
                *op,
                &left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
                &right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
            ),
            Expression::Logic { op, left, right } => Self::logic_values(
                *op,
                &left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
                &right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema),
            ),
        }
    }

    /// Static type of this expression's result.
    pub fn return_type(&self) -> DataType {
        match self {
            Expression::ColumnRef { return_type, .. } => *return_type,
            Expression::Constant { value } => value.infer_type().unwrap_or(DataType::Integer),
            Expression::Comparison { .. } | Expression::Logic { .. } => DataType::Boolean,
            Expression::Arithmetic { left, right, .. } => {
                // The result takes the wider operand type.
                match (left.return_type(), right.return_type()) {
                    (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
                    (DataType::Float, _) | (_, DataType::Float) => DataType::Double,
                    (DataType::BigInt, _) | (_, DataType::BigInt) => DataType::BigInt,
                    _ => DataType::Integer,
                }
            }
        }
    }

    /// The direct children of this node, left to right.
    pub fn children(&self) -> Vec<Arc<Expression>> {
        match self {
            Expression::ColumnRef { .. } | Expression::Constant { .. } => Vec::new(),
            Expression::Comparison { left, right, .. }
            | Expression::Arithmetic { left, right, .. }
            | Expression::Logic { left, right, .. } => {
                vec![Arc::clone(left), Arc::clone(right)]
            }
        }
    }

    /// Rebuilds this node over new children (same arity).
    pub fn clone_with_children(&self, children: Vec<Arc<Expression>>) -> Expression {
        match self {
            Expression::ColumnRef { .. } | Expression::Constant { .. } => {
                assert!(children.is_empty());
                self.clone()
            }
            Expression::Comparison { op, .. } => {
                let [left, right]: [Arc<Expression>; 2] = children.try_into().unwrap();
                Expression::Comparison {
                    op: *op,
                    left,
                    right,
                }
            }
            Expression::Arithmetic { op, .. } => {
                let [left, right]: [Arc<Expression>; 2] = children.try_into().unwrap();
                Expression::Arithmetic {
                    op: *op,
                    left,
                    right,
                }
            }
            Expression::Logic { op, .. } => {
                let [left, right]: [Arc<Expression>; 2] = children.try_into().unwrap();
                Expression::Logic {
                    op: *op,
                    left,
                    right,
                }
            }
        }
    }

    fn compare_values(op: ComparisonOp, left: &Value, right: &Value) -> Value {
        let Some(ordering) = left.compare(right) else {
            return Value::Null;
        };
        let result = match op {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
        };
        Value::Boolean(result)
    }

    fn arith_values(op: ArithmeticOp, left: &Value, right: &Value) -> Value {
        let result = match op {
            ArithmeticOp::Add => left.add(right),
            ArithmeticOp::Subtract => left.subtract(right),
        };
        result.unwrap_or(Value::Null)
    }

    fn logic_values(op: LogicOp, left: &Value, right: &Value) -> Value {
        match op {
            LogicOp::And => match (left, right) {
                (Value::Boolean(false), _) | (_, Value::Boolean(false)) => Value::Boolean(false),
                (Value::Boolean(true), Value::Boolean(true)) => Value::Boolean(true),
                _ => Value::Null,
            },
            LogicOp::Or => match (left, right) {
                (Value::Boolean(true), _) | (_, Value::Boolean(true)) => Value::Boolean(true),
                (Value::Boolean(false), Value::Boolean(false)) => Value::Boolean(false),
                _ => Value::Null,
            },
        }
    }
}
