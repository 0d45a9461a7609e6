use std::sync::Arc;

use super::{Schema, Value};

/// A single row: typed values conforming to a schema.
///
/// ## Binary format
///
/// ```text
/// +----------------+------------------+------------------+
/// | Null Bitmap    | Fixed-Size Data  | Variable-Size    |
/// | (N bytes)      | (F bytes)        | Data (V bytes)   |
/// +----------------+------------------+------------------+
/// ```
///
/// One bit per column in the bitmap (1 = NULL). Fixed-size columns are laid
/// out in schema order at known offsets (NULLs still occupy their slot);
/// variable-size columns follow, each with a 2-byte length prefix (0 for
/// NULL).
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,
    /// The values for each column (in schema order)
    values: Vec<Value>,
}

impl Tuple {
    /// Creates a new tuple with the given schema and values.
    ///
    /// # Panics
    /// Panics if the number of values doesn't match the schema column count.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.column_count(),
            "Value count must match schema column count"
        );
        Self { schema, values }
    }

    /// Reconstructs a tuple from its serialized bytes.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Option<Self> {
        let values = Self::deserialize_values(&schema, data)?;
        Some(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serializes the tuple for storage.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.null_bitmap());

        for (i, col) in self.schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                continue;
            }
            let value = &self.values[i];
            if value.is_null() {
                // NULL fixed-size columns keep their slot so offsets hold.
                bytes.extend(std::iter::repeat(0u8).take(col.fixed_size().unwrap()));
            } else {
                bytes.extend(value.serialize(col.data_type())?);
            }
        }

        for (i, col) in self.schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                continue;
            }
            let value = &self.values[i];
            if value.is_null() {
                bytes.extend_from_slice(&0u16.to_le_bytes());
            } else {
                bytes.extend(value.serialize(col.data_type())?);
            }
        }

        Some(bytes)
    }

    fn null_bitmap(&self) -> Vec<u8> {
        let mut bitmap = vec![0u8; self.schema.null_bitmap_size()];
        for (i, value) in self.values.iter().enumerate() {
            if value.is_null() {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        bitmap
    }

    fn deserialize_values(schema: &Schema, data: &[u8]) -> Option<Vec<Value>> {
        let bitmap_size = schema.null_bitmap_size();
        let bitmap = data.get(..bitmap_size)?;
        let is_null =
            |col_index: usize| -> bool { (bitmap[col_index / 8] & (1 << (col_index % 8))) != 0 };

        let mut offset = bitmap_size;
        let mut values = vec![Value::Null; schema.column_count()];

        for (i, col) in schema.columns().enumerate() {
            if !col.data_type().is_fixed_size() {
                continue;
            }
            if is_null(i) {
                offset += col.fixed_size().unwrap();
            } else {
                let (value, size) = Value::deserialize(data.get(offset..)?, col.data_type())?;
                values[i] = value;
                offset += size;
            }
        }

        for (i, col) in schema.columns().enumerate() {
            if col.data_type().is_fixed_size() {
                continue;
            }
            if is_null(i) {
                let len_bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
                if u16::from_le_bytes(len_bytes) != 0 {
                    return None;
                }
                offset += 2;
            } else {
                let (value, size) = Value::deserialize(data.get(offset..)?, col.data_type())?;
                values[i] = value;
                offset += size;
            }
        }

        Some(values)
    }

    /// Creates a projection of this tuple with only the specified columns.
    pub fn project(&self, column_indices: &[usize]) -> Option<Tuple> {
        let projected_schema = self.schema.project(column_indices)?;
        let projected_values: Option<Vec<Value>> = column_indices
            .iter()
            .map(|&i| self.values.get(i).cloned())
            .collect();

        Some(Tuple::new(Arc::new(projected_schema), projected_values?))
    }

    /// Extracts the index key tuple described by `key_attrs` from this row.
    pub fn key_from_tuple(&self, key_schema: Arc<Schema>, key_attrs: &[usize]) -> Option<Tuple> {
        let key_values: Option<Vec<Value>> = key_attrs
            .iter()
            .map(|&i| self.values.get(i).cloned())
            .collect();
        Some(Tuple::new(key_schema, key_values?))
    }

    /// Serializes the named columns back-to-back, the form indexes digest.
    pub fn key_bytes(&self, column_indices: &[usize]) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        for &i in column_indices {
            let col = self.schema.column(i)?;
            let value = self.value(i)?;
            bytes.extend(value.serialize(col.data_type())?);
        }
        Some(bytes)
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
    current_index: usize,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: vec![Value::Null; count],
            current_index: 0,
        }
    }

    /// Sets the value at the current position and advances.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        if self.current_index < self.values.len() {
            self.values[self.current_index] = value.into();
            self.current_index += 1;
        }
        self
    }

    /// Sets a null at the current position and advances.
    pub fn null(mut self) -> Self {
        if self.current_index < self.values.len() {
            self.values[self.current_index] = Value::Null;
            self.current_index += 1;
        }
        self
    }

    /// Sets the value for a specific column by name.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Some(index) = self.schema.column_index(name) {
            self.values[index] = value.into();
        }
        self
    }

    pub fn build(self) -> Tuple {
        Tuple::new(self.schema, self.values)
    }
}
