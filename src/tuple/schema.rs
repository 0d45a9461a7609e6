use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// A single column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    name: String,
    /// Column data type
    data_type: DataType,
    /// Whether the column allows NULL values
    nullable: bool,
    /// Column position in the schema (0-indexed)
    ordinal: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            ordinal: 0, // assigned by Schema
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns the fixed size of this column, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        self.data_type.fixed_size()
    }

    /// Returns the maximum number of bytes this column can occupy.
    pub fn max_size(&self) -> usize {
        self.data_type.max_size()
    }
}

/// An ordered set of columns describing the shape of a tuple.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,
    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,
    /// Total size of fixed-length columns
    fixed_size: usize,
    /// Number of variable-length columns
    variable_count: usize,
    /// Size of the null bitmap in bytes (ceiling of column_count / 8)
    null_bitmap_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut columns = columns;
        let mut name_to_index = HashMap::new();
        let mut fixed_size = 0;
        let mut variable_count = 0;

        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i;
            name_to_index.insert(col.name.clone(), i);

            if let Some(size) = col.fixed_size() {
                fixed_size += size;
            } else {
                variable_count += 1;
            }
        }

        let null_bitmap_size = columns.len().div_ceil(8);

        Self {
            columns,
            name_to_index,
            fixed_size,
            variable_count,
            null_bitmap_size,
        }
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.name_to_index
            .get(name)
            .and_then(|&i| self.columns.get(i))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn fixed_size(&self) -> usize {
        self.fixed_size
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.null_bitmap_size
    }

    /// Returns the maximum serialized tuple size for this schema.
    pub fn max_tuple_size(&self) -> usize {
        self.null_bitmap_size + self.columns.iter().map(|c| c.max_size()).sum::<usize>()
    }

    /// Creates a projection of this schema with only the specified columns.
    pub fn project(&self, column_indices: &[usize]) -> Option<Schema> {
        let columns: Option<Vec<Column>> = column_indices
            .iter()
            .map(|&i| self.columns.get(i).cloned())
            .collect();

        columns.map(Schema::new)
    }

    /// Creates a projection of this schema with only the named columns.
    pub fn project_by_name(&self, column_names: &[&str]) -> Option<Schema> {
        let indices: Option<Vec<usize>> = column_names
            .iter()
            .map(|name| self.column_index(name))
            .collect();

        indices.and_then(|i| self.project(&i))
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Builder for constructing schemas fluently.
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a non-nullable column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    /// Adds a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::VarChar(100))
            .nullable_column("email", DataType::VarChar(200))
            .column("age", DataType::SmallInt)
            .build()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();

        assert_eq!(schema.column_count(), 4);
        assert_eq!(schema.column(0).unwrap().name(), "id");
        assert_eq!(schema.column(3).unwrap().name(), "age");
        for (i, col) in schema.columns().enumerate() {
            assert_eq!(col.ordinal(), i);
        }
    }

    #[test]
    fn test_column_lookup() {
        let schema = create_test_schema();

        assert_eq!(schema.column_index("id"), Some(0));
        assert_eq!(schema.column_index("nonexistent"), None);

        let col = schema.column_by_name("email").unwrap();
        assert!(col.is_nullable());
        assert_eq!(*col.data_type(), DataType::VarChar(200));
    }

    #[test]
    fn test_size_calculations() {
        let schema = create_test_schema();

        // id (4) + age (2)
        assert_eq!(schema.fixed_size(), 6);
        assert_eq!(schema.variable_count(), 2);
        assert_eq!(schema.null_bitmap_size(), 1);
    }

    #[test]
    fn test_projection() {
        let schema = create_test_schema();

        let projected = schema.project(&[0, 2]).unwrap();
        assert_eq!(projected.column_count(), 2);
        assert_eq!(projected.column(0).unwrap().name(), "id");
        assert_eq!(projected.column(1).unwrap().name(), "email");

        let by_name = schema.project_by_name(&["name", "age"]).unwrap();
        assert_eq!(by_name.column(0).unwrap().name(), "name");
        assert_eq!(by_name.column(1).unwrap().name(), "age");

        assert!(schema.project(&[9]).is_none());
    }
}
