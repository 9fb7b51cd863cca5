use std::{collections::BTreeMap, fmt, ops::Range};

use serde::{Deserialize, Serialize, ser::SerializeMap};

use crate::{Result, TabularErr};

/// A single cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as a real number, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// The type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    Int,
    Float,
    Bool,
    Str,
}

/// A typed column of nullable cells.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
}

impl Column {
    /// Infers a column from loose values.
    ///
    /// Only booleans makes a `Bool` column, only integers an `Int` one, any mix of integers and
    /// reals a `Float` one. Anything else is stringified into a `Str` column. A column without
    /// non-null values is a `Float` column of nulls.
    pub fn from_values(values: &[Value]) -> Self {
        let (mut bools, mut ints, mut floats, mut strs) = (0, 0, 0, 0);
        for v in values {
            match v {
                Value::Null => {}
                Value::Bool(_) => bools += 1,
                Value::Int(_) => ints += 1,
                Value::Float(_) => floats += 1,
                Value::Str(_) => strs += 1,
            }
        }

        let present = bools + ints + floats + strs;
        if present == 0 {
            return Column::Float(vec![None; values.len()]);
        }

        if bools == present {
            return Column::Bool(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect(),
            );
        }

        if ints == present {
            return Column::Int(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect(),
            );
        }

        if ints + floats == present {
            return Column::Float(values.iter().map(Value::as_f64).collect());
        }

        Column::Str(
            values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Column::Int(_) => DType::Int,
            Column::Float(_) => DType::Float,
            Column::Bool(_) => DType::Bool,
            Column::Str(_) => DType::Str,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Int(_) | Column::Float(_))
    }

    /// Returns the cell at `row`, `Value::Null` when missing or out of range.
    pub fn get(&self, row: usize) -> Value {
        let value = match self {
            Column::Int(v) => v.get(row).copied().flatten().map(Value::Int),
            Column::Float(v) => v
                .get(row)
                .copied()
                .flatten()
                .filter(|f| !f.is_nan())
                .map(Value::Float),
            Column::Bool(v) => v.get(row).copied().flatten().map(Value::Bool),
            Column::Str(v) => v.get(row).cloned().flatten().map(Value::Str),
        };

        value.unwrap_or(Value::Null)
    }

    /// The column as reals, nulls and NaNs are `None`. Non-numeric columns are all `None`.
    pub fn to_f64(&self) -> Vec<Option<f64>> {
        match self {
            Column::Int(v) => v.iter().map(|x| x.map(|x| x as f64)).collect(),
            Column::Float(v) => v.iter().map(|x| x.filter(|x| !x.is_nan())).collect(),
            _ => vec![None; self.len()],
        }
    }

    /// Gathers the given rows into a new column.
    pub fn take(&self, rows: &[usize]) -> Column {
        fn gather<T: Clone>(v: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
            rows.iter().map(|&r| v.get(r).cloned().flatten()).collect()
        }

        match self {
            Column::Int(v) => Column::Int(gather(v, rows)),
            Column::Float(v) => Column::Float(gather(v, rows)),
            Column::Bool(v) => Column::Bool(gather(v, rows)),
            Column::Str(v) => Column::Str(gather(v, rows)),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Column {
        let rows: Vec<_> = range.collect();
        self.take(&rows)
    }
}

impl From<Vec<f64>> for Column {
    fn from(value: Vec<f64>) -> Self {
        Column::Float(value.into_iter().map(Some).collect())
    }
}

impl From<Vec<i64>> for Column {
    fn from(value: Vec<i64>) -> Self {
        Column::Int(value.into_iter().map(Some).collect())
    }
}

impl From<Vec<bool>> for Column {
    fn from(value: Vec<bool>) -> Self {
        Column::Bool(value.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Column {
    fn from(value: Vec<&str>) -> Self {
        Column::Str(value.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<String>> for Column {
    fn from(value: Vec<String>) -> Self {
        Column::Str(value.into_iter().map(Some).collect())
    }
}

/// An ordered set of equally long named columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frame from `(name, column)` pairs.
    ///
    /// # Returns
    /// An error if two columns share a name or have different lengths.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame.push(name, column)?;
        }

        Ok(frame)
    }

    /// Builds a frame out of row records, a key missing from a record is a null cell.
    ///
    /// Columns are ordered by first appearance and typed with `Column::from_values`.
    pub fn from_records(records: &[BTreeMap<String, Value>]) -> Result<Self> {
        let mut names: Vec<&String> = Vec::new();
        for record in records {
            for name in record.keys() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        Self::from_columns(names.into_iter().map(|name| {
            let values: Vec<_> = records
                .iter()
                .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            (name.clone(), Column::from_values(&values))
        }))
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();

        if self.names.contains(&name) {
            return Err(TabularErr::DuplicateColumn(name));
        }

        if !self.columns.is_empty() && column.len() != self.nrows() {
            return Err(TabularErr::LengthMismatch {
                column: name,
                got: column.len(),
                expected: self.nrows(),
            });
        }

        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Like `column` but a missing column is an error.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| TabularErr::ColumnMissing(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(&self.columns)
    }

    /// Gathers the given rows into a new frame.
    pub fn take(&self, rows: &[usize]) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Frame {
        let rows: Vec<_> = range.collect();
        self.take(&rows)
    }

    /// A serializable view of one row, as a map from column name to cell.
    pub fn row(&self, row: usize) -> Row<'_> {
        Row { frame: self, row }
    }
}

/// One row of a `Frame`, serialized as an ordered map.
pub struct Row<'a> {
    frame: &'a Frame,
    row: usize,
}

impl Serialize for Row<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.frame.ncols()))?;
        for (name, column) in self.frame.iter() {
            map.serialize_entry(name, &column.get(self.row))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_column_types() {
        let ints = [Value::Int(1), Value::Null, Value::Int(3)];
        assert_eq!(Column::from_values(&ints).dtype(), DType::Int);

        let mixed = [Value::Int(1), Value::Float(2.5)];
        assert_eq!(
            Column::from_values(&mixed),
            Column::Float(vec![Some(1.), Some(2.5)])
        );

        let bools = [Value::Bool(true), Value::Null];
        assert_eq!(Column::from_values(&bools).dtype(), DType::Bool);

        let strs = [Value::from("a"), Value::Int(1)];
        assert_eq!(
            Column::from_values(&strs),
            Column::Str(vec![Some("a".into()), Some("1".into())])
        );
    }

    #[test]
    fn rejects_ragged_and_duplicate_columns() {
        let mut frame = Frame::from_columns([("a", Column::from(vec![1., 2.]))]).unwrap();

        assert!(matches!(
            frame.push("b", Column::from(vec![1.])),
            Err(TabularErr::LengthMismatch { got: 1, expected: 2, .. })
        ));
        assert!(matches!(
            frame.push("a", Column::from(vec![3., 4.])),
            Err(TabularErr::DuplicateColumn(_))
        ));
    }

    #[test]
    fn records_fill_missing_keys_with_nulls() {
        let records: Vec<BTreeMap<String, Value>> = vec![
            [("x".to_string(), Value::Int(1))].into(),
            [
                ("x".to_string(), Value::Int(2)),
                ("y".to_string(), Value::from("b")),
            ]
            .into(),
        ];

        let frame = Frame::from_records(&records).unwrap();
        assert_eq!(frame.names(), ["x", "y"]);
        assert_eq!(frame.require("y").unwrap().get(0), Value::Null);
        assert_eq!(frame.require("y").unwrap().get(1), Value::from("b"));
    }

    #[test]
    fn take_reorders_rows() {
        let frame = Frame::from_columns([("a", Column::from(vec!["x", "y", "z"]))]).unwrap();
        let taken = frame.take(&[2, 0]);

        assert_eq!(taken.require("a").unwrap(), &Column::from(vec!["z", "x"]));
    }

    #[test]
    fn rows_serialize_in_column_order() {
        let frame = Frame::from_columns([
            ("b", Column::from(vec![1i64])),
            ("a", Column::Str(vec![None])),
        ])
        .unwrap();

        let json = serde_json::to_string(&frame.row(0)).unwrap();
        assert_eq!(json, r#"{"b":1,"a":null}"#);
    }
}
