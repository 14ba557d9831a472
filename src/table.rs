use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{Result, TallyError};
use crate::importer::{parse_amount, parse_timestamp};
use crate::models::TIMESTAMP_FORMAT;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Cell {
        Cell::Text(value.into())
    }

    /// Render for CSV output. Null renders as an empty field.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Float(v) => v.to_string(),
            Cell::Timestamp(t) => t.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// A row-major table with named columns. Raw exports, processed tables and
/// canonical output all share this shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Borrowed view of one row, with typed accessors that parse text cells.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Result<&'a Cell> {
        let idx = self.table.require(column)?;
        Ok(&self.table.rows[self.index][idx])
    }

    pub fn float(&self, column: &str) -> Result<f64> {
        match self.get(column)? {
            Cell::Null => Ok(0.0),
            Cell::Float(v) => Ok(*v),
            Cell::Text(s) => parse_amount(s).ok_or_else(|| TallyError::InvalidNumber {
                column: column.to_string(),
                row: self.index,
                value: s.clone(),
            }),
            Cell::Timestamp(t) => Err(TallyError::InvalidNumber {
                column: column.to_string(),
                row: self.index,
                value: t.to_string(),
            }),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        Ok(self.get(column)?.render())
    }

    pub fn timestamp(&self, column: &str) -> Result<NaiveDateTime> {
        match self.get(column)? {
            Cell::Timestamp(t) => Ok(*t),
            Cell::Text(s) => parse_timestamp(s).ok_or_else(|| TallyError::InvalidTimestamp {
                column: column.to_string(),
                row: self.index,
                value: s.clone(),
            }),
            other => Err(TallyError::InvalidTimestamp {
                column: column.to_string(),
                row: self.index,
                value: other.render(),
            }),
        }
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(TallyError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| TallyError::missing_column(name, "table"))
    }

    pub fn row(&self, index: usize) -> Row<'_> {
        Row { table: self, index }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    pub fn floats(&self, column: &str) -> Result<Vec<f64>> {
        self.iter_rows().map(|r| r.float(column)).collect()
    }

    pub fn set(&mut self, row: usize, column: &str, cell: Cell) -> Result<()> {
        let idx = self.require(column)?;
        match self.rows.get_mut(row) {
            Some(r) => {
                r[idx] = cell;
                Ok(())
            }
            None => Err(TallyError::Other(format!("row {row} out of bounds"))),
        }
    }

    /// Append `column` filled with `cell` if absent; existing values are kept.
    pub fn ensure_column(&mut self, column: &str, cell: Cell) {
        if self.has_column(column) {
            return;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(cell.clone());
        }
    }

    /// Overwrite (or append) `column` with one value per row.
    pub fn set_column(&mut self, column: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(TallyError::RowWidth {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        self.ensure_column(column, Cell::Null);
        let idx = self.require(column)?;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    pub fn fill_column(&mut self, column: &str, cell: Cell) -> Result<()> {
        let values = vec![cell; self.rows.len()];
        self.set_column(column, values)
    }

    /// Compute `column` row by row from the current contents.
    pub fn derive<F>(&mut self, column: &str, f: F) -> Result<()>
    where
        F: Fn(Row<'_>) -> Result<Cell>,
    {
        let values = self.iter_rows().map(f).collect::<Result<Vec<_>>>()?;
        self.set_column(column, values)
    }

    pub fn derive_float<F>(&mut self, column: &str, f: F) -> Result<()>
    where
        F: Fn(Row<'_>) -> Result<f64>,
    {
        self.derive(column, |row| f(row).map(Cell::Float))
    }

    /// New table holding only `columns`, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    pub fn drop_column(&mut self, column: &str) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    pub fn retain_rows<F>(&mut self, keep: F) -> Result<()>
    where
        F: Fn(Row<'_>) -> Result<bool>,
    {
        let flags = self.iter_rows().map(keep).collect::<Result<Vec<_>>>()?;
        let mut flags = flags.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        Ok(())
    }

    /// Stable sort of rows by a key computed per row.
    pub fn sort_rows_by_key<K, F>(&mut self, key: F) -> Result<()>
    where
        K: Ord,
        F: Fn(Row<'_>) -> Result<K>,
    {
        let keys = self.iter_rows().map(key).collect::<Result<Vec<_>>>()?;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        let mut rows: Vec<Option<Vec<Cell>>> = self.rows.drain(..).map(Some).collect();
        self.rows = order.into_iter().filter_map(|i| rows[i].take()).collect();
        Ok(())
    }

    pub fn pop_row(&mut self) -> Option<Vec<Cell>> {
        self.rows.pop()
    }

    pub fn map_cells<F>(&mut self, column: &str, f: F) -> Result<()>
    where
        F: Fn(&Cell) -> Cell,
    {
        let idx = self.require(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(Cell::render))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}
