use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Columns every sales sheet must carry.
///
/// The remaining columns of an input sheet are kept as [`CellValue`]s in
/// [`SalesRecord::extra`] so exports can reproduce the original table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    OrderId,
    OrderDate,
    ShipDate,
    Segment,
    Category,
    ProductName,
    Sales,
    Profit,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::OrderId,
        Field::OrderDate,
        Field::ShipDate,
        Field::Segment,
        Field::Category,
        Field::ProductName,
        Field::Sales,
        Field::Profit,
    ];

    /// Header text as it appears in the sheet
    pub fn header(self) -> &'static str {
        match self {
            Field::OrderId => "Order ID",
            Field::OrderDate => "Order Date",
            Field::ShipDate => "Ship Date",
            Field::Segment => "Segment",
            Field::Category => "Category",
            Field::ProductName => "Product Name",
            Field::Sales => "Sales",
            Field::Profit => "Profit",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        Field::ALL
            .into_iter()
            .find(|field| field.header().eq_ignore_ascii_case(name.trim()))
    }

    pub fn is_date(self) -> bool {
        matches!(self, Field::OrderDate | Field::ShipDate)
    }
}

/// An untyped cell carried through from the input sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Plain text rendering used by the CSV export and the preview table
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Where a header column's values live inside a [`SalesRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Field(Field),
    /// Index into [`SalesRecord::extra`]
    Extra(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// One line item of the sales sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    /// Not unique: an order spans several line items
    pub order_id: String,
    pub order_date: NaiveDate,
    pub ship_date: NaiveDate,
    pub segment: String,
    pub category: String,
    pub product_name: String,
    pub sales: f64,
    pub profit: f64,
    pub extra: Vec<CellValue>,
}

impl SalesRecord {
    /// Value of a header column for this row
    pub fn value(&self, kind: ColumnKind) -> CellValue {
        match kind {
            ColumnKind::Field(field) => match field {
                Field::OrderId => CellValue::Text(self.order_id.clone()),
                Field::OrderDate => CellValue::Date(self.order_date),
                Field::ShipDate => CellValue::Date(self.ship_date),
                Field::Segment => CellValue::Text(self.segment.clone()),
                Field::Category => CellValue::Text(self.category.clone()),
                Field::ProductName => CellValue::Text(self.product_name.clone()),
                Field::Sales => CellValue::Number(self.sales),
                Field::Profit => CellValue::Number(self.profit),
            },
            ColumnKind::Extra(index) => self.extra.get(index).cloned().unwrap_or(CellValue::Empty),
        }
    }
}

/// A loaded sales table. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub records: Vec<SalesRecord>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, records: Vec<SalesRecord>) -> Self {
        Dataset { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// A row rendered in header order
    pub fn row_values(&self, record: &SalesRecord) -> Vec<CellValue> {
        self.columns.iter().map(|c| record.value(c.kind)).collect()
    }
}
