use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 9] = [
    "Row ID",
    "Order ID",
    "Order Date",
    "Ship Date",
    "Segment",
    "Category",
    "Product Name",
    "Sales",
    "Profit",
];

/// (order, date, segment, category, product, sales, profit)
pub const ROWS: [(&str, &str, &str, &str, &str, f64, f64); 8] = [
    ("US-1", "2023-11-04", "Consumer", "Furniture", "Bookcase", 400.0, 60.0),
    ("US-1", "2023-11-04", "Consumer", "Technology", "Printer", 300.0, 90.0),
    ("US-2", "2023-11-21", "Corporate", "Office Supplies", "Stapler", 25.0, 5.0),
    ("US-3", "2023-12-09", "Consumer", "Technology", "Printer", 350.0, 70.0),
    ("US-4", "2023-12-30", "Home Office", "Furniture", "Desk", 900.0, -90.0),
    ("US-5", "2024-01-15", "Corporate", "Technology", "Monitor", 500.0, 100.0),
    ("US-6", "2024-01-16", "Consumer", "Office Supplies", "Stapler", 30.0, 6.0),
    ("US-7", "2024-02-02", "Home Office", "Office Supplies", "Envelope", 0.0, -2.0),
];

fn sheet() -> Result<Worksheet, rust_xlsxwriter::XlsxError> {
    let mut worksheet = Worksheet::new();
    for (c, name) in HEADER.iter().enumerate() {
        worksheet.write_string(0, c as u16, *name)?;
    }
    for (r, (order, date, segment, category, product, sales, profit)) in ROWS.iter().enumerate() {
        let row = (r + 1) as u32;
        worksheet.write_number(row, 0, (r + 1) as f64)?;
        worksheet.write_string(row, 1, *order)?;
        worksheet.write_string(row, 2, *date)?;
        worksheet.write_string(row, 3, *date)?;
        worksheet.write_string(row, 4, *segment)?;
        worksheet.write_string(row, 5, *category)?;
        worksheet.write_string(row, 6, *product)?;
        worksheet.write_number(row, 7, *sales)?;
        worksheet.write_number(row, 8, *profit)?;
    }
    Ok(worksheet)
}

/// Bytes of a small sales workbook
pub fn workbook_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    workbook.push_worksheet(sheet().unwrap());
    workbook.save_to_buffer().unwrap()
}

pub fn write_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("superstore_update.xlsx");
    std::fs::write(&path, workbook_bytes()).unwrap();
    path
}
