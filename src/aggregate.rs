use crate::record::SalesRecord;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Headline figures of the filtered subset
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    /// Distinct Order IDs, not line items
    pub order_count: usize,
}

/// Per-product averages shown in the margin table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginRow {
    pub product_name: String,
    pub mean_sales: f64,
    pub mean_profit: f64,
    /// `None` when every line item of the product has zero Sales
    pub mean_margin_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryBucket {
    pub month_end: NaiveDate,
    pub category: String,
    pub sales: f64,
}

/// One time bucket of a single-series trend, labelled by its last day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub period_end: NaiveDate,
    pub sales: f64,
}

pub fn kpis(rows: &[&SalesRecord]) -> Kpis {
    let orders: HashSet<&str> = rows.iter().map(|r| r.order_id.as_str()).collect();
    Kpis {
        total_sales: rows.iter().map(|r| r.sales).sum(),
        total_profit: rows.iter().map(|r| r.profit).sum(),
        order_count: orders.len(),
    }
}

/// Profit as a percentage of Sales; undefined for zero Sales
pub fn profit_margin(record: &SalesRecord) -> Option<f64> {
    if record.sales == 0.0 {
        None
    } else {
        Some(record.profit / record.sales * 100.0)
    }
}

#[derive(Default)]
struct ProductTotals {
    count: usize,
    sales: f64,
    profit: f64,
    margin_sum: f64,
    margin_count: usize,
}

/// Mean Sales, Profit and margin per product, best margins first.
///
/// Groups are formed in product-name order and the sort is stable, so ties
/// keep alphabetical order. Products without a defined margin sort last.
pub fn margin_report(rows: &[&SalesRecord], top_n: usize) -> Vec<MarginRow> {
    let mut groups: BTreeMap<&str, ProductTotals> = BTreeMap::new();
    for row in rows {
        let totals = groups.entry(row.product_name.as_str()).or_default();
        totals.count += 1;
        totals.sales += row.sales;
        totals.profit += row.profit;
        if let Some(margin) = profit_margin(row) {
            totals.margin_sum += margin;
            totals.margin_count += 1;
        }
    }

    let mut report: Vec<MarginRow> = groups
        .into_iter()
        .map(|(name, t)| MarginRow {
            product_name: name.to_string(),
            mean_sales: t.sales / t.count as f64,
            mean_profit: t.profit / t.count as f64,
            mean_margin_pct: (t.margin_count > 0).then(|| t.margin_sum / t.margin_count as f64),
        })
        .collect();

    report.sort_by(|a, b| match (a.mean_margin_pct, b.mean_margin_pct) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    report.truncate(top_n);
    report
}

/// Last calendar day of the date's month
pub fn month_end(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// The Monday closing the week that contains `date` (a Monday maps to itself)
pub fn week_end_monday(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_days(Days::new(u64::from(offset))).unwrap_or(date)
}

/// Sales per (month, Category) pair that occurs in the rows
pub fn monthly_by_category(rows: &[&SalesRecord]) -> Vec<CategoryBucket> {
    let mut sums: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for row in rows {
        *sums
            .entry((month_end(row.order_date), row.category.as_str()))
            .or_default() += row.sales;
    }
    sums.into_iter()
        .map(|((month_end, category), sales)| CategoryBucket {
            month_end,
            category: category.to_string(),
            sales,
        })
        .collect()
}

/// Sales per calendar month, gap-free from the first to the last month
pub fn monthly_totals(rows: &[&SalesRecord]) -> Vec<Bucket> {
    contiguous(rows, month_end, |end| end.succ_opt().map(month_end))
}

/// Sales per Monday-ending week, gap-free
pub fn weekly_totals(rows: &[&SalesRecord]) -> Vec<Bucket> {
    contiguous(rows, week_end_monday, |end| end.checked_add_days(Days::new(7)))
}

fn contiguous(
    rows: &[&SalesRecord],
    bucket_of: impl Fn(NaiveDate) -> NaiveDate,
    next: impl Fn(NaiveDate) -> Option<NaiveDate>,
) -> Vec<Bucket> {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        *sums.entry(bucket_of(row.order_date)).or_default() += row.sales;
    }

    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    let mut current = Some(first);
    // Stops at the last bucket or where the calendar runs out
    while let Some(end) = current.filter(|end| *end <= last) {
        buckets.push(Bucket {
            period_end: end,
            sales: sums.get(&end).copied().unwrap_or(0.0),
        });
        current = next(end);
    }
    buckets
}
