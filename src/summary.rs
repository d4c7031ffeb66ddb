use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::models::{Category, Expense, MONTH_FMT, round2};

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub month_key: String,
    pub total_amount: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub category: Category,
    pub total_amount: f64,
}

/// Records dated after today, bucketed for charting and listed for the
/// detail table. Both vectors empty when nothing lies ahead.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FutureCommitments {
    pub by_month: Vec<MonthlySummary>,
    pub detail: Vec<Expense>,
}

/// `YYYY-MM` grouping key for a calendar date.
pub fn month_key(date: NaiveDate) -> String {
    date.format(MONTH_FMT).to_string()
}

/// Per-month totals and record counts over the whole record set, ascending
/// by month key.
pub fn monthly_summary(records: &[Expense]) -> Vec<MonthlySummary> {
    let mut buckets: Vec<MonthlySummary> = Vec::new();
    for record in records {
        let key = month_key(record.date);
        match buckets.iter_mut().find(|b| b.month_key == key) {
            Some(bucket) => {
                bucket.total_amount += record.amount;
                bucket.record_count += 1;
            }
            None => buckets.push(MonthlySummary {
                month_key: key,
                total_amount: record.amount,
                record_count: 1,
            }),
        }
    }
    for bucket in &mut buckets {
        bucket.total_amount = round2(bucket.total_amount);
    }
    buckets.sort_by(|a, b| a.month_key.cmp(&b.month_key));
    buckets
}

/// Distinct month keys, newest first, for the month selector.
pub fn month_keys_desc(records: &[Expense]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for record in records {
        let key = month_key(record.date);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys.sort_by(|a, b| b.cmp(a));
    keys
}

/// The selected month's records, ascending by date. Records sharing a date
/// keep their storage order.
pub fn month_detail(records: &[Expense], selected: &str) -> Vec<Expense> {
    let mut rows: Vec<Expense> = records
        .iter()
        .filter(|r| month_key(r.date) == selected)
        .cloned()
        .collect();
    rows.sort_by_key(|r| r.date);
    rows
}

/// Per-category sums over the given records, descending by sum. Categories
/// with equal sums stay in first-seen order.
pub fn category_breakdown(records: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for record in records {
        match totals.iter_mut().find(|t| t.category == record.category) {
            Some(total) => total.total_amount += record.amount,
            None => totals.push(CategoryTotal {
                category: record.category,
                total_amount: record.amount,
            }),
        }
    }
    for total in &mut totals {
        total.total_amount = round2(total.total_amount);
    }
    totals.sort_by(|a, b| {
        b.total_amount
            .partial_cmp(&a.total_amount)
            .unwrap_or(Ordering::Equal)
    });
    totals
}

/// Everything dated strictly after `today`, bucketed by month for the chart
/// and date-sorted for the table.
pub fn future_commitments(records: &[Expense], today: NaiveDate) -> FutureCommitments {
    let future: Vec<Expense> = records
        .iter()
        .filter(|r| r.date > today)
        .cloned()
        .collect();
    let by_month = monthly_summary(&future);
    let mut detail = future;
    detail.sort_by_key(|r| r.date);
    FutureCommitments { by_month, detail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpenseType, PaymentMethod};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(id: i64, date: NaiveDate, category: Category, amount: f64) -> Expense {
        Expense {
            id,
            date,
            description: format!("expense {id}"),
            category,
            amount,
            payment_method: PaymentMethod::Debit,
            expense_type: ExpenseType::Variable,
            installment_index: None,
            installment_total: None,
        }
    }

    #[test]
    fn monthly_summary_groups_by_month() {
        let records = vec![
            expense(1, date(2024, 3, 5), Category::Food, 10.0),
            expense(2, date(2024, 4, 1), Category::Food, 5.0),
            expense(3, date(2024, 3, 20), Category::Leisure, 20.0),
        ];
        let summary = monthly_summary(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].month_key, "2024-03");
        assert_eq!(summary[0].total_amount, 30.0);
        assert_eq!(summary[0].record_count, 2);
        assert_eq!(summary[1].month_key, "2024-04");
        assert_eq!(summary[1].total_amount, 5.0);
        assert_eq!(summary[1].record_count, 1);
    }

    #[test]
    fn month_keys_are_listed_newest_first() {
        let records = vec![
            expense(1, date(2024, 3, 5), Category::Food, 10.0),
            expense(2, date(2024, 5, 1), Category::Food, 5.0),
            expense(3, date(2024, 3, 20), Category::Leisure, 20.0),
        ];
        assert_eq!(month_keys_desc(&records), vec!["2024-05", "2024-03"]);
    }

    #[test]
    fn month_detail_sorts_by_date_and_keeps_storage_order_for_ties() {
        let records = vec![
            expense(1, date(2024, 3, 20), Category::Food, 10.0),
            expense(2, date(2024, 3, 5), Category::Food, 5.0),
            expense(3, date(2024, 3, 5), Category::Leisure, 20.0),
            expense(4, date(2024, 4, 1), Category::Food, 1.0),
        ];
        let detail = month_detail(&records, "2024-03");
        let ids: Vec<i64> = detail.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn category_breakdown_sorts_descending_with_first_seen_ties() {
        let records = vec![
            expense(1, date(2024, 3, 1), Category::Leisure, 15.0),
            expense(2, date(2024, 3, 2), Category::Food, 15.0),
            expense(3, date(2024, 3, 3), Category::Housing, 40.0),
        ];
        let breakdown = category_breakdown(&records);
        let categories: Vec<Category> = breakdown.iter().map(|t| t.category).collect();
        // Housing leads; Leisure and Food tie and keep first-seen order.
        assert_eq!(
            categories,
            vec![Category::Housing, Category::Leisure, Category::Food]
        );
    }

    #[test]
    fn future_commitments_filter_strictly_after_today() {
        let today = date(2024, 3, 15);
        let records = vec![
            expense(1, date(2024, 3, 15), Category::Food, 10.0),
            expense(2, date(2024, 5, 1), Category::Food, 5.0),
            expense(3, date(2024, 4, 10), Category::Leisure, 20.0),
        ];
        let future = future_commitments(&records, today);
        assert_eq!(future.detail.len(), 2);
        assert_eq!(future.detail[0].id, 3);
        assert_eq!(future.detail[1].id, 2);
        let keys: Vec<&str> = future.by_month.iter().map(|m| m.month_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-04", "2024-05"]);
    }

    #[test]
    fn future_commitments_empty_when_nothing_lies_ahead() {
        let records = vec![expense(1, date(2024, 1, 1), Category::Food, 10.0)];
        let future = future_commitments(&records, date(2024, 3, 15));
        assert!(future.by_month.is_empty());
        assert!(future.detail.is_empty());
    }
}
