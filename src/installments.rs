use chrono::{Months, NaiveDate};

use crate::error::ValidationError;
use crate::models::{Category, ExpenseType, NewExpense, PaymentMethod, round2};

/// A purchase entered on the day it was made.
#[derive(Debug, Clone)]
pub struct FreshPurchase {
    pub purchase_date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub expense_type: ExpenseType,
    pub installments: u32,
}

/// A credit purchase made in the past whose remaining installments still hit
/// future statements.
#[derive(Debug, Clone)]
pub struct ExistingPurchase {
    pub description: String,
    pub category: Category,
    pub total_amount: f64,
    pub total_installments: u32,
    pub current_installment: u32,
    pub next_due_date: NaiveDate,
}

/// Expand a fresh purchase into its stored records.
///
/// Credit purchases produce one record per installment, dated one calendar
/// month apart starting at the purchase date, each carrying its 1-based
/// position. Any other payment method produces a single record with no
/// installment fields, whatever installment count was requested.
///
/// Each installment amount is `total / n` rounded to 2 digits on its own;
/// the rounded installments may not sum back to the total and the residual
/// is deliberately not redistributed.
pub fn fresh_purchase(purchase: &FreshPurchase) -> Result<Vec<NewExpense>, ValidationError> {
    let (count, per_amount, with_index) = match purchase.payment_method {
        PaymentMethod::Credit => {
            if purchase.installments == 0 {
                return Err(ValidationError::ZeroInstallments);
            }
            let per = purchase.total_amount / f64::from(purchase.installments);
            (purchase.installments, per, true)
        }
        _ => (1, purchase.total_amount, false),
    };

    let mut records = Vec::with_capacity(count as usize);
    for i in 0..count {
        records.push(NewExpense::validated(
            add_months(purchase.purchase_date, i)?,
            &purchase.description,
            purchase.category,
            round2(per_amount),
            purchase.payment_method,
            purchase.expense_type,
            with_index.then_some(i + 1),
            with_index.then_some(count),
        )?);
    }
    Ok(records)
}

/// Expand a partially-paid credit purchase into its remaining records.
///
/// Only installments `current..=total` are generated, dated monthly from the
/// next statement date. The payment method is always Credit and the expense
/// type always Variable for records entered this way, and the per-installment
/// amount is the original total split over the full installment count.
pub fn existing_purchase(purchase: &ExistingPurchase) -> Result<Vec<NewExpense>, ValidationError> {
    if purchase.total_installments == 0 || purchase.current_installment == 0 {
        return Err(ValidationError::ZeroInstallments);
    }
    if purchase.current_installment > purchase.total_installments {
        return Err(ValidationError::CurrentInstallmentPastTotal {
            current: purchase.current_installment,
            total: purchase.total_installments,
        });
    }

    let remaining = purchase.total_installments - purchase.current_installment + 1;
    let per_amount = round2(purchase.total_amount / f64::from(purchase.total_installments));

    let mut records = Vec::with_capacity(remaining as usize);
    for i in 0..remaining {
        records.push(NewExpense::validated(
            add_months(purchase.next_due_date, i)?,
            &purchase.description,
            purchase.category,
            per_amount,
            PaymentMethod::Credit,
            ExpenseType::Variable,
            Some(purchase.current_installment + i),
            Some(purchase.total_installments),
        )?);
    }
    Ok(records)
}

/// Calendar-month addition, clamping the day to the end of the target month
/// when the original day does not exist there.
fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, ValidationError> {
    date.checked_add_months(Months::new(months))
        .ok_or(ValidationError::DateOutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fresh(method: PaymentMethod, installments: u32) -> FreshPurchase {
        FreshPurchase {
            purchase_date: date(2024, 1, 15),
            description: "new couch".into(),
            category: Category::Housing,
            total_amount: 1200.0,
            payment_method: method,
            expense_type: ExpenseType::Variable,
            installments,
        }
    }

    #[test]
    fn credit_purchase_spreads_installments_monthly() {
        let records = fresh_purchase(&fresh(PaymentMethod::Credit, 4)).unwrap();
        assert_eq!(records.len(), 4);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.date, date(2024, 1 + i as u32, 15));
            assert_eq!(record.amount, 300.0);
            assert_eq!(record.installment_index, Some(i as u32 + 1));
            assert_eq!(record.installment_total, Some(4));
        }
    }

    #[test]
    fn non_credit_purchase_is_a_single_record() {
        for method in [PaymentMethod::Debit, PaymentMethod::Pix, PaymentMethod::Cash] {
            let records = fresh_purchase(&fresh(method, 6)).unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].date, date(2024, 1, 15));
            assert_eq!(records[0].amount, 1200.0);
            assert_eq!(records[0].installment_index, None);
            assert_eq!(records[0].installment_total, None);
        }
    }

    #[test]
    fn credit_purchase_requires_at_least_one_installment() {
        let err = fresh_purchase(&fresh(PaymentMethod::Credit, 0)).unwrap_err();
        assert_eq!(err, ValidationError::ZeroInstallments);
    }

    #[test]
    fn installment_amounts_round_independently() {
        let mut purchase = fresh(PaymentMethod::Credit, 3);
        purchase.total_amount = 100.0;
        let records = fresh_purchase(&purchase).unwrap();
        let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![33.33, 33.33, 33.33]);
        // 0.01 short of the original total; the residual stays unallocated.
        assert!((amounts.iter().sum::<f64>() - 99.99).abs() < 1e-9);
    }

    #[test]
    fn month_end_dates_clamp_forward() {
        let mut purchase = fresh(PaymentMethod::Credit, 3);
        purchase.purchase_date = date(2024, 1, 31);
        let records = fresh_purchase(&purchase).unwrap();
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]);
    }

    #[test]
    fn existing_purchase_generates_only_remaining_installments() {
        let purchase = ExistingPurchase {
            description: "phone".into(),
            category: Category::Other,
            total_amount: 2000.0,
            total_installments: 10,
            current_installment: 4,
            next_due_date: date(2024, 6, 5),
        };
        let records = existing_purchase(&purchase).unwrap();
        assert_eq!(records.len(), 7);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.date, date(2024, 6 + i as u32, 5));
            assert_eq!(record.amount, 200.0);
            assert_eq!(record.installment_index, Some(4 + i as u32));
            assert_eq!(record.installment_total, Some(10));
            assert_eq!(record.payment_method, PaymentMethod::Credit);
            assert_eq!(record.expense_type, ExpenseType::Variable);
        }
    }

    #[test]
    fn existing_purchase_rejects_current_past_total() {
        let purchase = ExistingPurchase {
            description: "phone".into(),
            category: Category::Other,
            total_amount: 2000.0,
            total_installments: 3,
            current_installment: 5,
            next_due_date: date(2024, 6, 5),
        };
        let err = existing_purchase(&purchase).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CurrentInstallmentPastTotal { current: 5, total: 3 }
        );
    }

    #[test]
    fn empty_description_rejected_before_any_record_is_built() {
        let mut purchase = fresh(PaymentMethod::Credit, 2);
        purchase.description = "  ".into();
        assert_eq!(
            fresh_purchase(&purchase).unwrap_err(),
            ValidationError::EmptyDescription
        );
    }
}
