use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const MONTH_FMT: &str = "%Y-%m";

/// Round a monetary value to 2 fraction digits.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Food,
    Housing,
    Transport,
    Leisure,
    Health,
    Education,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Housing,
        Category::Transport,
        Category::Leisure,
        Category::Health,
        Category::Education,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Housing => "Housing",
            Category::Transport => "Transport",
            Category::Leisure => "Leisure",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category `{s}`"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Debit,
    Pix,
    Cash,
    Credit,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Debit,
        PaymentMethod::Pix,
        PaymentMethod::Cash,
        PaymentMethod::Credit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Debit => "Debit",
            PaymentMethod::Pix => "Pix",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Credit => "Credit",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown payment method `{s}`"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseType {
    Fixed,
    Variable,
}

impl ExpenseType {
    pub const ALL: [ExpenseType; 2] = [ExpenseType::Fixed, ExpenseType::Variable];

    pub fn label(self) -> &'static str {
        match self {
            ExpenseType::Fixed => "Fixed",
            ExpenseType::Variable => "Variable",
        }
    }
}

impl fmt::Display for ExpenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExpenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpenseType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown expense type `{s}`"))
    }
}

/// A stored expense row. Immutable once written; removed only by id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub expense_type: ExpenseType,
    pub installment_index: Option<u32>,
    pub installment_total: Option<u32>,
}

/// An expense that has not been assigned an id yet. Storage hands out ids
/// on insert.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub description: String,
    pub category: Category,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub expense_type: ExpenseType,
    pub installment_index: Option<u32>,
    pub installment_total: Option<u32>,
}

impl NewExpense {
    /// Validate the field invariants and normalize the record: trimmed
    /// description, amount rounded to 2 fraction digits, installment fields
    /// only on credit records.
    pub fn validated(
        date: NaiveDate,
        description: &str,
        category: Category,
        amount: f64,
        payment_method: PaymentMethod,
        expense_type: ExpenseType,
        installment_index: Option<u32>,
        installment_total: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        if amount <= 0.0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        let (installment_index, installment_total) = match payment_method {
            PaymentMethod::Credit => (installment_index, installment_total),
            _ => (None, None),
        };
        Ok(NewExpense {
            date,
            description: description.to_string(),
            category,
            amount: round2(amount),
            payment_method,
            expense_type,
            installment_index,
            installment_total,
        })
    }

    pub fn assign_id(self, id: i64) -> Expense {
        Expense {
            id,
            date: self.date,
            description: self.description,
            category: self.category,
            amount: self.amount,
            payment_method: self.payment_method,
            expense_type: self.expense_type,
            installment_index: self.installment_index,
            installment_total: self.installment_total,
        }
    }
}

impl Expense {
    /// Installment position as shown in listings, e.g. `3/12`.
    pub fn installment_label(&self) -> Option<String> {
        match (self.installment_index, self.installment_total) {
            (Some(index), Some(total)) => Some(format!("{index}/{total}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn validated_trims_description_and_rounds_amount() {
        let record = NewExpense::validated(
            date(2024, 3, 10),
            "  groceries  ",
            Category::Food,
            12.345,
            PaymentMethod::Debit,
            ExpenseType::Variable,
            None,
            None,
        )
        .unwrap();
        assert_eq!(record.description, "groceries");
        assert_eq!(record.amount, 12.35);
    }

    #[test]
    fn validated_rejects_blank_description() {
        let err = NewExpense::validated(
            date(2024, 3, 10),
            "   ",
            Category::Food,
            10.0,
            PaymentMethod::Pix,
            ExpenseType::Fixed,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyDescription);
    }

    #[test]
    fn validated_rejects_non_positive_amount() {
        let err = NewExpense::validated(
            date(2024, 3, 10),
            "bus pass",
            Category::Transport,
            0.0,
            PaymentMethod::Cash,
            ExpenseType::Variable,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveAmount);
    }

    #[test]
    fn validated_strips_installment_fields_off_non_credit_records() {
        let record = NewExpense::validated(
            date(2024, 3, 10),
            "gym",
            Category::Health,
            80.0,
            PaymentMethod::Debit,
            ExpenseType::Fixed,
            Some(1),
            Some(3),
        )
        .unwrap();
        assert_eq!(record.installment_index, None);
        assert_eq!(record.installment_total, None);
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.label().parse::<Category>().unwrap(), category);
        }
        for method in PaymentMethod::ALL {
            assert_eq!(method.label().parse::<PaymentMethod>().unwrap(), method);
        }
        for kind in ExpenseType::ALL {
            assert_eq!(kind.label().parse::<ExpenseType>().unwrap(), kind);
        }
        assert!("Groceries".parse::<Category>().is_err());
    }
}
