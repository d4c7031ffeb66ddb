use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;

use crate::backup::backup_data_file;
use crate::config::AppConfig;
use crate::installments::{ExistingPurchase, FreshPurchase, existing_purchase, fresh_purchase};
use crate::models::{Expense, PaymentMethod};
use crate::storage::{ExpenseStore, open_store};
use crate::summary::{
    category_breakdown, future_commitments, month_detail, monthly_summary,
};

#[derive(Parser, Debug)]
#[command(name = "expense-tracker")]
#[command(about = "Local-first expense tracker (Rust)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register an expense; credit purchases can be split into installments
    Add {
        description: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "debit")]
        payment: String,
        #[arg(long = "kind", default_value = "variable")]
        expense_type: String,
        #[arg(long, default_value_t = 1)]
        installments: u32,
        #[arg(long)]
        date: Option<String>,
    },
    /// Register the remaining installments of a past credit purchase
    Installments {
        description: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        total: u32,
        #[arg(long)]
        current: u32,
        #[arg(long)]
        next_due: String,
    },
    /// List every stored expense
    List,
    /// Monthly totals, or one month's breakdown with --month
    Summary {
        #[arg(long)]
        month: Option<String>,
    },
    /// Future commitments grouped by month
    Upcoming,
    /// Remove one expense by id
    Delete { id: i64 },
    Settings(SettingsCmd),
}

#[derive(Parser, Debug)]
pub struct SettingsCmd {
    #[command(subcommand)]
    pub cmd: SettingsSub,
}

#[derive(Subcommand, Debug)]
pub enum SettingsSub {
    Show,
}

pub fn run(command: Commands, cfg: &AppConfig) -> Result<()> {
    let mut store = open_store(&cfg.settings.storage)?;
    match command {
        Commands::Add {
            description,
            category,
            amount,
            payment,
            expense_type,
            installments,
            date,
        } => handle_add(
            store.as_mut(),
            cfg,
            &description,
            &category,
            amount,
            &payment,
            &expense_type,
            installments,
            date,
        ),
        Commands::Installments {
            description,
            category,
            amount,
            total,
            current,
            next_due,
        } => handle_installments(
            store.as_mut(),
            cfg,
            &description,
            &category,
            amount,
            total,
            current,
            &next_due,
        ),
        Commands::List => handle_list(store.as_ref(), cfg),
        Commands::Summary { month } => handle_summary(store.as_ref(), cfg, month),
        Commands::Upcoming => handle_upcoming(store.as_ref(), cfg),
        Commands::Delete { id } => handle_delete(store.as_mut(), cfg, id),
        Commands::Settings(settings_cmd) => handle_settings(settings_cmd, cfg),
    }
}

fn handle_add(
    store: &mut dyn ExpenseStore,
    cfg: &AppConfig,
    description: &str,
    category: &str,
    amount: f64,
    payment: &str,
    expense_type: &str,
    installments: u32,
    date: Option<String>,
) -> Result<()> {
    let purchase = FreshPurchase {
        purchase_date: parse_date_opt(date, &cfg.settings.ui.date_format)?,
        description: description.to_string(),
        category: parse_enum(category)?,
        total_amount: amount,
        payment_method: parse_enum(payment)?,
        expense_type: parse_enum(expense_type)?,
        installments,
    };
    let records = fresh_purchase(&purchase)?;
    backup_data_file(
        cfg.settings.data_path(),
        &cfg.settings.storage.backup_dir,
        &cfg.settings.backup,
    )?;
    store.insert(&records)?;
    if records.len() == 1 {
        println!("Expense recorded.");
    } else {
        println!("Expense recorded as {} installments.", records.len());
    }
    Ok(())
}

fn handle_installments(
    store: &mut dyn ExpenseStore,
    cfg: &AppConfig,
    description: &str,
    category: &str,
    amount: f64,
    total: u32,
    current: u32,
    next_due: &str,
) -> Result<()> {
    let purchase = ExistingPurchase {
        description: description.to_string(),
        category: parse_enum(category)?,
        total_amount: amount,
        total_installments: total,
        current_installment: current,
        next_due_date: parse_date(next_due, &cfg.settings.ui.date_format)?,
    };
    let records = existing_purchase(&purchase)?;
    backup_data_file(
        cfg.settings.data_path(),
        &cfg.settings.storage.backup_dir,
        &cfg.settings.backup,
    )?;
    store.insert(&records)?;
    println!(
        "Registered installments {}..{} of {}.",
        current,
        total,
        description
    );
    Ok(())
}

fn handle_list(store: &dyn ExpenseStore, cfg: &AppConfig) -> Result<()> {
    let mut records = store.load_all()?;
    if records.is_empty() {
        println!("No expenses recorded.");
        return Ok(());
    }
    records.sort_by_key(|r| r.date);
    for record in &records {
        print_row(record, cfg);
    }
    Ok(())
}

fn handle_summary(store: &dyn ExpenseStore, cfg: &AppConfig, month: Option<String>) -> Result<()> {
    let records = store.load_all()?;
    if records.is_empty() {
        println!("No expenses recorded.");
        return Ok(());
    }
    let symbol = &cfg.settings.ui.currency_symbol;
    match month {
        Some(selected) => {
            let detail = month_detail(&records, &selected);
            if detail.is_empty() {
                println!("No expenses in {selected}.");
                return Ok(());
            }
            let total: f64 = detail.iter().map(|r| r.amount).sum();
            println!(
                "{selected}: {} across {} entries",
                format!("{symbol} {total:.2}").green(),
                detail.len()
            );
            println!();
            println!("By category:");
            for entry in category_breakdown(&detail) {
                println!("  {:<10} {symbol} {:.2}", entry.category, entry.total_amount);
            }
            println!();
            for record in &detail {
                print_row(record, cfg);
            }
        }
        None => {
            for bucket in monthly_summary(&records) {
                println!(
                    "{} | {} | {} entries",
                    bucket.month_key,
                    format!("{symbol} {:.2}", bucket.total_amount).green(),
                    bucket.record_count
                );
            }
        }
    }
    Ok(())
}

fn handle_upcoming(store: &dyn ExpenseStore, cfg: &AppConfig) -> Result<()> {
    let records = store.load_all()?;
    let future = future_commitments(&records, Local::now().date_naive());
    if future.detail.is_empty() {
        println!("No future commitments.");
        return Ok(());
    }
    let symbol = &cfg.settings.ui.currency_symbol;
    for bucket in &future.by_month {
        println!(
            "{} | {}",
            bucket.month_key,
            format!("{symbol} {:.2}", bucket.total_amount).yellow()
        );
    }
    println!();
    for record in &future.detail {
        print_row(record, cfg);
    }
    Ok(())
}

fn handle_delete(store: &mut dyn ExpenseStore, cfg: &AppConfig, id: i64) -> Result<()> {
    let exists = store.load_all()?.iter().any(|r| r.id == id);
    if !exists {
        println!("No expense with id {id}.");
        return Ok(());
    }
    backup_data_file(
        cfg.settings.data_path(),
        &cfg.settings.storage.backup_dir,
        &cfg.settings.backup,
    )?;
    store.delete(id)?;
    println!("Expense deleted.");
    Ok(())
}

fn handle_settings(settings_cmd: SettingsCmd, cfg: &AppConfig) -> Result<()> {
    match settings_cmd.cmd {
        SettingsSub::Show => {
            println!("Config directory: {}", cfg.base_dir.display());
            println!("Backend: {:?}", cfg.settings.storage.backend);
            println!("Data file: {}", cfg.settings.data_path().display());
            println!("Backup dir: {}", cfg.settings.storage.backup_dir.display());
        }
    }
    Ok(())
}

fn print_row(record: &Expense, cfg: &AppConfig) {
    let symbol = &cfg.settings.ui.currency_symbol;
    let installment = record
        .installment_label()
        .map(|label| format!(" [{label}]"))
        .unwrap_or_default();
    let amount = format!("{symbol} {:.2}", record.amount);
    let amount = if record.payment_method == PaymentMethod::Credit {
        amount.yellow().to_string()
    } else {
        amount.normal().to_string()
    };
    println!(
        "#{} | {} | {} | {} | {} | {}{}",
        record.id,
        record.date.format(&cfg.settings.ui.date_format),
        record.description,
        record.category,
        amount,
        record.payment_method,
        installment
    );
}

fn parse_date(input: &str, fmt: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, fmt)
        .with_context(|| format!("Failed to parse date {input} with format {fmt}"))
}

fn parse_date_opt(input: Option<String>, fmt: &str) -> Result<NaiveDate> {
    match input {
        Some(s) => parse_date(&s, fmt),
        None => Ok(Local::now().date_naive()),
    }
}

fn parse_enum<T>(input: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    input.parse().map_err(|e: String| anyhow!(e))
}
