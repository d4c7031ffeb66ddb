use chrono::{Local, NaiveDate};
use eframe::egui::{self, Grid, ProgressBar, ScrollArea, TextEdit};
use eframe::{App, Frame, NativeOptions};
use rfd::FileDialog;

use crate::backup::backup_data_file;
use crate::config::AppConfig;
use crate::installments::{ExistingPurchase, FreshPurchase, existing_purchase, fresh_purchase};
use crate::models::{Category, DATE_FMT, Expense, ExpenseType, NewExpense, PaymentMethod};
use crate::storage::{ExpenseStore, export_csv, open_store};
use crate::summary::{
    category_breakdown, future_commitments, month_detail, month_keys_desc,
};

pub fn run_app(cfg: AppConfig) -> anyhow::Result<()> {
    let dark = cfg.settings.ui.theme == "dark";
    let app = TrackerApp::new(cfg)?;
    let native_options = NativeOptions::default();
    let result = eframe::run_native(
        "Expense Tracker",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(if dark {
                egui::Visuals::dark()
            } else {
                egui::Visuals::light()
            });
            Ok(Box::new(app))
        }),
    );
    if let Err(err) = result {
        return Err(anyhow::anyhow!(err.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Register,
    ExistingInstallments,
    MonthlySummary,
    FutureCommitments,
}

struct TrackerApp {
    cfg: AppConfig,
    store: Box<dyn ExpenseStore>,
    records: Vec<Expense>,
    screen: Screen,
    register_form: RegisterForm,
    existing_form: ExistingForm,
    selected_month: String,
    log: String,
}

impl TrackerApp {
    fn new(cfg: AppConfig) -> anyhow::Result<Self> {
        let store = open_store(&cfg.settings.storage)?;
        let records = store.load_all()?;
        let register_form = RegisterForm::new(&cfg.settings.ui.date_format);
        let existing_form = ExistingForm::new(&cfg.settings.ui.date_format);
        Ok(Self {
            cfg,
            store,
            records,
            screen: Screen::Register,
            register_form,
            existing_form,
            selected_month: String::new(),
            log: String::new(),
        })
    }

    fn add_log<S: AsRef<str>>(&mut self, msg: S) {
        self.log.push_str(msg.as_ref());
        self.log.push('\n');
    }

    /// Back up the data file, insert the batch, reload the table.
    fn persist(&mut self, records: &[NewExpense]) -> anyhow::Result<()> {
        backup_data_file(
            self.cfg.settings.data_path(),
            &self.cfg.settings.storage.backup_dir,
            &self.cfg.settings.backup,
        )?;
        self.store.insert(records)?;
        self.records = self.store.load_all()?;
        Ok(())
    }

    fn delete_expense(&mut self, id: i64) {
        let outcome = backup_data_file(
            self.cfg.settings.data_path(),
            &self.cfg.settings.storage.backup_dir,
            &self.cfg.settings.backup,
        )
        .and_then(|_| {
            self.store.delete(id)?;
            self.records = self.store.load_all()?;
            Ok(())
        });
        match outcome {
            Ok(()) => self.add_log(format!("Deleted expense #{id}")),
            Err(err) => self.add_log(format!("Delete failed: {err}")),
        }
    }

    fn submit_register(&mut self) {
        let outcome = self
            .register_form
            .to_purchase(&self.cfg.settings.ui.date_format)
            .and_then(|purchase| fresh_purchase(&purchase).map_err(|e| e.to_string()));
        match outcome {
            Ok(records) => match self.persist(&records) {
                Ok(()) => {
                    if records.len() == 1 {
                        self.add_log("Expense recorded");
                    } else {
                        self.add_log(format!("Expense recorded as {} installments", records.len()));
                    }
                    self.register_form = RegisterForm::new(&self.cfg.settings.ui.date_format);
                }
                Err(err) => self.add_log(format!("Save failed: {err}")),
            },
            Err(msg) => self.add_log(format!("Rejected: {msg}")),
        }
    }

    fn submit_existing(&mut self) {
        let outcome = self
            .existing_form
            .to_purchase(&self.cfg.settings.ui.date_format)
            .and_then(|purchase| existing_purchase(&purchase).map_err(|e| e.to_string()));
        match outcome {
            Ok(records) => match self.persist(&records) {
                Ok(()) => {
                    self.add_log(format!("Registered {} future installments", records.len()));
                    self.existing_form = ExistingForm::new(&self.cfg.settings.ui.date_format);
                }
                Err(err) => self.add_log(format!("Save failed: {err}")),
            },
            Err(msg) => self.add_log(format!("Rejected: {msg}")),
        }
    }

    fn export_records(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name("expenses.csv")
            .save_file()
        else {
            return;
        };
        match export_csv(&path, &self.records) {
            Ok(()) => self.add_log(format!("Exported to {}", path.display())),
            Err(err) => self.add_log(format!("Export failed: {err}")),
        }
    }

    fn register_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Register Expense");
        let mut submitted = false;
        {
            let form = &mut self.register_form;
            Grid::new("register_form").num_columns(2).show(ui, |ui| {
                ui.label("Date");
                ui.text_edit_singleline(&mut form.date_text);
                ui.end_row();
                ui.label("Description");
                ui.text_edit_singleline(&mut form.description);
                ui.end_row();
                ui.label("Category");
                category_combo(ui, "register_category", &mut form.category);
                ui.end_row();
                ui.label("Total amount");
                ui.text_edit_singleline(&mut form.amount_text);
                ui.end_row();
                ui.label("Payment method");
                egui::ComboBox::from_id_source("register_payment")
                    .selected_text(form.payment.label())
                    .show_ui(ui, |ui| {
                        for method in PaymentMethod::ALL {
                            ui.selectable_value(&mut form.payment, method, method.label());
                        }
                    });
                ui.end_row();
                ui.label("Type");
                egui::ComboBox::from_id_source("register_type")
                    .selected_text(form.expense_type.label())
                    .show_ui(ui, |ui| {
                        for kind in ExpenseType::ALL {
                            ui.selectable_value(&mut form.expense_type, kind, kind.label());
                        }
                    });
                ui.end_row();
                if form.payment == PaymentMethod::Credit {
                    ui.label("Installments");
                    ui.text_edit_singleline(&mut form.installments_text);
                    ui.end_row();
                }
            });
            if ui.button("Save expense").clicked() {
                submitted = true;
            }
        }
        if submitted {
            self.submit_register();
        }
    }

    fn existing_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Existing Installments");
        ui.label("Register a past credit purchase whose installments still hit future statements.");
        let mut submitted = false;
        {
            let form = &mut self.existing_form;
            Grid::new("existing_form").num_columns(2).show(ui, |ui| {
                ui.label("Description");
                ui.text_edit_singleline(&mut form.description);
                ui.end_row();
                ui.label("Category");
                category_combo(ui, "existing_category", &mut form.category);
                ui.end_row();
                ui.label("Total amount");
                ui.text_edit_singleline(&mut form.amount_text);
                ui.end_row();
                ui.label("Total installments");
                ui.text_edit_singleline(&mut form.total_text);
                ui.end_row();
                ui.label("Current installment");
                ui.text_edit_singleline(&mut form.current_text);
                ui.end_row();
                ui.label("Next statement date");
                ui.text_edit_singleline(&mut form.next_due_text);
                ui.end_row();
            });
            if ui.button("Register future installments").clicked() {
                submitted = true;
            }
        }
        if submitted {
            self.submit_existing();
        }
    }

    fn monthly_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Monthly Summary");
        if self.records.is_empty() {
            ui.label("No expenses recorded.");
            return;
        }
        let months = month_keys_desc(&self.records);
        if !months.contains(&self.selected_month) {
            self.selected_month = months[0].clone();
        }
        egui::ComboBox::from_label("Month")
            .selected_text(self.selected_month.clone())
            .show_ui(ui, |ui| {
                for month in &months {
                    ui.selectable_value(&mut self.selected_month, month.clone(), month.as_str());
                }
            });

        let detail = month_detail(&self.records, &self.selected_month);
        let symbol = self.cfg.settings.ui.currency_symbol.clone();
        let total: f64 = detail.iter().map(|r| r.amount).sum();
        ui.label(format!(
            "Total: {symbol} {total:.2} across {} entries",
            detail.len()
        ));

        ui.separator();
        ui.label("By category");
        let breakdown = category_breakdown(&detail);
        let max = breakdown.first().map(|t| t.total_amount).unwrap_or(0.0);
        for entry in &breakdown {
            let fraction = if max > 0.0 {
                (entry.total_amount / max) as f32
            } else {
                0.0
            };
            ui.add(ProgressBar::new(fraction).text(format!(
                "{}: {symbol} {:.2}",
                entry.category, entry.total_amount
            )));
        }

        ui.separator();
        let mut pending_delete: Option<i64> = None;
        ScrollArea::vertical().show(ui, |ui| {
            Grid::new("month_detail").striped(true).show(ui, |ui| {
                expense_header(ui);
                ui.end_row();
                for record in &detail {
                    expense_row(ui, record, &symbol);
                    if ui.small_button("✕").clicked() {
                        pending_delete = Some(record.id);
                    }
                    ui.end_row();
                }
            });
        });
        if let Some(id) = pending_delete {
            self.delete_expense(id);
        }
    }

    fn future_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("Future Commitments");
        let future = future_commitments(&self.records, Local::now().date_naive());
        if future.detail.is_empty() {
            ui.label("No future commitments.");
            return;
        }
        let symbol = self.cfg.settings.ui.currency_symbol.clone();
        let max = future
            .by_month
            .iter()
            .map(|m| m.total_amount)
            .fold(0.0_f64, f64::max);
        for bucket in &future.by_month {
            let fraction = if max > 0.0 {
                (bucket.total_amount / max) as f32
            } else {
                0.0
            };
            ui.add(ProgressBar::new(fraction).text(format!(
                "{}: {symbol} {:.2}",
                bucket.month_key, bucket.total_amount
            )));
        }

        ui.separator();
        ScrollArea::vertical().show(ui, |ui| {
            Grid::new("future_detail").striped(true).show(ui, |ui| {
                expense_header(ui);
                ui.end_row();
                for record in &future.detail {
                    expense_row(ui, record, &symbol);
                    ui.end_row();
                }
            });
        });
    }
}

impl App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.heading("Expense Tracker");
        });

        egui::SidePanel::left("side").show(ctx, |ui| {
            ui.vertical(|ui| {
                let entries = [
                    (Screen::Register, "Register Expense"),
                    (Screen::ExistingInstallments, "Existing Installments"),
                    (Screen::MonthlySummary, "Monthly Summary"),
                    (Screen::FutureCommitments, "Future Commitments"),
                ];
                for (screen, label) in entries {
                    if ui
                        .selectable_label(self.screen == screen, label)
                        .clicked()
                    {
                        self.screen = screen;
                    }
                }
                ui.separator();
                if ui.button("Export CSV…").clicked() {
                    self.export_records();
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.screen {
                Screen::Register => self.register_screen(ui),
                Screen::ExistingInstallments => self.existing_screen(ui),
                Screen::MonthlySummary => self.monthly_screen(ui),
                Screen::FutureCommitments => self.future_screen(ui),
            }

            ui.separator();
            ui.heading("Logs");
            ui.add(
                TextEdit::multiline(&mut self.log)
                    .code_editor()
                    .desired_rows(4),
            );
        });
    }
}

fn category_combo(ui: &mut egui::Ui, id: &str, selected: &mut Category) {
    egui::ComboBox::from_id_source(id)
        .selected_text(selected.label())
        .show_ui(ui, |ui| {
            for category in Category::ALL {
                ui.selectable_value(selected, category, category.label());
            }
        });
}

fn expense_header(ui: &mut egui::Ui) {
    ui.heading("Date");
    ui.heading("Description");
    ui.heading("Category");
    ui.heading("Amount");
    ui.heading("Payment");
    ui.heading("Installment");
}

fn expense_row(ui: &mut egui::Ui, record: &Expense, symbol: &str) {
    ui.label(record.date.format(DATE_FMT).to_string());
    ui.label(&record.description);
    ui.label(record.category.label());
    ui.label(format!("{symbol} {:.2}", record.amount));
    ui.label(record.payment_method.label());
    ui.label(record.installment_label().unwrap_or_default());
}

struct RegisterForm {
    date_text: String,
    description: String,
    category: Category,
    amount_text: String,
    payment: PaymentMethod,
    expense_type: ExpenseType,
    installments_text: String,
}

impl RegisterForm {
    fn new(date_fmt: &str) -> Self {
        Self {
            date_text: Local::now().date_naive().format(date_fmt).to_string(),
            description: String::new(),
            category: Category::Food,
            amount_text: String::new(),
            payment: PaymentMethod::Debit,
            expense_type: ExpenseType::Variable,
            installments_text: "1".into(),
        }
    }

    fn to_purchase(&self, date_fmt: &str) -> Result<FreshPurchase, String> {
        let purchase_date = parse_form_date(&self.date_text, date_fmt)?;
        let total_amount = parse_form_amount(&self.amount_text)?;
        let installments = if self.payment == PaymentMethod::Credit {
            self.installments_text
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("Invalid installment count `{}`", self.installments_text))?
        } else {
            1
        };
        Ok(FreshPurchase {
            purchase_date,
            description: self.description.clone(),
            category: self.category,
            total_amount,
            payment_method: self.payment,
            expense_type: self.expense_type,
            installments,
        })
    }
}

struct ExistingForm {
    description: String,
    category: Category,
    amount_text: String,
    total_text: String,
    current_text: String,
    next_due_text: String,
}

impl ExistingForm {
    fn new(date_fmt: &str) -> Self {
        Self {
            description: String::new(),
            category: Category::Food,
            amount_text: String::new(),
            total_text: String::new(),
            current_text: String::new(),
            next_due_text: Local::now().date_naive().format(date_fmt).to_string(),
        }
    }

    fn to_purchase(&self, date_fmt: &str) -> Result<ExistingPurchase, String> {
        let next_due_date = parse_form_date(&self.next_due_text, date_fmt)?;
        let total_amount = parse_form_amount(&self.amount_text)?;
        let total_installments = self
            .total_text
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid installment total `{}`", self.total_text))?;
        let current_installment = self
            .current_text
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid current installment `{}`", self.current_text))?;
        Ok(ExistingPurchase {
            description: self.description.clone(),
            category: self.category,
            total_amount,
            total_installments,
            current_installment,
            next_due_date,
        })
    }
}

fn parse_form_date(text: &str, fmt: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text.trim(), fmt).map_err(|_| format!("Invalid date `{text}`"))
}

fn parse_form_amount(text: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid amount `{text}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_form_parses_into_a_purchase() {
        let mut form = RegisterForm::new("%Y-%m-%d");
        form.date_text = "2024-05-02".into();
        form.description = "groceries".into();
        form.amount_text = "120.50".into();
        form.payment = PaymentMethod::Credit;
        form.installments_text = "3".into();
        let purchase = form.to_purchase("%Y-%m-%d").unwrap();
        assert_eq!(
            purchase.purchase_date,
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
        assert_eq!(purchase.installments, 3);
        assert_eq!(purchase.total_amount, 120.5);
    }

    #[test]
    fn register_form_ignores_installment_text_for_non_credit() {
        let mut form = RegisterForm::new("%Y-%m-%d");
        form.date_text = "2024-05-02".into();
        form.description = "groceries".into();
        form.amount_text = "80".into();
        form.installments_text = "not a number".into();
        let purchase = form.to_purchase("%Y-%m-%d").unwrap();
        assert_eq!(purchase.installments, 1);
    }

    #[test]
    fn existing_form_reports_bad_numbers() {
        let mut form = ExistingForm::new("%Y-%m-%d");
        form.description = "phone".into();
        form.amount_text = "2000".into();
        form.total_text = "ten".into();
        form.current_text = "4".into();
        let err = form.to_purchase("%Y-%m-%d").unwrap_err();
        assert!(err.contains("Invalid installment total"));
    }
}
