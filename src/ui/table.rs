use tabled::{settings::Style, Table, Tabled};

use crate::migrate::Resolution;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// One line of a batch run summary
#[derive(Tabled)]
pub struct BatchRow {
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Strategy")]
    pub strategy: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Name")]
    pub name: String,
}

impl BatchRow {
    pub fn new(source: &str, res: &Resolution) -> Self {
        Self {
            source: source.to_string(),
            strategy: res.strategy().to_string(),
            target: if res.is_found() { res.code().to_string() } else { "-".to_string() },
            name: res.record().name.clone(),
        }
    }
}

pub fn results_table(rows: &[BatchRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}
