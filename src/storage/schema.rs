//! Database schema definitions

/// SQL to create the records table
///
/// `id` gives every store a stable insertion order for iteration.
pub const CREATE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    store TEXT NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    location TEXT,
    unit TEXT,
    reference_product TEXT,
    categories TEXT,
    auto_generated INTEGER NOT NULL DEFAULT 0,
    UNIQUE(project, store, code)
)
"#;

/// SQL to create the exchanges table
/// Keys are stored in their `lca://` string form
pub const CREATE_EXCHANGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    output_key TEXT NOT NULL,
    input_key TEXT NOT NULL,
    amount REAL NOT NULL,
    unit TEXT,
    kind TEXT NOT NULL,
    uncertainty_type INTEGER,
    loc REAL,
    scale REAL,
    negative INTEGER,
    minimum REAL,
    maximum REAL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_records_store ON records(project, store)",
    "CREATE INDEX IF NOT EXISTS idx_records_name ON records(name)",
    "CREATE INDEX IF NOT EXISTS idx_exchanges_output ON exchanges(output_key)",
    "CREATE INDEX IF NOT EXISTS idx_exchanges_input ON exchanges(input_key)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_RECORDS_TABLE, CREATE_EXCHANGES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
