use std::path::{Path, PathBuf};

use clap::Parser;
use env_logger::{Env, TimestampPrecision};
use sqlite::{AccessMode, Connection, ConnectionConfig};

pub type Result<T> = anyhow::Result<T>;

mod query;

#[derive(Parser, Debug)]
#[clap(name = "sqlquery", about = "Run SQL statements against a SQLite database")]
pub struct Opt {
    /// Database file, an in-memory database is used when omitted
    #[arg(long = "database", short = 'd', env = "SQLQUERY_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long = "readonly")]
    pub read_only: bool,

    /// SQL script that is executed before the statements
    #[arg(long = "script", short = 's')]
    pub script: Option<PathBuf>,

    /// Run everything in a single transaction
    #[arg(long = "transaction", short = 't')]
    pub transaction: bool,

    /// Print the rows as a table with column headers
    #[arg(long = "table")]
    pub table: bool,

    pub statements: Vec<String>,
}

fn run_statements(conn: &Connection, opt: &Opt) -> Result<()> {
    if let Some(script) = &opt.script {
        log::info!("Executing script {}", script.display());
        conn.execute_sql_file(script)?;
    }

    for sql in &opt.statements {
        let output = query::run_query(conn, sql)?;
        if opt.table {
            if !output.columns.is_empty() {
                println!("{}", query::format_table(&output));
            }
        } else {
            print!("{}", query::format_tsv(&output));
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = ConnectionConfig::builder()
        .mode(if opt.read_only { AccessMode::ReadOnly } else { AccessMode::Create })
        .build();
    let db_path = opt.database.as_deref().unwrap_or(Path::new(sqlite::MEMORY_PATH));
    let conn = Connection::with_config(db_path, &config)?;

    if opt.transaction {
        let tx = conn.transaction()?;
        match run_statements(&conn, &opt) {
            Ok(()) => tx.commit()?,
            Err(err) => {
                log::warn!("Rolling back: {err}");
                tx.rollback()?;
                return Err(err);
            }
        }
    } else {
        run_statements(&conn, &opt)?;
    }

    Ok(())
}
