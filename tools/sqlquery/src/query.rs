use comfy_table::Table;
use sqlite::{ColumnType, Connection, ValueRef};

/// Column names and the text of every cell produced by one statement.
#[derive(Debug, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn run_query(conn: &Connection, sql: &str) -> sqlite::Result<QueryOutput> {
    let mut stmt = conn.prepare(sql)?;
    let columns = (0..stmt.column_count())
        .map(|i| stmt.column_name(i).unwrap_or_default())
        .collect();

    let rows = stmt
        .query_map(|row| {
            (0..row.column_count())
                .map(|i| row.get(i).map(cell_text))
                .collect::<sqlite::Result<Vec<String>>>()
        })
        .collect::<sqlite::Result<Vec<_>>>()?;

    log::debug!("{} row(s) returned", rows.len());
    Ok(QueryOutput { columns, rows })
}

fn cell_text(value: ValueRef<'_>) -> String {
    match value.kind() {
        ColumnType::Blob => value.as_blob().iter().map(|b| format!("{b:02x}")).collect(),
        _ => value.as_text(),
    }
}

/// Tab separated rows, one line per row.
pub fn format_tsv(output: &QueryOutput) -> String {
    output.rows.iter().map(|row| format!("{}\n", row.join("\t"))).collect()
}

pub fn format_table(output: &QueryOutput) -> String {
    let mut table = Table::new();
    table.set_header(output.columns.clone());
    for row in &output.rows {
        table.add_row(row.clone());
    }

    table.to_string()
}
