use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_issuer_tables",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS company_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS issuer_id_seq START 1;
CREATE SEQUENCE IF NOT EXISTS stock_history_id_seq START 1;

CREATE TABLE IF NOT EXISTS company (
    id BIGINT PRIMARY KEY DEFAULT nextval('company_id_seq'),
    code VARCHAR NOT NULL UNIQUE,
    name VARCHAR NOT NULL,
    address VARCHAR,
    city VARCHAR,
    state VARCHAR,
    email VARCHAR,
    phones VARCHAR[]
);

CREATE TABLE IF NOT EXISTS issuer (
    id BIGINT PRIMARY KEY DEFAULT nextval('issuer_id_seq'),
    code VARCHAR NOT NULL UNIQUE,
    company_id BIGINT REFERENCES company(id)
);

CREATE TABLE IF NOT EXISTS stock_history (
    id BIGINT PRIMARY KEY DEFAULT nextval('stock_history_id_seq'),
    issuer_id BIGINT NOT NULL REFERENCES issuer(id),
    date DATE NOT NULL,
    last_trade_price VARCHAR NOT NULL,
    max_price VARCHAR NOT NULL,
    min_price VARCHAR NOT NULL,
    avg_price VARCHAR NOT NULL,
    percent_change VARCHAR NOT NULL,
    volume VARCHAR NOT NULL,
    turnover_best VARCHAR NOT NULL,
    total_turnover VARCHAR NOT NULL,
    UNIQUE (issuer_id, date)
);
"#,
    },
    Migration {
        version: "0002_sync_log",
        sql: r#"
CREATE TABLE IF NOT EXISTS sync_log (
    run_id VARCHAR NOT NULL,
    issuer_code VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    history_inserted BIGINT NOT NULL,
    gap_inserted BIGINT NOT NULL,
    latency_ms BIGINT,
    error VARCHAR,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_sync_log_run ON sync_log(run_id);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
