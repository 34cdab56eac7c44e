//! Migration scripts.
//!
//! A migration is rendered as one SQL file: the CREATE TABLE statements, then
//! the indexes, then a commented-out rollback block. Next to it a JSON
//! manifest records the table definitions the script was rendered from.

use chrono::{DateTime, Utc};
use relorm_core::{Dialect, Index, Migration, Result, Table};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Render the script for `migration`.
pub fn render_migration(migration: &Migration, dialect: &dyn Dialect) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- Migration: {}", migration.name);
    let _ = writeln!(out, "-- Created at: {}", migration.timestamp);

    for table in &migration.tables {
        let _ = writeln!(out);
        let _ = writeln!(out, "{};", dialect.create_table_sql(table));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "-- Create indexes");
    for order in &migration.index_order {
        let index = Index {
            name: order.name.clone(),
            columns: order.columns.clone(),
            unique: order.unique,
        };
        let _ = writeln!(out, "{};", dialect.create_index_sql(&order.table, &index));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "-- Rollback SQL");
    let _ = writeln!(out, "/*");
    for table in &migration.drop_order {
        let _ = writeln!(out, "{};", dialect.drop_table_sql(table));
    }
    if !migration.index_order.is_empty() {
        let _ = writeln!(out);
    }
    for order in &migration.index_order {
        let _ = writeln!(out, "{};", dialect.drop_index_sql(&order.table, &order.name));
    }
    let _ = writeln!(out, "*/");
    out
}

/// Writes timestamped migration files into a directory.
#[derive(Debug, Clone, Copy)]
pub struct MigrationWriter<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> MigrationWriter<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Write `<YYYYmmddHHMMSS>_<name>.sql` (and its `.json` manifest) into
    /// `dir`, creating the directory if needed. Returns the script path.
    #[allow(clippy::result_large_err)]
    pub fn write(
        &self,
        dir: impl AsRef<Path>,
        name: &str,
        tables: &[Table],
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let stem = format!("{}_{}", now.format("%Y%m%d%H%M%S"), name);
        let file_name = format!("{}.sql", stem);
        let migration = Migration::from_tables(
            file_name.clone(),
            now.format("%Y-%m-%d %H:%M:%S").to_string(),
            tables.to_vec(),
        );

        let path = dir.join(&file_name);
        fs::write(&path, render_migration(&migration, self.dialect))?;
        fs::write(
            dir.join(format!("{}.json", stem)),
            serde_json::to_string_pretty(&migration)?,
        )?;
        tracing::info!(path = %path.display(), tables = tables.len(), "migration written");
        Ok(path)
    }
}

/// Load the manifest written alongside a migration script.
#[allow(clippy::result_large_err)]
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Migration> {
    let text = fs::read_to_string(path.as_ref().with_extension("json"))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use relorm_core::{Column, ForeignKey, Sqlite};

    fn tables() -> Vec<Table> {
        let users = Table {
            name: "users".into(),
            columns: vec![
                Column::new("id", "bigint").option("PRIMARY KEY"),
                Column::new("email", "varchar(255)").option("NOT NULL"),
            ],
            indexes: vec![Index {
                name: "idx_email".into(),
                columns: vec!["email".into()],
                unique: true,
            }],
            foreign_keys: Vec::new(),
        };
        let posts = Table {
            name: "posts".into(),
            columns: vec![
                Column::new("id", "bigint").option("PRIMARY KEY"),
                Column::new("user_id", "bigint"),
            ],
            indexes: vec![Index {
                name: "idx_user_id".into(),
                columns: vec!["user_id".into()],
                unique: false,
            }],
            foreign_keys: vec![ForeignKey {
                name: "fk_posts_user".into(),
                column: "user_id".into(),
                ref_table: "users".into(),
                ref_column: "id".into(),
                options: vec!["ON DELETE CASCADE".into()],
            }],
        };
        vec![users, posts]
    }

    #[test]
    fn script_layout() {
        let migration = Migration::from_tables("init.sql", "2024-03-01 12:00:00", tables());
        let sql = render_migration(&migration, &Sqlite);

        assert!(sql.starts_with("-- Migration: init.sql\n-- Created at: 2024-03-01 12:00:00\n"));
        let users = sql.find("CREATE TABLE IF NOT EXISTS \"users\"").unwrap();
        let posts = sql.find("CREATE TABLE IF NOT EXISTS \"posts\"").unwrap();
        let indexes = sql.find("-- Create indexes").unwrap();
        let rollback = sql.find("-- Rollback SQL\n/*").unwrap();
        assert!(users < posts && posts < indexes && indexes < rollback);
        assert!(sql.contains(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_email\" ON \"users\" (\"email\");"
        ));
        assert!(sql.contains("CONSTRAINT \"fk_posts_user\" FOREIGN KEY (\"user_id\")"));

        let tail = &sql[rollback..];
        let drop_posts = tail.find("DROP TABLE IF EXISTS \"posts\";").unwrap();
        let drop_users = tail.find("DROP TABLE IF EXISTS \"users\";").unwrap();
        assert!(drop_posts < drop_users);
        assert!(tail.contains("DROP INDEX IF EXISTS \"idx_user_id\";"));
        assert!(tail.ends_with("*/\n"));
    }

    #[test]
    fn writer_names_files_by_timestamp() {
        let dir = std::env::temp_dir().join(format!("relorm_migrate_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();

        let path = MigrationWriter::new(&Sqlite)
            .write(&dir, "create_users", &tables(), now)
            .unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("20240301090507_create_users.sql")
        );
        let script = fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("-- Migration: 20240301090507_create_users.sql\n"));
        assert!(script.contains("-- Created at: 2024-03-01 09:05:07"));

        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.tables, tables());
        assert_eq!(manifest.drop_order, vec!["posts", "users"]);
        fs::remove_dir_all(&dir).unwrap();
    }
}
