// マイグレーションレコーダー
//
// 適用済みマイグレーションの永続的な台帳を管理するアダプター。
// データベース固有のSQL構文を抽象化し、冪等な記録・削除をサポートします。
// 順序の保証はレコーダーの責務ではなく、エグゼキューターが呼び出し前に
// 順序を強制します。

use crate::core::config::Dialect;
use crate::core::error::DatabaseError;
use crate::core::migration::NodeKey;
use chrono::Utc;
use sqlx::{AnyPool, Row};
use std::collections::BTreeSet;

/// 台帳テーブル名
pub const LEDGER_TABLE: &str = "lamina_migrations";

/// マイグレーションレコーダー
///
/// `(app_label, name)` を主キーとする1行＝1適用済み単位の台帳を提供します。
#[derive(Debug, Clone)]
pub struct MigrationRecorder {
    dialect: Dialect,
}

impl MigrationRecorder {
    /// 新しいMigrationRecorderを作成
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// 台帳テーブル作成SQLを生成
    pub fn generate_ensure_schema_sql(&self) -> String {
        match self.dialect {
            Dialect::PostgreSQL => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    app_label VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
    PRIMARY KEY (app_label, name)
)"#,
                LEDGER_TABLE
            ),
            Dialect::MySQL => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    app_label VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (app_label, name)
)"#,
                LEDGER_TABLE
            ),
            Dialect::SQLite => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    app_label TEXT NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (app_label, name)
)"#,
                LEDGER_TABLE
            ),
        }
    }

    /// 台帳テーブルを冪等に作成
    ///
    /// バックエンドに到達できない場合は致命的エラーを返します。
    pub async fn ensure_schema(&self, pool: &AnyPool) -> Result<(), DatabaseError> {
        let sql = self.generate_ensure_schema_sql();

        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: format!("Failed to create migration ledger table: {}", e),
                sql: Some(sql),
            })?;

        Ok(())
    }

    /// 適用記録のINSERT SQLを生成（冪等）
    pub fn generate_record_applied_sql(&self, app_label: &str, name: &str) -> String {
        let applied_at = Utc::now().to_rfc3339();
        match self.dialect {
            Dialect::PostgreSQL | Dialect::SQLite => format!(
                "INSERT INTO {} (app_label, name, applied_at) VALUES ('{}', '{}', '{}') ON CONFLICT (app_label, name) DO NOTHING",
                LEDGER_TABLE,
                quote_literal(app_label),
                quote_literal(name),
                applied_at
            ),
            Dialect::MySQL => format!(
                "INSERT IGNORE INTO {} (app_label, name, applied_at) VALUES ('{}', '{}', '{}')",
                LEDGER_TABLE,
                quote_literal(app_label),
                quote_literal(name),
                applied_at
            ),
        }
    }

    /// 単位を適用済みとして記録（既に記録済みなら何もしない）
    pub async fn record_applied(
        &self,
        pool: &AnyPool,
        app_label: &str,
        name: &str,
    ) -> Result<(), DatabaseError> {
        let sql = self.generate_record_applied_sql(app_label, name);

        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: format!("Failed to record applied migration: {}", e),
                sql: Some(sql),
            })?;

        Ok(())
    }

    /// 適用記録のDELETE SQLを生成
    pub fn generate_record_unapplied_sql(&self, app_label: &str, name: &str) -> String {
        format!(
            "DELETE FROM {} WHERE app_label = '{}' AND name = '{}'",
            LEDGER_TABLE,
            quote_literal(app_label),
            quote_literal(name)
        )
    }

    /// 単位の適用記録を削除（記録が存在しなくてもエラーにしない）
    pub async fn record_unapplied(
        &self,
        pool: &AnyPool,
        app_label: &str,
        name: &str,
    ) -> Result<(), DatabaseError> {
        let sql = self.generate_record_unapplied_sql(app_label, name);

        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: format!("Failed to remove migration record: {}", e),
                sql: Some(sql),
            })?;

        Ok(())
    }

    /// 適用済み集合取得のSELECT SQLを生成
    pub fn generate_applied_set_sql(&self) -> String {
        format!(
            "SELECT app_label, name FROM {} ORDER BY app_label, name",
            LEDGER_TABLE
        )
    }

    /// 現在記録されている適用済み単位の集合を取得
    pub async fn applied_set(&self, pool: &AnyPool) -> Result<BTreeSet<NodeKey>, DatabaseError> {
        let sql = self.generate_applied_set_sql();

        let rows = sqlx::query(&sql)
            .fetch_all(pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: format!("Failed to fetch applied migration set: {}", e),
                sql: Some(sql),
            })?;

        let keys = rows
            .iter()
            .map(|row| {
                let app_label: String = row.get(0);
                let name: String = row.get(1);
                NodeKey::new(app_label, name)
            })
            .collect();

        Ok(keys)
    }

    /// 全記録を削除（テスト・リセット用途のみ）
    pub async fn flush(&self, pool: &AnyPool) -> Result<(), DatabaseError> {
        let sql = format!("DELETE FROM {}", LEDGER_TABLE);

        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: format!("Failed to flush migration ledger: {}", e),
                sql: Some(sql),
            })?;

        Ok(())
    }
}

/// シングルクォートをエスケープ
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ensure_schema_sql_postgres() {
        let recorder = MigrationRecorder::new(Dialect::PostgreSQL);
        let sql = recorder.generate_ensure_schema_sql();

        assert!(sql.contains("CREATE TABLE IF NOT EXISTS"));
        assert!(sql.contains("lamina_migrations"));
        assert!(sql.contains("app_label"));
        assert!(sql.contains("applied_at"));
        assert!(sql.contains("PRIMARY KEY (app_label, name)"));
    }

    #[test]
    fn test_generate_ensure_schema_sql_mysql() {
        let recorder = MigrationRecorder::new(Dialect::MySQL);
        let sql = recorder.generate_ensure_schema_sql();

        assert!(sql.contains("CREATE TABLE IF NOT EXISTS"));
        assert!(sql.contains("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_generate_ensure_schema_sql_sqlite() {
        let recorder = MigrationRecorder::new(Dialect::SQLite);
        let sql = recorder.generate_ensure_schema_sql();

        assert!(sql.contains("CREATE TABLE IF NOT EXISTS"));
        assert!(sql.contains("datetime('now')"));
    }

    #[test]
    fn test_generate_record_applied_sql_is_idempotent() {
        let recorder = MigrationRecorder::new(Dialect::PostgreSQL);
        let sql = recorder.generate_record_applied_sql("accounts", "0001_initial");

        assert!(sql.contains("INSERT INTO lamina_migrations"));
        assert!(sql.contains("accounts"));
        assert!(sql.contains("0001_initial"));
        assert!(sql.contains("ON CONFLICT (app_label, name) DO NOTHING"));

        let recorder = MigrationRecorder::new(Dialect::MySQL);
        let sql = recorder.generate_record_applied_sql("accounts", "0001_initial");
        assert!(sql.contains("INSERT IGNORE INTO lamina_migrations"));
    }

    #[test]
    fn test_generate_record_applied_sql_escapes_quotes() {
        let recorder = MigrationRecorder::new(Dialect::SQLite);
        let sql = recorder.generate_record_applied_sql("acc'ounts", "0001");

        assert!(sql.contains("acc''ounts"));
    }

    #[test]
    fn test_generate_record_unapplied_sql() {
        let recorder = MigrationRecorder::new(Dialect::SQLite);
        let sql = recorder.generate_record_unapplied_sql("accounts", "0001_initial");

        assert!(sql.contains("DELETE FROM lamina_migrations"));
        assert!(sql.contains("app_label = 'accounts'"));
        assert!(sql.contains("name = '0001_initial'"));
    }

    #[test]
    fn test_generate_applied_set_sql() {
        let recorder = MigrationRecorder::new(Dialect::SQLite);
        let sql = recorder.generate_applied_set_sql();

        assert!(sql.contains("SELECT app_label, name"));
        assert!(sql.contains("FROM lamina_migrations"));
        assert!(sql.contains("ORDER BY"));
    }
}
