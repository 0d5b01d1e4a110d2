// データベースイントロスペクター
//
// バックエンドから観測可能なスキーマ情報を取得するための抽象化レイヤー。
// ソフト適用判定に必要なテーブル名の列挙を、方言固有の
// INFORMATION_SCHEMA / PRAGMAクエリで実装します。

use crate::core::config::Dialect;
use crate::core::error::DatabaseError;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};

/// データベーススキーマ取得インターフェース
///
/// 各データベース方言固有のイントロスペクション処理を抽象化します。
#[async_trait]
pub trait DatabaseIntrospector: Send + Sync {
    /// テーブル名一覧を取得
    async fn get_table_names(&self, pool: &AnyPool) -> Result<Vec<String>, DatabaseError>;
}

/// PostgreSQL用イントロスペクター
pub struct PostgresIntrospector;

/// MySQL用イントロスペクター
pub struct MySqlIntrospector;

/// SQLite用イントロスペクター
pub struct SqliteIntrospector;

/// 方言に応じたイントロスペクターを作成
pub fn create_introspector(dialect: Dialect) -> Box<dyn DatabaseIntrospector> {
    match dialect {
        Dialect::PostgreSQL => Box::new(PostgresIntrospector),
        Dialect::MySQL => Box::new(MySqlIntrospector),
        Dialect::SQLite => Box::new(SqliteIntrospector),
    }
}

async fn fetch_names(pool: &AnyPool, sql: &str) -> Result<Vec<String>, DatabaseError> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| DatabaseError::Query {
            message: format!("Failed to introspect table names: {}", e),
            sql: Some(sql.to_string()),
        })?;

    Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
}

#[async_trait]
impl DatabaseIntrospector for PostgresIntrospector {
    async fn get_table_names(&self, pool: &AnyPool) -> Result<Vec<String>, DatabaseError> {
        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = 'public'
            ORDER BY table_name
        "#;

        fetch_names(pool, sql).await
    }
}

#[async_trait]
impl DatabaseIntrospector for MySqlIntrospector {
    async fn get_table_names(&self, pool: &AnyPool) -> Result<Vec<String>, DatabaseError> {
        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
            ORDER BY table_name
        "#;

        fetch_names(pool, sql).await
    }
}

#[async_trait]
impl DatabaseIntrospector for SqliteIntrospector {
    async fn get_table_names(&self, pool: &AnyPool) -> Result<Vec<String>, DatabaseError> {
        let sql = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        fetch_names(pool, sql).await
    }
}
