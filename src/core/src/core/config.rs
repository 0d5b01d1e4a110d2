// 設定管理
//
// データベース方言と接続設定を表現する型を提供します。
// 接続文字列の組み立ては lamina-db 側の adapters::connection_string が担当します。

use serde::{Deserialize, Serialize};

/// データベース方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "sqlite")]
    SQLite,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::PostgreSQL => write!(f, "postgresql"),
            Dialect::MySQL => write!(f, "mysql"),
            Dialect::SQLite => write!(f, "sqlite"),
        }
    }
}

impl Dialect {
    /// Dialectに応じたデフォルトポートを返す
    ///
    /// - PostgreSQL: 5432
    /// - MySQL: 3306
    /// - SQLite: None（ファイルベースのためポート不要）
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Dialect::PostgreSQL => Some(5432),
            Dialect::MySQL => Some(3306),
            Dialect::SQLite => None,
        }
    }
}

/// データベース接続設定
///
/// SQLiteの場合は `database` にファイルパス（または `:memory:`）を指定します。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// ホスト名
    #[serde(default)]
    pub host: String,

    /// ポート番号（未指定時は方言のデフォルト）
    #[serde(default)]
    pub port: Option<u16>,

    /// データベース名（SQLiteの場合はパス）
    pub database: String,

    /// 接続ユーザー名
    #[serde(default)]
    pub user: Option<String>,

    /// 接続パスワード
    #[serde(default)]
    pub password: Option<String>,

    /// 最大接続数
    #[serde(default)]
    pub max_connections: Option<u32>,

    /// 接続タイムアウト（秒）
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl DatabaseConfig {
    /// 設定されたポート、なければ方言のデフォルトポートを返す
    pub fn resolved_port(&self, dialect: Dialect) -> u16 {
        self.port.or_else(|| dialect.default_port()).unwrap_or(0)
    }
}
