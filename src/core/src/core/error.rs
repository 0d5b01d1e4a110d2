// エラー型定義
//
// ライブラリ全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、GraphError, LookupError, LoaderError,
// ExecutorError, DatabaseError を定義します。

use std::collections::BTreeMap;
use thiserror::Error;

/// グラフ構築エラー
///
/// 依存グラフの組み立て時に発生する致命的なエラーを表現します。
/// いずれのバリアントもグラフ構築全体を中断させます。
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// ノードの二重登録
    #[error("Duplicate migration node: {app_label}.{name}")]
    DuplicateNode {
        /// アプリケーションラベル
        app_label: String,
        /// マイグレーション名
        name: String,
    },

    /// グラフに存在しないノードへの参照
    #[error("Migration node not found: {app_label}.{name}")]
    NodeNotFound {
        /// アプリケーションラベル
        app_label: String,
        /// マイグレーション名
        name: String,
    },

    /// 存在しない依存先を指すエッジ
    #[error("Migration {child} depends on nonexistent migration {parent}")]
    DanglingDependency {
        /// 依存する側のノード
        child: String,
        /// 存在しない依存先
        parent: String,
    },

    /// 循環依存
    #[error("Circular dependency detected involving migration {node}")]
    CircularDependency {
        /// 循環に含まれるノードの一つ
        node: String,
    },
}

/// 名前プレフィックス解決エラー
///
/// 対話的なターゲット選択で使用される、呼び出し側で回復可能なエラーです。
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// プレフィックスが複数のマイグレーションに一致
    #[error("Ambiguous migration name '{prefix}' in app '{app_label}': matches {}", candidates.join(", "))]
    Ambiguous {
        /// アプリケーションラベル
        app_label: String,
        /// 指定されたプレフィックス
        prefix: String,
        /// 一致した候補（名前順）
        candidates: Vec<String>,
    },

    /// 一致するマイグレーションが存在しない
    #[error("Migration '{prefix}' not found in app '{app_label}'")]
    NotFound {
        /// アプリケーションラベル
        app_label: String,
        /// 指定されたプレフィックス
        prefix: String,
    },
}

/// ローダーエラー
///
/// ストレージからの読み込みとグラフ組み立てで発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum LoaderError {
    /// ストレージ読み込み失敗（「マイグレーションなし」とは区別される）
    #[error("Failed to load migrations for app '{app_label}': {message}")]
    Storage {
        /// アプリケーションラベル
        app_label: String,
        /// エラー内容
        message: String,
    },

    /// カタログに存在しないアプリケーションへの依存
    #[error("Migration {migration} depends on unknown app '{app_label}'")]
    UnknownApp {
        /// 依存を宣言したマイグレーション
        migration: String,
        /// 未知のアプリケーションラベル
        app_label: String,
    },

    /// センチネル依存（__first__ / __latest__）を解決できない
    #[error("Cannot resolve dependency '{app_label}.{name}': app has migrations but no matching node")]
    UnresolvableSentinel {
        /// 依存先アプリケーションラベル
        app_label: String,
        /// センチネル名
        name: String,
    },

    /// グラフ構築エラー
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// エグゼキューターエラー
///
/// 実行計画の算出とマイグレーション適用で発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// 同一アプリケーション内に複数のリーフノードが存在する
    #[error("Conflicting migrations detected: {}", format_conflicts(conflicts))]
    Conflict {
        /// アプリケーションラベル → 競合するマイグレーション名
        conflicts: BTreeMap<String, Vec<String>>,
    },

    /// 逆適用できない操作を含むマイグレーションのロールバック要求
    #[error("Operation '{operation}' in migration {migration} is not reversible")]
    IrreversibleOperation {
        /// 対象マイグレーション
        migration: String,
        /// 逆適用できない操作の説明
        operation: String,
    },

    /// 名前解決エラー
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// ローダーエラー
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// グラフエラー
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// データベースエラー
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// 競合マップを "app: 0002_a, 0002_b; ..." 形式でフォーマット
fn format_conflicts(conflicts: &BTreeMap<String, Vec<String>>) -> String {
    conflicts
        .iter()
        .map(|(app, names)| format!("multiple leaf nodes in app '{}': {}", app, names.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// データベースエラー
///
/// バックエンドとの通信で発生するエラーを表現します。
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// 接続エラー
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// エラーメッセージ
        message: String,
        /// 原因
        cause: String,
    },

    /// クエリ実行エラー
    #[error("Database query error: {message}")]
    Query {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::DuplicateNode {
            app_label: "accounts".to_string(),
            name: "0001_initial".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate migration node: accounts.0001_initial");

        let err = GraphError::CircularDependency {
            node: "accounts.0002_profile".to_string(),
        };
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_lookup_error_display() {
        let err = LookupError::Ambiguous {
            app_label: "accounts".to_string(),
            prefix: "0002".to_string(),
            candidates: vec!["0002_profile".to_string(), "0002_address".to_string()],
        };
        assert!(err.to_string().contains("0002_profile, 0002_address"));

        let err = LookupError::NotFound {
            app_label: "accounts".to_string(),
            prefix: "0009".to_string(),
        };
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_conflict_error_display() {
        let mut conflicts = BTreeMap::new();
        conflicts.insert(
            "accounts".to_string(),
            vec!["0002_profile".to_string(), "0002_address".to_string()],
        );

        let err = ExecutorError::Conflict { conflicts };
        let message = err.to_string();

        assert!(message.contains("accounts"));
        assert!(message.contains("0002_profile"));
        assert!(message.contains("0002_address"));
    }

    #[test]
    fn test_database_error_display() {
        let err = DatabaseError::Query {
            message: "insert failed".to_string(),
            sql: Some("INSERT INTO lamina_migrations".to_string()),
        };
        assert!(err.to_string().contains("insert failed"));
    }
}
