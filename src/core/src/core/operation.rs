// スキーマ変更操作
//
// マイグレーション単位が保持する操作のクローズドな直和型。
// 各操作は説明・可逆性・原子性・SQL還元可能性と、
// 状態遷移（state_forwards）および前進/後退SQLの生成を提供します。

use crate::core::state::ProjectState;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// スキーマ変更操作
///
/// マイグレーションファイルの `operations` リストに `kind` タグ付きで
/// シリアライズされます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// テーブル作成
    CreateTable {
        /// テーブル名
        table: String,
        /// カラム定義部（括弧の内側）
        definition: String,
    },

    /// テーブル削除
    DropTable {
        /// テーブル名
        table: String,
        /// ロールバック時に再作成するためのカラム定義部（省略時は不可逆）
        #[serde(default)]
        recreate: Option<String>,
    },

    /// 任意SQLの実行
    RunSql {
        /// 前進SQL
        up: String,
        /// 後退SQL（省略時は不可逆）
        #[serde(default)]
        down: Option<String>,
        /// トランザクション内で実行可能かどうか
        #[serde(default = "default_true")]
        atomic: bool,
    },
}

impl Operation {
    /// 操作の説明文を返す
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateTable { table, .. } => format!("Create table {}", table),
            Operation::DropTable { table, .. } => format!("Drop table {}", table),
            Operation::RunSql { .. } => "Run raw SQL".to_string(),
        }
    }

    /// 逆適用が可能かどうか
    pub fn reversible(&self) -> bool {
        match self {
            Operation::CreateTable { .. } => true,
            Operation::DropTable { recreate, .. } => recreate.is_some(),
            Operation::RunSql { down, .. } => down.is_some(),
        }
    }

    /// トランザクション内で実行可能かどうか
    pub fn atomic(&self) -> bool {
        match self {
            Operation::CreateTable { .. } | Operation::DropTable { .. } => true,
            Operation::RunSql { atomic, .. } => *atomic,
        }
    }

    /// SQL文へ還元可能かどうか
    ///
    /// 現在の操作カタログはすべてSQLへ還元されます。
    pub fn reduces_to_sql(&self) -> bool {
        true
    }

    /// 前進方向の状態遷移を適用
    pub fn state_forwards(&self, state: &mut ProjectState) {
        match self {
            Operation::CreateTable { table, .. } => state.add_table(table.clone()),
            Operation::DropTable { table, .. } => state.remove_table(table),
            Operation::RunSql { .. } => {}
        }
    }

    /// 前進SQLを生成
    pub fn forwards_sql(&self) -> String {
        match self {
            Operation::CreateTable { table, definition } => {
                format!("CREATE TABLE {} ({})", table, definition)
            }
            Operation::DropTable { table, .. } => format!("DROP TABLE {}", table),
            Operation::RunSql { up, .. } => up.clone(),
        }
    }

    /// 後退SQLを生成（不可逆な操作はNone）
    pub fn backwards_sql(&self) -> Option<String> {
        match self {
            Operation::CreateTable { table, .. } => Some(format!("DROP TABLE {}", table)),
            Operation::DropTable { table, recreate } => recreate
                .as_ref()
                .map(|definition| format!("CREATE TABLE {} ({})", table, definition)),
            Operation::RunSql { down, .. } => down.clone(),
        }
    }

    /// この操作が作成するテーブル名
    ///
    /// ソフト適用判定で使用されます。
    pub fn created_tables(&self) -> Vec<&str> {
        match self {
            Operation::CreateTable { table, .. } => vec![table.as_str()],
            _ => Vec::new(),
        }
    }
}
