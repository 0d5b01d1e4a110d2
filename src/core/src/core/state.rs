// プロジェクト状態
//
// 操作列を適用した結果として存在するはずのテーブル集合を表現します。
// state_forwards の適用対象であり、実行時には from_state / to_state として
// 各操作に渡されます。

use std::collections::BTreeSet;

/// プロジェクト状態
///
/// マイグレーション適用後に存在するテーブル名の集合。
/// 検出（ソフト適用判定）とドライランの両方で参照されます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    tables: BTreeSet<String>,
}

impl ProjectState {
    /// 空の状態を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// テーブル名の集合から状態を作成
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// テーブルを追加
    pub fn add_table(&mut self, name: impl Into<String>) {
        self.tables.insert(name.into());
    }

    /// テーブルを削除（存在しない場合は何もしない）
    pub fn remove_table(&mut self, name: &str) {
        self.tables.remove(name);
    }

    /// テーブルが存在するか確認
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(name)
    }

    /// テーブル名を昇順で返す
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_state_add_remove() {
        let mut state = ProjectState::new();
        state.add_table("users");
        state.add_table("orders");

        assert!(state.has_table("users"));
        assert_eq!(state.tables().collect::<Vec<_>>(), vec!["orders", "users"]);

        state.remove_table("users");
        assert!(!state.has_table("users"));

        // 存在しないテーブルの削除はエラーにならない
        state.remove_table("users");
    }
}
