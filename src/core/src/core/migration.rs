// マイグレーションドメインモデル
//
// マイグレーション単位の識別キー、単位そのもの、実行計画のエントリーを
// 表現する型システムを提供します。

use crate::core::operation::Operation;
use crate::core::state::ProjectState;
use serde::{Deserialize, Serialize};

/// 「アプリケーションの最初のマイグレーション」を指すセンチネル名
pub const FIRST_MIGRATION: &str = "__first__";

/// 「アプリケーションの最新のマイグレーション」を指すセンチネル名
pub const LATEST_MIGRATION: &str = "__latest__";

/// マイグレーションノードキー
///
/// `(app_label, name)` の組でシステム全体のマイグレーション単位を
/// 一意に識別します。グラフの頂点ID、適用済み集合のメンバー、
/// マップのキーとして使用されます。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// アプリケーションラベル
    pub app_label: String,
    /// マイグレーション名
    pub name: String,
}

impl NodeKey {
    /// 新しいノードキーを作成
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
        }
    }

    /// `__first__` センチネルかどうか
    pub fn is_first(&self) -> bool {
        self.name == FIRST_MIGRATION
    }

    /// `__latest__` センチネルかどうか
    pub fn is_latest(&self) -> bool {
        self.name == LATEST_MIGRATION
    }

    /// いずれかのセンチネルかどうか
    pub fn is_sentinel(&self) -> bool {
        self.is_first() || self.is_latest()
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app_label, self.name)
    }
}

/// マイグレーション単位
///
/// 順序付きの操作列と、他の単位への依存関係を宣言します。
/// `replaces` が空でない単位はスカッシュ（統合）単位です。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    /// アプリケーションラベル
    pub app_label: String,

    /// マイグレーション名（アプリケーション内で一意）
    pub name: String,

    /// 順序付きのスキーマ変更操作
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// 先に適用されている必要がある単位（センチネル名も可）
    #[serde(default)]
    pub dependencies: Vec<NodeKey>,

    /// この単位より後に適用されるべき単位（逆方向の依存）
    #[serde(default)]
    pub run_before: Vec<NodeKey>,

    /// この単位が置き換える単位の列（スカッシュ単位のみ非空）
    #[serde(default)]
    pub replaces: Vec<NodeKey>,
}

impl Migration {
    /// 操作と依存関係が空のマイグレーションを作成
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            operations: Vec::new(),
            dependencies: Vec::new(),
            run_before: Vec::new(),
            replaces: Vec::new(),
        }
    }

    /// この単位のノードキーを返す
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.app_label.clone(), self.name.clone())
    }

    /// スカッシュ単位かどうか
    pub fn is_replacement(&self) -> bool {
        !self.replaces.is_empty()
    }

    /// すべての操作がトランザクション内で実行可能かどうか
    pub fn atomic(&self) -> bool {
        self.operations.iter().all(Operation::atomic)
    }

    /// 最初の不可逆な操作を返す（すべて可逆ならNone）
    pub fn irreversible_operation(&self) -> Option<&Operation> {
        self.operations.iter().find(|op| !op.reversible())
    }

    /// 同一アプリケーション内の単位への依存を持つかどうか
    ///
    /// 持たない場合、この単位はアプリケーション履歴の最初の単位であり、
    /// ソフト適用判定の対象になります。
    pub fn has_same_app_dependency(&self) -> bool {
        self.dependencies
            .iter()
            .any(|dep| dep.app_label == self.app_label)
    }

    /// この単位の操作列が作成するテーブル名の一覧
    pub fn created_tables(&self) -> Vec<&str> {
        self.operations
            .iter()
            .flat_map(Operation::created_tables)
            .collect()
    }

    /// 前進方向の状態遷移を宣言順に適用
    pub fn mutate_state(&self, state: &mut ProjectState) {
        for operation in &self.operations {
            operation.state_forwards(state);
        }
    }
}

impl std::fmt::Display for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app_label, self.name)
    }
}

/// マイグレーションターゲット
///
/// `name` が `None` の場合は「このアプリケーションを完全に未適用へ戻す」
/// ことを意味します（zeroターゲット）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    /// アプリケーションラベル
    pub app_label: String,
    /// ターゲットのマイグレーション名（Noneはzero）
    pub name: Option<String>,
}

impl MigrationTarget {
    /// 特定の単位を指すターゲットを作成
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: Some(name.into()),
        }
    }

    /// アプリケーションを完全に未適用へ戻すターゲットを作成
    pub fn zero(app_label: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: None,
        }
    }
}

/// 実行計画のエントリー
///
/// 計画は重複のない順序付きのエントリー列で、逐次実行に対して安全です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// 対象単位のノードキー
    pub key: NodeKey,
    /// 後退方向（逆適用）かどうか
    pub backwards: bool,
}

impl PlanEntry {
    /// 前進エントリーを作成
    pub fn forwards(key: NodeKey) -> Self {
        Self {
            key,
            backwards: false,
        }
    }

    /// 後退エントリーを作成
    pub fn backwards(key: NodeKey) -> Self {
        Self {
            key,
            backwards: true,
        }
    }
}
