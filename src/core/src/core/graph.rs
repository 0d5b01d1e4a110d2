// マイグレーション依存グラフ
//
// 全アプリケーションのマイグレーション単位をノードとして保持し、
// 「依存先 → 依存元」の有向エッジ集合を管理します。
// ルート/リーフの探索、前進/後退の実行計画、循環検出を提供します。

use crate::core::error::GraphError;
use crate::core::migration::{Migration, NodeKey};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// マイグレーション依存グラフ
///
/// エッジ `child → parent` は「parent が先に適用されていなければならない」
/// ことを意味します。エッジ集合は常に非循環でなければならず、
/// 循環は構築時の致命的エラーです。
///
/// ノードとエッジは順序付きコンテナに保持されるため、同じ入力からは
/// 常に同じ順序の計画が得られます。
#[derive(Debug, Clone, Default)]
pub struct MigrationGraph {
    nodes: BTreeMap<NodeKey, Migration>,
    /// key が依存するノード（依存先）
    parents: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
    /// key に依存するノード（依存元）
    children: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
}

impl MigrationGraph {
    /// 空のグラフを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ノードを追加
    ///
    /// 同じキーのノードが既に存在する場合はエラーを返します。
    pub fn add_node(&mut self, migration: Migration) -> Result<(), GraphError> {
        let key = migration.key();
        if self.nodes.contains_key(&key) {
            return Err(GraphError::DuplicateNode {
                app_label: key.app_label,
                name: key.name,
            });
        }
        self.nodes.insert(key, migration);
        Ok(())
    }

    /// 依存エッジを追加
    ///
    /// `parent` は `child` より先に適用されなければなりません。
    /// いずれかのノードが存在しない場合はエラーを返します。
    pub fn add_dependency(&mut self, child: &NodeKey, parent: &NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(child) {
            return Err(GraphError::NodeNotFound {
                app_label: child.app_label.clone(),
                name: child.name.clone(),
            });
        }
        if !self.nodes.contains_key(parent) {
            return Err(GraphError::DanglingDependency {
                child: child.to_string(),
                parent: parent.to_string(),
            });
        }

        self.parents
            .entry(child.clone())
            .or_default()
            .insert(parent.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        Ok(())
    }

    /// キーに対応するマイグレーションを返す
    pub fn node(&self, key: &NodeKey) -> Option<&Migration> {
        self.nodes.get(key)
    }

    /// ノードが存在するか確認
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// 全ノードをキー順で返す
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &Migration)> {
        self.nodes.iter()
    }

    /// ノード数
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// グラフが空かどうか
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// キーが依存するノードの集合（依存先）
    pub fn parents_of(&self, key: &NodeKey) -> BTreeSet<NodeKey> {
        self.parents.get(key).cloned().unwrap_or_default()
    }

    /// キーに依存するノードの集合（依存元）
    pub fn children_of(&self, key: &NodeKey) -> BTreeSet<NodeKey> {
        self.children.get(key).cloned().unwrap_or_default()
    }

    /// ルートノード（依存先を持たないノード）をキー順で返す
    ///
    /// `app_label` を指定すると、そのアプリケーション内で
    /// 同一アプリケーションへの依存を持たないノードに絞り込みます。
    pub fn root_nodes(&self, app_label: Option<&str>) -> Vec<NodeKey> {
        self.boundary_nodes(app_label, &self.parents)
    }

    /// リーフノード（依存元を持たないノード）をキー順で返す
    ///
    /// 整合した履歴ではアプリケーションごとにリーフはちょうど一つです。
    pub fn leaf_nodes(&self, app_label: Option<&str>) -> Vec<NodeKey> {
        self.boundary_nodes(app_label, &self.children)
    }

    /// ルート/リーフ探索の共通処理
    ///
    /// 境界の判定には同一アプリケーション内のエッジのみを使用します。
    /// 他アプリケーションからの依存はアプリケーション履歴の端点を変えません。
    fn boundary_nodes(
        &self,
        app_label: Option<&str>,
        edges: &BTreeMap<NodeKey, BTreeSet<NodeKey>>,
    ) -> Vec<NodeKey> {
        self.nodes
            .keys()
            .filter(|key| {
                if let Some(app) = app_label {
                    if key.app_label != app {
                        return false;
                    }
                }
                edges
                    .get(key)
                    .map(|set| !set.iter().any(|other| other.app_label == key.app_label))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// 前進計画を返す
    ///
    /// 指定ノードとその推移的依存先を、依存先が先に来る
    /// トポロジカル順で返します。指定ノード自身は末尾に含まれます。
    pub fn forwards_plan(&self, key: &NodeKey) -> Result<Vec<NodeKey>, GraphError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        self.traverse(key, true, &mut done, &mut order)?;
        Ok(order)
    }

    /// 後退計画を返す
    ///
    /// 指定ノードとその推移的依存元を、依存元が先に来る
    /// 逆適用順で返します。指定ノード自身は末尾に含まれます。
    pub fn backwards_plan(&self, key: &NodeKey) -> Result<Vec<NodeKey>, GraphError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        self.traverse(key, false, &mut done, &mut order)?;
        Ok(order)
    }

    /// グラフ全体が非循環であることを検証
    pub fn ensure_acyclic(&self) -> Result<(), GraphError> {
        let mut done = HashSet::new();
        let mut order = Vec::new();
        for key in self.nodes.keys() {
            self.traverse(key, true, &mut done, &mut order)?;
        }
        Ok(())
    }

    /// 反復的な深さ優先探索
    ///
    /// `forwards` がtrueのときはparentsエッジを、falseのときはchildrenエッジを
    /// たどり、帰りがけ順で `order` に積みます。探索パス上のノードへの再訪は
    /// 循環として検出されます。
    fn traverse(
        &self,
        start: &NodeKey,
        forwards: bool,
        done: &mut HashSet<NodeKey>,
        order: &mut Vec<NodeKey>,
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(start) {
            return Err(GraphError::NodeNotFound {
                app_label: start.app_label.clone(),
                name: start.name.clone(),
            });
        }
        if done.contains(start) {
            return Ok(());
        }

        let edges = |key: &NodeKey| -> Vec<NodeKey> {
            let map = if forwards { &self.parents } else { &self.children };
            map.get(key)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default()
        };

        let mut on_path: HashSet<NodeKey> = HashSet::new();
        let mut stack: Vec<(NodeKey, std::vec::IntoIter<NodeKey>)> =
            vec![(start.clone(), edges(start).into_iter())];
        on_path.insert(start.clone());

        while let Some((node, iter)) = stack.last_mut() {
            match iter.next() {
                Some(next) => {
                    if on_path.contains(&next) {
                        return Err(GraphError::CircularDependency {
                            node: next.to_string(),
                        });
                    }
                    if !done.contains(&next) {
                        let next_edges = edges(&next).into_iter();
                        on_path.insert(next.clone());
                        stack.push((next, next_edges));
                    }
                }
                None => {
                    let node = node.clone();
                    on_path.remove(&node);
                    done.insert(node.clone());
                    order.push(node);
                    stack.pop();
                }
            }
        }

        Ok(())
    }
}
