// マイグレーションローダー
//
// ストレージ上のマイグレーション単位を発見し、検証して一つの依存グラフに
// 組み立てるサービス。スカッシュ（置き換え）単位の合法性を適用済み集合と
// 照合して解決し、既存のエッジを付け替えます。
//
// 組み立ての順序:
// 1. 発見（アプリケーションごと、「なし」とエラーを区別）
// 2. normal / replacing への分割
// 3. 逆依存インデックスの構築
// 4. 置き換えの解決（グラフ組み立てより前）
// 5. グラフ組み立て（同一アプリ内エッジ → アプリ間エッジ → run_before）
// 6. 競合検出（リーフが複数あるアプリケーション）

use crate::core::catalog::Catalog;
use crate::core::error::{GraphError, LoaderError, LookupError};
use crate::core::graph::MigrationGraph;
use crate::core::migration::{Migration, NodeKey};
use crate::services::storage::{AppMigrations, MigrationStorage};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// マイグレーションローダー
///
/// `build_graph` の呼び出しごとに、カタログとストレージの内容から
/// グラフを組み立て直します。グラフは意図された順序の正であり、
/// 適用済み集合はバックエンド状態の正です。両者の照合がこの型の責務です。
pub struct MigrationLoader {
    catalog: Catalog,
    storage: Box<dyn MigrationStorage>,
    tolerate_missing: bool,

    /// 組み立て済みの依存グラフ
    pub graph: MigrationGraph,
    /// 置き換え解決後の適用済み集合
    pub applied_migrations: BTreeSet<NodeKey>,
    /// マイグレーションを持つアプリケーション
    pub migrated_apps: BTreeSet<String>,
    /// マイグレーションを持たないアプリケーション
    pub unmigrated_apps: BTreeSet<String>,
    /// スカッシュ単位 → 置き換えられた単位の列
    pub replacements: BTreeMap<NodeKey, Vec<NodeKey>>,
    /// ストレージから発見された全単位（置き換え解決前）
    pub disk_migrations: BTreeMap<NodeKey, Migration>,
}

impl MigrationLoader {
    /// 新しいMigrationLoaderを作成
    pub fn new(catalog: Catalog, storage: Box<dyn MigrationStorage>) -> Self {
        Self {
            catalog,
            storage,
            tolerate_missing: false,
            graph: MigrationGraph::new(),
            applied_migrations: BTreeSet::new(),
            migrated_apps: BTreeSet::new(),
            unmigrated_apps: BTreeSet::new(),
            replacements: BTreeMap::new(),
            disk_migrations: BTreeMap::new(),
        }
    }

    /// 解決できない依存を致命的エラーではなくスキップするモードを設定
    pub fn tolerate_missing(mut self, tolerate: bool) -> Self {
        self.tolerate_missing = tolerate;
        self
    }

    /// カタログを返す
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// グラフを組み立てる
    ///
    /// `applied` はレコーダーから取得した適用済み集合です。
    /// 置き換え解決の結果は `applied_migrations` に反映されます。
    pub fn build_graph(&mut self, applied: &BTreeSet<NodeKey>) -> Result<(), LoaderError> {
        self.graph = MigrationGraph::new();
        self.applied_migrations = applied.clone();
        self.migrated_apps.clear();
        self.unmigrated_apps.clear();
        self.replacements.clear();
        self.disk_migrations.clear();

        // 1. 発見と 2. 分割
        let mut normal: BTreeMap<NodeKey, Migration> = BTreeMap::new();
        let mut replacing: BTreeMap<NodeKey, Migration> = BTreeMap::new();

        for app_label in self.catalog.app_labels().to_vec() {
            match self.storage.load_app(&app_label).map_err(|e| {
                LoaderError::Storage {
                    app_label: app_label.clone(),
                    message: e.to_string(),
                }
            })? {
                AppMigrations::NoMigrations => {
                    self.unmigrated_apps.insert(app_label);
                }
                AppMigrations::Migrations(migrations) if migrations.is_empty() => {
                    // 発見可能な単位がゼロのアプリケーションも未マイグレーション扱い
                    self.unmigrated_apps.insert(app_label);
                }
                AppMigrations::Migrations(migrations) => {
                    self.migrated_apps.insert(app_label.clone());
                    for migration in migrations {
                        let key = migration.key();
                        if self
                            .disk_migrations
                            .insert(key.clone(), migration.clone())
                            .is_some()
                        {
                            return Err(LoaderError::Storage {
                                app_label: app_label.clone(),
                                message: format!("duplicate migration name '{}'", key.name),
                            });
                        }
                        if migration.is_replacement() {
                            replacing.insert(key, migration);
                        } else {
                            normal.insert(key, migration);
                        }
                    }
                }
            }
        }

        // 3. 逆依存インデックス（normal単位の依存宣言のみ、run_beforeは含めない）
        let mut reverse_dependencies: BTreeMap<NodeKey, BTreeSet<NodeKey>> = BTreeMap::new();
        for (key, migration) in &normal {
            for dep in &migration.dependencies {
                reverse_dependencies
                    .entry(dep.clone())
                    .or_default()
                    .insert(key.clone());
            }
        }

        // 4. 置き換えの解決
        for (key, migration) in replacing {
            let statuses: Vec<bool> = migration
                .replaces
                .iter()
                .map(|replaced| self.applied_migrations.contains(replaced))
                .collect();
            let all_applied = statuses.iter().all(|s| *s);
            let none_applied = !statuses.iter().any(|s| *s);

            // スカッシュキー自身の適用状態は置き換え先の状態から導出する。
            // 破棄してから、全適用の場合のみ再追加する。
            self.applied_migrations.remove(&key);
            if all_applied {
                self.applied_migrations.insert(key.clone());
            }

            if all_applied || none_applied {
                let replaced_set: BTreeSet<&NodeKey> = migration.replaces.iter().collect();

                for replaced in &migration.replaces {
                    normal.remove(replaced);

                    // 置き換えられた単位に依存していた単位のエッジを付け替える
                    if let Some(dependents) = reverse_dependencies.get(replaced) {
                        for child in dependents {
                            if replaced_set.contains(child) {
                                continue;
                            }
                            if let Some(child_migration) = normal.get_mut(child) {
                                for dep in &mut child_migration.dependencies {
                                    if dep == replaced {
                                        *dep = key.clone();
                                    }
                                }
                            }
                        }
                    }
                }

                debug!(replacing = %key, "applying squash replacement");
                self.replacements.insert(key.clone(), migration.replaces.clone());
                normal.insert(key, migration);
            } else {
                // 部分適用は違法だがエラーではない。適用済み集合が変化すれば
                // 次回の組み立てで解決されうる。
                warn!(
                    replacing = %key,
                    "skipping squash migration: replaced migrations are partially applied"
                );
            }
        }

        // 5. グラフ組み立て
        for migration in normal.values() {
            self.graph.add_node(migration.clone())?;
        }

        // 同一アプリ内のエッジを先に張り、センチネル解決の土台を作る
        for (key, migration) in &normal {
            for dep in &migration.dependencies {
                if dep.app_label != key.app_label {
                    continue;
                }
                // 自アプリを指すセンチネルは自己参照なのでスキップ
                if dep.is_sentinel() {
                    continue;
                }
                if let Some(parent) = self.resolve_dependency(key, dep)? {
                    self.graph.add_dependency(key, &parent)?;
                }
            }
        }

        // アプリ間のエッジ（センチネルは部分構築済みのグラフで解決）
        for (key, migration) in &normal {
            for dep in &migration.dependencies {
                if dep.app_label == key.app_label {
                    continue;
                }
                if let Some(parent) = self.resolve_dependency(key, dep)? {
                    self.graph.add_dependency(key, &parent)?;
                }
            }

            // run_before は逆向きの依存: 参照された単位がこの単位に依存する
            for target in &migration.run_before {
                if let Some(child) = self.resolve_dependency(key, target)? {
                    self.graph.add_dependency(&child, key)?;
                }
            }
        }

        self.graph.ensure_acyclic()?;

        Ok(())
    }

    /// 依存キーを具体的なグラフノードへ解決
    ///
    /// - カタログ外のアプリケーションへの依存は致命的エラー
    /// - 未マイグレーションアプリケーションへの依存はno-op（None）
    /// - センチネル（__first__ / __latest__）はルート/リーフへ解決
    /// - 置き換え済みの単位への依存はスカッシュ単位へ付け替え
    fn resolve_dependency(
        &self,
        declaring: &NodeKey,
        dep: &NodeKey,
    ) -> Result<Option<NodeKey>, LoaderError> {
        if !self.catalog.contains(&dep.app_label) {
            return Err(LoaderError::UnknownApp {
                migration: declaring.to_string(),
                app_label: dep.app_label.clone(),
            });
        }

        if self.unmigrated_apps.contains(&dep.app_label) {
            return Ok(None);
        }

        if dep.is_sentinel() {
            let candidates = if dep.is_first() {
                self.graph.root_nodes(Some(&dep.app_label))
            } else {
                self.graph.leaf_nodes(Some(&dep.app_label))
            };

            return match candidates.into_iter().next() {
                Some(resolved) => Ok(Some(resolved)),
                None if self.tolerate_missing => Ok(None),
                None => Err(LoaderError::UnresolvableSentinel {
                    app_label: dep.app_label.clone(),
                    name: dep.name.clone(),
                }),
            };
        }

        if self.graph.contains(dep) {
            return Ok(Some(dep.clone()));
        }

        // 置き換えられた単位への依存はスカッシュ単位へ解決する
        if let Some(replacement) = self.replacement_for(dep) {
            return Ok(Some(replacement));
        }

        if self.tolerate_missing {
            return Ok(None);
        }

        Err(LoaderError::Graph(GraphError::DanglingDependency {
            child: declaring.to_string(),
            parent: dep.to_string(),
        }))
    }

    /// 指定キーを置き換えているスカッシュ単位を返す
    fn replacement_for(&self, key: &NodeKey) -> Option<NodeKey> {
        self.replacements
            .iter()
            .find(|(squash, replaced)| replaced.contains(key) && self.graph.contains(squash))
            .map(|(squash, _)| squash.clone())
    }

    /// 競合検出
    ///
    /// リーフノードを複数持つアプリケーションのマップを返します。
    /// 空でないマップが返った場合、解決されるまで計画は実行できません。
    pub fn detect_conflicts(&self) -> BTreeMap<String, Vec<String>> {
        let mut leaves_by_app: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.graph.leaf_nodes(None) {
            leaves_by_app
                .entry(key.app_label.clone())
                .or_default()
                .push(key.name.clone());
        }

        leaves_by_app
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .collect()
    }

    /// 名前プレフィックスからマイグレーションを解決
    ///
    /// 完全一致を優先し、前方一致が複数あれば `Ambiguous`、
    /// 一つもなければ `NotFound` を返します。
    pub fn migration_by_prefix(
        &self,
        app_label: &str,
        prefix: &str,
    ) -> Result<NodeKey, LookupError> {
        let names: Vec<String> = self
            .graph
            .nodes()
            .filter(|(key, _)| key.app_label == app_label)
            .map(|(key, _)| key.name.clone())
            .collect();

        if names.iter().any(|name| name == prefix) {
            return Ok(NodeKey::new(app_label, prefix));
        }

        let matches: Vec<String> = names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();

        if matches.len() > 1 {
            return Err(LookupError::Ambiguous {
                app_label: app_label.to_string(),
                prefix: prefix.to_string(),
                candidates: matches,
            });
        }

        match matches.into_iter().next() {
            Some(name) => Ok(NodeKey::new(app_label, name)),
            None => Err(LookupError::NotFound {
                app_label: app_label.to_string(),
                prefix: prefix.to_string(),
            }),
        }
    }
}
