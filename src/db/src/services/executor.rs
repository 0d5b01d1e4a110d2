// マイグレーションエグゼキューター
//
// 実行計画の算出と、計画に沿ったマイグレーションの適用・逆適用を
// 行うサービス。計画の算出は純粋（バックエンドに触れない）で、
// 実行は1単位ずつ確定します。途中で失敗した場合、確定済みの単位は
// そのまま残り、エラーが即座に返されます。

use crate::adapters::introspector::{create_introspector, DatabaseIntrospector};
use crate::adapters::recorder::MigrationRecorder;
use crate::adapters::schema_editor::SchemaEditor;
use crate::core::config::Dialect;
use crate::core::error::{ExecutorError, GraphError, LookupError};
use crate::core::migration::{Migration, MigrationTarget, NodeKey, PlanEntry};
use crate::core::state::ProjectState;
use crate::services::loader::MigrationLoader;
use sqlx::AnyPool;
use std::collections::BTreeSet;
use tracing::info;

/// 単位の適用状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedState {
    /// 未適用
    NotApplied,
    /// 台帳に記録はないが、作成するテーブルがすべて存在する
    SoftApplied,
    /// 台帳に記録済み
    HardApplied,
}

/// 実行の進捗イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// 適用開始
    ApplyStart,
    /// 適用完了
    ApplySuccess,
    /// 逆適用開始
    UnapplyStart,
    /// 逆適用完了
    UnapplySuccess,
}

/// 進捗通知インターフェース
///
/// `fake` は実際のDDLを伴わない適用（明示的なfake、ソフト適用検出、
/// 記録済み単位の再適用）を示します。
pub trait MigrationProgress: Send {
    /// 単位ごとの進捗を通知
    fn migration_progress(&mut self, event: ProgressEvent, migration: &Migration, fake: bool);
}

/// マイグレーションエグゼキューター
pub struct MigrationExecutor {
    pool: AnyPool,
    dialect: Dialect,
    /// グラフと適用済み集合の保持者
    pub loader: MigrationLoader,
    /// 適用台帳
    pub recorder: MigrationRecorder,
    introspector: Box<dyn DatabaseIntrospector>,
    progress: Option<Box<dyn MigrationProgress>>,
}

impl MigrationExecutor {
    /// 新しいMigrationExecutorを作成
    pub fn new(pool: AnyPool, dialect: Dialect, loader: MigrationLoader) -> Self {
        Self {
            pool,
            dialect,
            loader,
            recorder: MigrationRecorder::new(dialect),
            introspector: create_introspector(dialect),
            progress: None,
        }
    }

    /// 進捗通知先を設定
    pub fn with_progress(mut self, progress: Box<dyn MigrationProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// 接続先の方言を返す
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 台帳の初期化、適用済み集合の取得、グラフの組み立てを行う
    ///
    /// `migrate` の前に一度呼び出す必要があります。
    pub async fn bootstrap(&mut self) -> Result<(), ExecutorError> {
        self.recorder.ensure_schema(&self.pool).await?;
        let applied = self.recorder.applied_set(&self.pool).await?;
        self.loader.build_graph(&applied)?;
        Ok(())
    }

    /// ターゲット列から実行計画を算出
    ///
    /// 計画の算出は純粋で、バックエンドの状態には触れません。
    /// 適用済み集合のローカルコピーをターゲット間で引き継ぐため、
    /// 複数ターゲットでも計画に重複は生じません。
    pub fn migration_plan(
        &self,
        targets: &[MigrationTarget],
    ) -> Result<Vec<PlanEntry>, ExecutorError> {
        let conflicts = self.loader.detect_conflicts();
        if !conflicts.is_empty() {
            return Err(ExecutorError::Conflict { conflicts });
        }

        let mut plan = Vec::new();
        let mut applied = self.loader.applied_migrations.clone();

        for target in targets {
            match &target.name {
                // zeroターゲット: アプリケーションを完全に未適用へ戻す
                None => {
                    for root in self.loader.graph.root_nodes(Some(&target.app_label)) {
                        for key in self.loader.graph.backwards_plan(&root)? {
                            if applied.contains(&key) {
                                applied.remove(&key);
                                plan.push(PlanEntry::backwards(key));
                            }
                        }
                    }
                }
                Some(name) => {
                    let key = NodeKey::new(target.app_label.clone(), name.clone());
                    if !self.loader.graph.contains(&key) {
                        return Err(ExecutorError::Lookup(LookupError::NotFound {
                            app_label: target.app_label.clone(),
                            prefix: name.clone(),
                        }));
                    }

                    if applied.contains(&key) {
                        // 後退: ターゲット自身は残し、同一アプリ内の子孫だけを
                        // 逆適用する
                        let next_in_app: Vec<NodeKey> = self
                            .loader
                            .graph
                            .children_of(&key)
                            .into_iter()
                            .filter(|child| child.app_label == target.app_label)
                            .collect();

                        for child in next_in_app {
                            for descendant in self.loader.graph.backwards_plan(&child)? {
                                if applied.contains(&descendant) {
                                    applied.remove(&descendant);
                                    plan.push(PlanEntry::backwards(descendant));
                                }
                            }
                        }
                    } else {
                        // 前進: 未適用の祖先を依存順に適用する
                        for ancestor in self.loader.graph.forwards_plan(&key)? {
                            if !applied.contains(&ancestor) {
                                applied.insert(ancestor.clone());
                                plan.push(PlanEntry::forwards(ancestor));
                            }
                        }
                    }
                }
            }
        }

        Ok(plan)
    }

    /// 計画を実行
    ///
    /// `plan` が `None` の場合はターゲットから算出します。最初の失敗で
    /// 中断し、そこまでに確定した単位は巻き戻されません。
    pub async fn migrate(
        &mut self,
        targets: &[MigrationTarget],
        plan: Option<Vec<PlanEntry>>,
        fake: bool,
    ) -> Result<Vec<PlanEntry>, ExecutorError> {
        let plan = match plan {
            Some(plan) => plan,
            None => self.migration_plan(targets)?,
        };

        for entry in &plan {
            let migration = self
                .loader
                .graph
                .node(&entry.key)
                .cloned()
                .ok_or_else(|| GraphError::NodeNotFound {
                    app_label: entry.key.app_label.clone(),
                    name: entry.key.name.clone(),
                })?;

            if entry.backwards {
                self.unapply_migration(&migration, fake).await?;
            } else {
                self.apply_migration(&migration, fake).await?;
            }
        }

        Ok(plan)
    }

    /// 単位を適用
    ///
    /// ソフト適用（台帳にないが作成テーブルがすべて存在）と記録済みの
    /// 単位はDDLを実行せず記録のみ行います。
    pub async fn apply_migration(
        &mut self,
        migration: &Migration,
        fake: bool,
    ) -> Result<(), ExecutorError> {
        let mut fake = fake;
        if !fake {
            match self.detect_applied_state(migration).await? {
                AppliedState::NotApplied => {}
                AppliedState::SoftApplied | AppliedState::HardApplied => {
                    fake = true;
                }
            }
        }

        self.emit(ProgressEvent::ApplyStart, migration, fake);

        if !fake {
            let mut editor = SchemaEditor::begin(&self.pool, migration.atomic()).await?;
            for operation in &migration.operations {
                editor.execute(&operation.forwards_sql()).await?;
            }
            editor.commit().await?;
        }

        self.record_applied(migration).await?;

        info!(migration = %migration, fake, "applied migration");
        self.emit(ProgressEvent::ApplySuccess, migration, fake);

        Ok(())
    }

    /// 単位を逆適用
    ///
    /// 不可逆な操作を含む場合、DDLの実行にも記録の変更にも着手する前に
    /// エラーを返します。
    pub async fn unapply_migration(
        &mut self,
        migration: &Migration,
        fake: bool,
    ) -> Result<(), ExecutorError> {
        if let Some(operation) = migration.irreversible_operation() {
            return Err(ExecutorError::IrreversibleOperation {
                migration: migration.to_string(),
                operation: operation.describe(),
            });
        }

        self.emit(ProgressEvent::UnapplyStart, migration, fake);

        if !fake {
            let mut editor = SchemaEditor::begin(&self.pool, migration.atomic()).await?;
            // 逆適用は宣言と逆の順序で実行する
            for operation in migration.operations.iter().rev() {
                if let Some(sql) = operation.backwards_sql() {
                    editor.execute(&sql).await?;
                }
            }
            editor.commit().await?;
        }

        self.record_unapplied(migration).await?;

        info!(migration = %migration, fake, "unapplied migration");
        self.emit(ProgressEvent::UnapplySuccess, migration, fake);

        Ok(())
    }

    /// 単位の適用状態を判定
    ///
    /// 同一アプリ内の依存を持たず、作成するテーブルがすべて既に存在する
    /// 単位はソフト適用とみなされます（台帳導入前に適用された履歴の再取込）。
    pub async fn detect_applied_state(
        &self,
        migration: &Migration,
    ) -> Result<AppliedState, ExecutorError> {
        if self.loader.applied_migrations.contains(&migration.key()) {
            return Ok(AppliedState::HardApplied);
        }

        if migration.has_same_app_dependency() || migration.created_tables().is_empty() {
            return Ok(AppliedState::NotApplied);
        }

        let existing: BTreeSet<String> = self
            .introspector
            .get_table_names(&self.pool)
            .await?
            .into_iter()
            .collect();

        if soft_applied(migration, &existing) {
            Ok(AppliedState::SoftApplied)
        } else {
            Ok(AppliedState::NotApplied)
        }
    }

    /// 計画を実行せずに、実行されるであろうSQLを収集
    pub async fn collect_sql(&self, plan: &[PlanEntry]) -> Result<Vec<String>, ExecutorError> {
        let mut collected = Vec::new();

        for entry in plan {
            let migration = self
                .loader
                .graph
                .node(&entry.key)
                .ok_or_else(|| GraphError::NodeNotFound {
                    app_label: entry.key.app_label.clone(),
                    name: entry.key.name.clone(),
                })?;

            let mut editor = SchemaEditor::collect_only();

            if entry.backwards {
                if let Some(operation) = migration.irreversible_operation() {
                    return Err(ExecutorError::IrreversibleOperation {
                        migration: migration.to_string(),
                        operation: operation.describe(),
                    });
                }
                for operation in migration.operations.iter().rev() {
                    if let Some(sql) = operation.backwards_sql() {
                        editor.execute(&sql).await?;
                    }
                }
            } else {
                for operation in &migration.operations {
                    editor.execute(&operation.forwards_sql()).await?;
                }
            }

            collected.extend(editor.commit().await?);
        }

        Ok(collected)
    }

    /// 適用済み単位から到達可能なプロジェクト状態を再構築
    pub fn project_state(&self) -> Result<ProjectState, ExecutorError> {
        let mut state = ProjectState::new();
        let mut done = BTreeSet::new();

        for leaf in self.loader.graph.leaf_nodes(None) {
            for key in self.loader.graph.forwards_plan(&leaf)? {
                if done.insert(key.clone()) && self.loader.applied_migrations.contains(&key) {
                    if let Some(migration) = self.loader.graph.node(&key) {
                        migration.mutate_state(&mut state);
                    }
                }
            }
        }

        Ok(state)
    }

    /// 適用の記録
    ///
    /// スカッシュ単位は置き換えた単位のキーごとに台帳へ記録します。
    /// スカッシュ単位自身の適用状態は次回のグラフ組み立てで導出されます。
    async fn record_applied(&mut self, migration: &Migration) -> Result<(), ExecutorError> {
        if migration.is_replacement() {
            for replaced in &migration.replaces {
                self.recorder
                    .record_applied(&self.pool, &replaced.app_label, &replaced.name)
                    .await?;
                self.loader.applied_migrations.insert(replaced.clone());
            }
        } else {
            self.recorder
                .record_applied(&self.pool, &migration.app_label, &migration.name)
                .await?;
        }

        self.loader.applied_migrations.insert(migration.key());
        Ok(())
    }

    /// 逆適用の記録（fakeでも台帳は更新される）
    async fn record_unapplied(&mut self, migration: &Migration) -> Result<(), ExecutorError> {
        if migration.is_replacement() {
            for replaced in &migration.replaces {
                self.recorder
                    .record_unapplied(&self.pool, &replaced.app_label, &replaced.name)
                    .await?;
                self.loader.applied_migrations.remove(replaced);
            }
        } else {
            self.recorder
                .record_unapplied(&self.pool, &migration.app_label, &migration.name)
                .await?;
        }

        self.loader.applied_migrations.remove(&migration.key());
        Ok(())
    }

    fn emit(&mut self, event: ProgressEvent, migration: &Migration, fake: bool) {
        if let Some(progress) = self.progress.as_mut() {
            progress.migration_progress(event, migration, fake);
        }
    }
}

/// ソフト適用判定
///
/// 作成するテーブルが一つ以上あり、そのすべてが既に存在する場合にtrue。
pub fn soft_applied(migration: &Migration, existing_tables: &BTreeSet<String>) -> bool {
    let created = migration.created_tables();
    !created.is_empty()
        && created
            .iter()
            .all(|table| existing_tables.contains(*table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Catalog;
    use crate::core::operation::Operation;
    use crate::services::storage::MemoryStorage;
    use sqlx::any::AnyPoolOptions;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn key(app: &str, name: &str) -> NodeKey {
        NodeKey::new(app, name)
    }

    fn create_table(app: &str, name: &str, table: &str, deps: &[(&str, &str)]) -> Migration {
        let mut m = Migration::new(app, name);
        m.dependencies = deps.iter().map(|(a, n)| NodeKey::new(*a, *n)).collect();
        m.operations = vec![Operation::CreateTable {
            table: table.to_string(),
            definition: "id INTEGER PRIMARY KEY".to_string(),
        }];
        m
    }

    fn loader_with(apps: &[&str], migrations: Vec<Migration>) -> MigrationLoader {
        let mut storage = MemoryStorage::new();
        for m in migrations {
            storage.add(m);
        }
        MigrationLoader::new(Catalog::new(apps.to_vec()), Box::new(storage))
    }

    async fn sqlite_pool(temp: &TempDir) -> AnyPool {
        sqlx::any::install_default_drivers();
        let path = temp.path().join("test.db");
        if !path.exists() {
            std::fs::File::create(&path).unwrap();
        }

        AnyPoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite://{}", path.display()))
            .await
            .unwrap()
    }

    async fn executor_with(
        temp: &TempDir,
        apps: &[&str],
        migrations: Vec<Migration>,
    ) -> MigrationExecutor {
        let pool = sqlite_pool(temp).await;
        let loader = loader_with(apps, migrations);
        let mut executor = MigrationExecutor::new(pool, Dialect::SQLite, loader);
        executor.bootstrap().await.unwrap();
        executor
    }

    fn two_step_app() -> Vec<Migration> {
        vec![
            create_table("appx", "0001", "users", &[]),
            create_table("appx", "0002", "profiles", &[("appx", "0001")]),
        ]
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Arc<Mutex<Vec<(ProgressEvent, String, bool)>>>,
    }

    impl MigrationProgress for RecordingProgress {
        fn migration_progress(&mut self, event: ProgressEvent, migration: &Migration, fake: bool) {
            self.events
                .lock()
                .unwrap()
                .push((event, migration.to_string(), fake));
        }
    }

    #[tokio::test]
    async fn test_forwards_plan_for_unapplied_target() {
        let temp = TempDir::new().unwrap();
        let executor = executor_with(&temp, &["appx"], two_step_app()).await;

        let plan = executor
            .migration_plan(&[MigrationTarget::new("appx", "0002")])
            .unwrap();

        assert_eq!(
            plan,
            vec![
                PlanEntry::forwards(key("appx", "0001")),
                PlanEntry::forwards(key("appx", "0002")),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_target_unapplies_whole_app() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;
        executor
            .migrate(&[MigrationTarget::new("appx", "0002")], None, false)
            .await
            .unwrap();

        let plan = executor
            .migration_plan(&[MigrationTarget::zero("appx")])
            .unwrap();

        // 子が先、ルートが最後
        assert_eq!(
            plan,
            vec![
                PlanEntry::backwards(key("appx", "0002")),
                PlanEntry::backwards(key("appx", "0001")),
            ]
        );
    }

    #[tokio::test]
    async fn test_backward_plan_keeps_target_applied() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;
        executor
            .migrate(&[MigrationTarget::new("appx", "0002")], None, false)
            .await
            .unwrap();

        let plan = executor
            .migration_plan(&[MigrationTarget::new("appx", "0001")])
            .unwrap();

        // ターゲット自身（0001）は逆適用されない
        assert_eq!(plan, vec![PlanEntry::backwards(key("appx", "0002"))]);
    }

    #[tokio::test]
    async fn test_plan_threads_applied_set_across_targets() {
        let temp = TempDir::new().unwrap();
        let migrations = vec![
            create_table("appx", "0001", "users", &[]),
            create_table("appy", "0001", "orders", &[("appx", "0001")]),
        ];
        let executor = executor_with(&temp, &["appx", "appy"], migrations).await;

        let plan = executor
            .migration_plan(&[
                MigrationTarget::new("appx", "0001"),
                MigrationTarget::new("appy", "0001"),
            ])
            .unwrap();

        // appx.0001 は最初のターゲットで計画済みなので重複しない
        assert_eq!(
            plan,
            vec![
                PlanEntry::forwards(key("appx", "0001")),
                PlanEntry::forwards(key("appy", "0001")),
            ]
        );
    }

    #[tokio::test]
    async fn test_conflict_blocks_planning() {
        let temp = TempDir::new().unwrap();
        let migrations = vec![
            create_table("appx", "0001", "users", &[]),
            create_table("appx", "0002_a", "a", &[("appx", "0001")]),
            create_table("appx", "0002_b", "b", &[("appx", "0001")]),
        ];
        let executor = executor_with(&temp, &["appx"], migrations).await;

        let err = executor
            .migration_plan(&[MigrationTarget::new("appx", "0001")])
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_unknown_target_is_lookup_error() {
        let temp = TempDir::new().unwrap();
        let executor = executor_with(&temp, &["appx"], two_step_app()).await;

        let err = executor
            .migration_plan(&[MigrationTarget::new("appx", "0009")])
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Lookup(LookupError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_migrate_forward_executes_ddl_and_records() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0002")], None, false)
            .await
            .unwrap();

        let tables = executor
            .introspector
            .get_table_names(&executor.pool)
            .await
            .unwrap();
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"profiles".to_string()));

        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert!(applied.contains(&key("appx", "0001")));
        assert!(applied.contains(&key("appx", "0002")));
    }

    #[tokio::test]
    async fn test_migrate_zero_drops_tables_and_clears_ledger() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0002")], None, false)
            .await
            .unwrap();
        executor
            .migrate(&[MigrationTarget::zero("appx")], None, false)
            .await
            .unwrap();

        let tables = executor
            .introspector
            .get_table_names(&executor.pool)
            .await
            .unwrap();
        assert!(!tables.contains(&"users".to_string()));

        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert!(applied.is_empty());
        assert!(executor.loader.applied_migrations.is_empty());
    }

    #[tokio::test]
    async fn test_fake_apply_records_without_ddl() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0002")], None, true)
            .await
            .unwrap();

        let tables = executor
            .introspector
            .get_table_names(&executor.pool)
            .await
            .unwrap();
        // DDLは実行されないのでテーブルは存在しない
        assert!(!tables.contains(&"users".to_string()));

        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert_eq!(applied.len(), 2);
    }

    #[tokio::test]
    async fn test_soft_applied_migration_is_recorded_without_ddl() {
        let temp = TempDir::new().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let progress = RecordingProgress {
            events: Arc::clone(&events),
        };

        let pool = sqlite_pool(&temp).await;
        // 台帳導入前に手で作られたテーブルを再現する
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        let loader = loader_with(&["appx"], vec![create_table("appx", "0001", "users", &[])]);
        let mut executor = MigrationExecutor::new(pool, Dialect::SQLite, loader)
            .with_progress(Box::new(progress));
        executor.bootstrap().await.unwrap();

        executor
            .migrate(&[MigrationTarget::new("appx", "0001")], None, false)
            .await
            .unwrap();

        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert!(applied.contains(&key("appx", "0001")));

        // 進捗イベントはfake=trueで報告される
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(_, _, fake)| *fake));
    }

    #[tokio::test]
    async fn test_irreversible_unapply_fails_before_mutation() {
        let temp = TempDir::new().unwrap();
        let mut m = Migration::new("appx", "0001");
        m.operations = vec![Operation::RunSql {
            up: "CREATE TABLE users (id INTEGER)".to_string(),
            down: None,
            atomic: true,
        }];
        let mut executor = executor_with(&temp, &["appx"], vec![m]).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0001")], None, false)
            .await
            .unwrap();

        let err = executor
            .migrate(&[MigrationTarget::zero("appx")], None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::IrreversibleOperation { .. }));

        // 台帳もテーブルも変化していない
        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert!(applied.contains(&key("appx", "0001")));
        let tables = executor
            .introspector
            .get_table_names(&executor.pool)
            .await
            .unwrap();
        assert!(tables.contains(&"users".to_string()));
    }

    #[tokio::test]
    async fn test_squash_apply_records_replaced_keys() {
        let temp = TempDir::new().unwrap();
        let mut squash = create_table("appx", "0001_squashed", "users", &[]);
        squash.replaces = vec![key("appx", "0001"), key("appx", "0002")];

        let migrations = vec![
            create_table("appx", "0001", "users", &[]),
            create_table("appx", "0002", "profiles", &[("appx", "0001")]),
            squash,
        ];
        let mut executor = executor_with(&temp, &["appx"], migrations).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0001_squashed")], None, false)
            .await
            .unwrap();

        // 台帳には置き換えられたキーが記録される
        let applied = executor.recorder.applied_set(&executor.pool).await.unwrap();
        assert!(applied.contains(&key("appx", "0001")));
        assert!(applied.contains(&key("appx", "0002")));
        assert!(!applied.contains(&key("appx", "0001_squashed")));

        // ローカル集合ではスカッシュ単位も適用済み
        assert!(executor
            .loader
            .applied_migrations
            .contains(&key("appx", "0001_squashed")));
    }

    #[tokio::test]
    async fn test_collect_sql_does_not_touch_backend() {
        let temp = TempDir::new().unwrap();
        let executor = executor_with(&temp, &["appx"], two_step_app()).await;

        let plan = executor
            .migration_plan(&[MigrationTarget::new("appx", "0002")])
            .unwrap();
        let sql = executor.collect_sql(&plan).await.unwrap();

        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("CREATE TABLE users"));
        assert!(sql[1].contains("CREATE TABLE profiles"));

        let tables = executor
            .introspector
            .get_table_names(&executor.pool)
            .await
            .unwrap();
        assert!(!tables.contains(&"users".to_string()));
    }

    #[tokio::test]
    async fn test_project_state_reflects_applied_units() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor_with(&temp, &["appx"], two_step_app()).await;

        executor
            .migrate(&[MigrationTarget::new("appx", "0001")], None, false)
            .await
            .unwrap();

        let state = executor.project_state().unwrap();
        assert!(state.has_table("users"));
        assert!(!state.has_table("profiles"));
    }

    #[test]
    fn test_soft_applied_requires_all_created_tables() {
        let migration = create_table("appx", "0001", "users", &[]);

        let mut existing = BTreeSet::new();
        assert!(!soft_applied(&migration, &existing));

        existing.insert("users".to_string());
        assert!(soft_applied(&migration, &existing));

        // 操作を持たない単位はソフト適用にならない
        let empty = Migration::new("appx", "0002");
        assert!(!soft_applied(&empty, &existing));
    }
}
