// マイグレーションストレージ
//
// アプリケーションごとのマイグレーション単位の発見を抽象化する
// ストレージプロバイダー。ファイルシステムの配置規約をグラフ・実行系から
// 完全に分離します。「マイグレーションなし」とストレージエラーは
// 明確に区別されます。

use crate::core::migration::{Migration, NodeKey, FIRST_MIGRATION, LATEST_MIGRATION};
use crate::core::operation::Operation;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// アプリケーション単位の発見結果
#[derive(Debug, Clone)]
pub enum AppMigrations {
    /// マイグレーションディレクトリが存在しない（未マイグレーションアプリ）
    NoMigrations,
    /// 発見された単位（名前順）
    Migrations(Vec<Migration>),
}

/// マイグレーションストレージインターフェース
///
/// アプリケーション識別子から、そのアプリケーションで利用可能な
/// マイグレーション単位の順序付きリストを返します。
pub trait MigrationStorage: Send + Sync {
    /// 指定アプリケーションのマイグレーション単位を列挙
    fn load_app(&self, app_label: &str) -> Result<AppMigrations>;
}

/// マイグレーションファイルのDTO
///
/// `<root>/<app>/<name>.yaml` に保存されるYAMLドキュメントに対応します。
/// ファイル名の拡張子を除いた部分がマイグレーション名になります。
#[derive(Debug, Clone, Deserialize)]
struct MigrationFileDto {
    #[serde(default)]
    operations: Vec<Operation>,
    #[serde(default)]
    dependencies: Vec<NodeKey>,
    #[serde(default)]
    run_before: Vec<NodeKey>,
    #[serde(default)]
    replaces: Vec<NodeKey>,
}

/// ファイルシステムストレージ
///
/// ディレクトリ構成: `<root>/<app_label>/<migration_name>.yaml`
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// 新しいFilesystemStorageを作成
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MigrationStorage for FilesystemStorage {
    fn load_app(&self, app_label: &str) -> Result<AppMigrations> {
        let app_dir = self.root.join(app_label);

        // ディレクトリ不在は「未マイグレーション」であってエラーではない
        if !app_dir.is_dir() {
            return Ok(AppMigrations::NoMigrations);
        }

        let entries = fs::read_dir(&app_dir)
            .with_context(|| format!("Failed to read migrations directory: {:?}", app_dir))?;

        let mut migrations: BTreeMap<String, Migration> = BTreeMap::new();

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Invalid file name in {:?}", app_dir))?;

            // .で始まるファイルはスキップ
            if file_name.starts_with('.') {
                continue;
            }

            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if !is_yaml {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Invalid migration file name: {}", file_name))?
                .to_string();

            if name == FIRST_MIGRATION || name == LATEST_MIGRATION {
                return Err(anyhow!(
                    "Migration name '{}' is reserved (app '{}')",
                    name,
                    app_label
                ));
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read migration file: {:?}", path))?;

            let dto: MigrationFileDto = serde_saphyr::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse migration file {:?}: {}", path, e))?;

            let migration = Migration {
                app_label: app_label.to_string(),
                name: name.clone(),
                operations: dto.operations,
                dependencies: dto.dependencies,
                run_before: dto.run_before,
                replaces: dto.replaces,
            };

            if migrations.insert(name.clone(), migration).is_some() {
                return Err(anyhow!(
                    "Duplicate migration name '{}' in app '{}'",
                    name,
                    app_label
                ));
            }
        }

        Ok(AppMigrations::Migrations(migrations.into_values().collect()))
    }
}

/// インメモリストレージ
///
/// テストや組み込み用途向けに、マイグレーション単位をメモリ上に保持します。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    apps: BTreeMap<String, Vec<Migration>>,
    failing_apps: Vec<String>,
}

impl MemoryStorage {
    /// 空のMemoryStorageを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// マイグレーションを追加（app_labelで自動的に分類される）
    pub fn add(&mut self, migration: Migration) {
        self.apps
            .entry(migration.app_label.clone())
            .or_default()
            .push(migration);
    }

    /// 指定アプリケーションの読み込みを失敗させる（エラーパスのテスト用）
    pub fn fail_for(&mut self, app_label: impl Into<String>) {
        self.failing_apps.push(app_label.into());
    }
}

impl MigrationStorage for MemoryStorage {
    fn load_app(&self, app_label: &str) -> Result<AppMigrations> {
        if self.failing_apps.iter().any(|a| a == app_label) {
            return Err(anyhow!("Simulated storage failure for app '{}'", app_label));
        }

        match self.apps.get(app_label) {
            Some(migrations) => {
                let mut migrations = migrations.clone();
                migrations.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(AppMigrations::Migrations(migrations))
            }
            None => Ok(AppMigrations::NoMigrations),
        }
    }
}
