// スキーマエディター
//
// 単一マイグレーション単位のDDL実行をスコープするラッパー。
// 原子モードではトランザクション内で実行し、コミットされずにドロップされた
// 場合はバックエンド側でロールバックされます。収集モードでは実行せずに
// SQLを蓄積し、ドライラン・計画表示に使用します。

use crate::core::error::DatabaseError;
use sqlx::{Any, AnyPool, Transaction};

/// DDL実行先
#[derive(Debug)]
enum Target {
    /// トランザクション内で実行（原子的な単位）
    Transaction(Transaction<'static, Any>),
    /// プールに直接実行（非原子的な操作を含む単位）
    Pool(AnyPool),
    /// 実行せずに収集のみ（ドライラン）
    CollectOnly,
}

/// スキーマエディター
///
/// 実行したSQLはモードに関わらず `collected_sql` に蓄積されます。
#[derive(Debug)]
pub struct SchemaEditor {
    target: Target,
    collected_sql: Vec<String>,
}

impl SchemaEditor {
    /// マイグレーション単位のスコープを開始
    ///
    /// `atomic` がtrueの場合はトランザクションを開始し、falseの場合は
    /// プールへ直接実行します（トランザクショナルDDLを持たない操作向け）。
    pub async fn begin(pool: &AnyPool, atomic: bool) -> Result<Self, DatabaseError> {
        let target = if atomic {
            let tx = pool.begin().await.map_err(|e| DatabaseError::Connection {
                message: "Failed to begin schema transaction".to_string(),
                cause: e.to_string(),
            })?;
            Target::Transaction(tx)
        } else {
            Target::Pool(pool.clone())
        };

        Ok(Self {
            target,
            collected_sql: Vec::new(),
        })
    }

    /// 収集のみのエディターを作成（バックエンドに接続しない）
    pub fn collect_only() -> Self {
        Self {
            target: Target::CollectOnly,
            collected_sql: Vec::new(),
        }
    }

    /// DDLを実行
    pub async fn execute(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.collected_sql.push(sql.to_string());

        match &mut self.target {
            Target::Transaction(tx) => {
                sqlx::query(sql)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| DatabaseError::Query {
                        message: format!("Schema change failed: {}", e),
                        sql: Some(sql.to_string()),
                    })?;
            }
            Target::Pool(pool) => {
                sqlx::query(sql)
                    .execute(&*pool)
                    .await
                    .map_err(|e| DatabaseError::Query {
                        message: format!("Schema change failed: {}", e),
                        sql: Some(sql.to_string()),
                    })?;
            }
            Target::CollectOnly => {}
        }

        Ok(())
    }

    /// 蓄積されたSQLを返す
    pub fn collected_sql(&self) -> &[String] {
        &self.collected_sql
    }

    /// スコープを閉じて変更を確定し、蓄積されたSQLを返す
    ///
    /// トランザクションモードではコミットします。コミットせずにドロップ
    /// された場合、未確定の変更はロールバックされます。
    pub async fn commit(self) -> Result<Vec<String>, DatabaseError> {
        if let Target::Transaction(tx) = self.target {
            tx.commit().await.map_err(|e| DatabaseError::Query {
                message: format!("Failed to commit schema transaction: {}", e),
                sql: None,
            })?;
        }
        Ok(self.collected_sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_only_editor_accumulates_without_backend() {
        let mut editor = SchemaEditor::collect_only();

        editor.execute("CREATE TABLE users (id INTEGER)").await.unwrap();
        editor.execute("DROP TABLE users").await.unwrap();

        assert_eq!(
            editor.collected_sql(),
            &[
                "CREATE TABLE users (id INTEGER)".to_string(),
                "DROP TABLE users".to_string(),
            ]
        );

        let collected = editor.commit().await.unwrap();
        assert_eq!(collected.len(), 2);
    }
}
