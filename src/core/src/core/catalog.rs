// アプリケーションカタログ
//
// 既知のアプリケーションラベルの不変スナップショット。
// グローバルレジストリの代わりに、ローダー構築時に明示的に渡されます。

/// アプリケーションカタログ
///
/// ラベルは登録順を保持し、重複は最初の一件のみが残ります。
/// 一度構築したら変更されない前提で、計画の実行ごとにスナップショットとして扱います。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    app_labels: Vec<String>,
}

impl Catalog {
    /// 新しいカタログを作成
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut app_labels: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !app_labels.contains(&label) {
                app_labels.push(label);
            }
        }
        Self { app_labels }
    }

    /// アプリケーションラベルの一覧を登録順で返す
    pub fn app_labels(&self) -> &[String] {
        &self.app_labels
    }

    /// 指定されたラベルがカタログに含まれるか確認
    pub fn contains(&self, app_label: &str) -> bool {
        self.app_labels.iter().any(|l| l == app_label)
    }

    /// 登録されているアプリケーション数
    pub fn len(&self) -> usize {
        self.app_labels.len()
    }

    /// カタログが空かどうか
    pub fn is_empty(&self) -> bool {
        self.app_labels.is_empty()
    }
}
