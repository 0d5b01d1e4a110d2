// Laminaデータベースレイヤーのエントリーポイント
//
// バックエンドへのアクセス（adapters）と、ローダー・エグゼキューターの
// オーケストレーション（services）を提供する。コアのドメイン型は
// lamina-core から再公開し、既存のパス互換を保つ。

pub use lamina_core::core;

pub mod adapters;
pub mod services;
