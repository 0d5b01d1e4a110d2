// Laminaコアライブラリのエントリーポイント
//
// マイグレーション依存グラフと実行計画の純粋なドメインロジックを提供する。
// I/Oやデータベースアクセスは lamina-db crate 側の責務。

pub mod core;
