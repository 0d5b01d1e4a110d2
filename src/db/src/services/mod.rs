// Services Layer
// マイグレーションの発見、グラフ組み立て、実行計画のオーケストレーション

pub mod executor;
pub mod loader;
pub mod storage;
