// Core Domain
// マイグレーション単位、依存グラフ、実行計画の純粋なビジネスロジック

pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod migration;
pub mod operation;
pub mod state;
