// Adapters
// データベースへのアクセスを抽象化

pub mod connection_string;
pub mod database;
pub mod introspector;
pub mod recorder;
pub mod schema_editor;
