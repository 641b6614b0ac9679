//! Impls - バックエンド実装
//!
//! # 含まれる実装
//! - **MemoryBackend**: テスト・開発用（プロセス内のみ）
//! - **FileBackend**: 追記専用 JSON Lines ファイル
//! - **ElasticsearchBackend**: 本番用、期間インデックス + index template

pub mod elastic;
pub mod file;
pub mod memory;

// 主要な型を再エクスポート
pub use self::elastic::{ElasticConfig, ElasticsearchBackend};
pub use self::file::FileBackend;
pub use self::memory::MemoryBackend;
