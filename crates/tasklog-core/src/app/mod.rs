//! App - アプリケーション層
//!
//! ports を組み合わせて、キューフレームワークのフックをログ書き込みに変換します。
//!
//! # 主要コンポーネント
//! - **TaskLogsMiddleware**: `LifecycleHooks` の実装（フック → レコード）
//! - **policy**: `log` オプションによるオプトアウト判定
//! - **StubBroker**: テスト・デモ用のフレームワーク代替

pub mod broker;
pub mod middleware;
pub mod policy;

#[cfg(test)]
mod scenarios;

// 主要な型を再エクスポート
pub use self::broker::{Actor, ActorHandler, StubBroker};
pub use self::middleware::{NackRecord, TaskLogsMiddleware};
