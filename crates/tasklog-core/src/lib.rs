//! tasklog-core
//!
//! Task lifecycle logging for queue frameworks: every job's enqueue, dequeue,
//! completion, exception and failure is written as one record to a pluggable
//! backend and can be read back by type, job or free text.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job, record, errors）
//! - **ports**: 抽象化レイヤー（LogWriter, LogReader, Clock, LifecycleHooks）
//! - **impls**: バックエンド実装（Memory, File, Elasticsearch）
//! - **app**: フック → レコード変換（TaskLogsMiddleware, StubBroker）
//! - **config**: バックエンド設定（YAML + 環境変数）
//! - **observability**: 種類別の件数

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
