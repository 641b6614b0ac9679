//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（検索エンジン、ファイル、キューフレームワーク）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod backend;
pub mod clock;
pub mod lifecycle;

// 主要な trait を再エクスポート
pub use self::backend::{LogBackend, LogReader, LogWriter};
pub use self::clock::{Clock, FixedClock, SystemClock, TickingClock};
pub use self::lifecycle::{ActorInfo, BrokerContext, HandlerError, LifecycleHooks, Message};
