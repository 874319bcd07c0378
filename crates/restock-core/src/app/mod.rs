//! App - アプリケーション層
//!
//! ports を組み合わせて再入荷通知のロジックを実装する。
//!
//! # 主要コンポーネント
//! - **PollLoopBuilder**: poll loop の構築とワイヤリング
//! - **PollLoop**: fetch → merge → detect → drain → report の繰り返し
//! - **RestockDetector**: pending な variant の在庫判定
//! - **SenderLoop**: DispatchQueue から EmailJob を取り出して送る
//! - **CycleReport**: サイクルごとのステータス

pub mod builder;
pub mod detector;
pub mod poll_loop;
pub mod sender_loop;
pub mod status;

pub use self::builder::{BuildError, PollLoopBuilder};
pub use self::detector::{Detection, LookupFailure, RestockDetector, Restocked};
pub use self::poll_loop::{Phase, PollLoop};
pub use self::sender_loop::{SenderHandle, SenderLoop, SenderStats};
pub use self::status::CycleReport;
