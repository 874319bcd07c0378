//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryNotificationSource / InMemoryInventory**: テスト用
//! - **FixtureBackend**: JSON ファイルを毎回読み直す開発用バックエンド（CLI で使用）
//! - **CachingInventory**: Product の短期キャッシュ（variant の在庫数はキャッシュしない）
//! - **LogEmailSender**: 送信せずログに出すだけの EmailSender

pub mod fixture;
pub mod log_sender;
pub mod memory;
pub mod product_cache;

pub use self::fixture::{FixtureBackend, FixtureFile};
pub use self::log_sender::LogEmailSender;
pub use self::memory::{InMemoryInventory, InMemoryNotificationSource};
pub use self::product_cache::CachingInventory;
