//! restock-core
//!
//! 再入荷通知サービスのコア。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, notification, catalog, email）
//! - **ports**: 外部依存の抽象化（NotificationSource, InventoryService, EmailSender, Clock）
//! - **impls**: 実装（in-memory, JSON fixture, product cache, log sender）
//! - **queue**: DispatchQueue（有界ブロッキングキュー）と RetryPolicy
//! - **app**: poll loop / detector / sender loop / status
//! - **dedup**, **pending**: poll loop が持つ状態
//! - **config**: 環境変数からの設定
//! - **error**: エラー型

pub mod app;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod impls;
pub mod pending;
pub mod ports;
pub mod queue;

#[cfg(test)]
mod testing;
