//! Ports - 外部システムへの抽象化レイヤー
//!
//! 各 trait は外部の協調者（Notification Store, Inventory Service,
//! Email Sender, 時計）へのインターフェースを提供し、実装の詳細を隠蔽します。
//! 実装は `impls` に置きます。

pub mod clock;
pub mod email_sender;
pub mod inventory;
pub mod notification_source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::email_sender::EmailSender;
pub use self::inventory::InventoryService;
pub use self::notification_source::NotificationSource;
