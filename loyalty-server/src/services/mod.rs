//! 服务模块
//!
//! - [`LedgerStore`] - 积分账本存储 (键解析、按键加锁、版本化保存)
//! - [`KeyedLocks`] - 按会员键的异步互斥锁

pub mod keyed_locks;
pub mod ledger_store;

pub use keyed_locks::KeyedLocks;
pub use ledger_store::{LedgerReceipt, LedgerSettings, LedgerStore, SweepReport};
