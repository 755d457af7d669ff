use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::{Config, Result};
use crate::db::DbService;
use crate::services::LedgerStore;
use crate::utils::{Clock, SystemClock};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | pool | SqlitePool | SQLite 连接池 |
/// | ledger | Arc<LedgerStore> | 积分账本 |
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 连接池
    pub pool: SqlitePool,
    /// 积分账本 (Arc 共享所有权)
    pub ledger: Arc<LedgerStore>,
}

impl ServerState {
    /// 使用已有连接池和时钟构造状态
    ///
    /// 等级阈值配置无效时返回错误
    pub fn new(config: Config, pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        let policy = config.tier_policy()?;
        let ledger = LedgerStore::new(pool.clone(), clock, policy, config.ledger_settings());
        Ok(Self {
            config,
            pool,
            ledger: Arc::new(ledger),
        })
    }

    /// 初始化服务器状态
    ///
    /// 打开数据库 (执行迁移)，构建积分账本
    pub async fn initialize(config: &Config) -> Result<Self> {
        let db = DbService::new(&config.database_path).await?;
        let state = Self::new(config.clone(), db.pool, Arc::new(SystemClock))?;
        tracing::info!(
            environment = %config.environment,
            database = %config.database_path,
            allow_tier_demotion = config.allow_tier_demotion,
            max_attempts = config.ledger_max_attempts,
            "Server state initialized"
        );
        Ok(state)
    }

    /// 启动后台任务
    ///
    /// 定期清理空闲的会员锁
    pub fn start_background_tasks(&self) {
        let ledger = self.ledger.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
            loop {
                interval.tick().await;
                let pruned = ledger.prune_locks();
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned idle membership locks");
                }
            }
        });
    }
}
