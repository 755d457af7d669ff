use crate::loyalty::{LedgerResult, TierPolicy, TierTable};
use crate::services::LedgerSettings;

/// 服务器配置 - 积分账本服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DATABASE_PATH | {WORK_DIR}/database/loyalty.db | SQLite 数据库文件 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志文件目录 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | LEDGER_MAX_ATTEMPTS | 5 | 乐观锁最大尝试次数 |
/// | POINTS_EXPIRATION_MONTHS | 12 | 积分默认有效期 (月) |
/// | TIER_THRESHOLDS | 0,1000,5000,10000 | 各等级最低等级积分 |
/// | ALLOW_TIER_DEMOTION | false | 是否允许降级 |
/// | SWEEP_CONCURRENCY | 8 | 过期扫描并发数 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/loyalty HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// SQLite 数据库路径
    pub database_path: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 日志 ===
    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_json: bool,

    // === 积分账本 ===
    /// 每次操作的最大尝试次数 (加载-修改-保存)
    pub ledger_max_attempts: u32,
    /// 积分批次默认有效期 (月)
    pub points_expiration_months: u32,
    /// 等级阈值，逗号分隔，依次对应 Bronze/Silver/Gold/Platinum
    pub tier_thresholds: String,
    /// 等级积分减少时是否降级
    pub allow_tier_demotion: bool,
    /// 全量过期扫描时并行处理的会员数
    pub sweep_concurrency: usize,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| format!("{work_dir}/database/loyalty.db")),
            work_dir,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),

            ledger_max_attempts: std::env::var("LEDGER_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            points_expiration_months: std::env::var("POINTS_EXPIRATION_MONTHS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12),
            tier_thresholds: std::env::var("TIER_THRESHOLDS")
                .unwrap_or_else(|_| "0,1000,5000,10000".into()),
            allow_tier_demotion: std::env::var("ALLOW_TIER_DEMOTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            sweep_concurrency: std::env::var("SWEEP_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.database_path = format!("{}/database/loyalty.db", config.work_dir);
        config.http_port = http_port;
        config
    }

    /// 解析等级阈值并组合降级策略
    pub fn tier_policy(&self) -> LedgerResult<TierPolicy> {
        let table = TierTable::parse(&self.tier_thresholds)?;
        Ok(TierPolicy::new(table, self.allow_tier_demotion))
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            max_attempts: self.ledger_max_attempts.max(1),
            default_expiration_months: self.points_expiration_months.max(1),
            sweep_concurrency: self.sweep_concurrency.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Tier;

    #[test]
    fn test_overrides_derive_database_path() {
        let config = Config::with_overrides("/tmp/loyalty-test", 4000);
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.database_path, "/tmp/loyalty-test/database/loyalty.db");
    }

    #[test]
    fn test_tier_policy_from_thresholds() {
        let mut config = Config::with_overrides("/tmp/loyalty-test", 4000);
        config.tier_thresholds = "0,100,200".into();
        config.allow_tier_demotion = true;
        let policy = config.tier_policy().unwrap();
        assert!(policy.allow_demotion);
        assert_eq!(policy.table.tier_for(150), Tier::Silver);

        config.tier_thresholds = "10,100".into();
        assert!(config.tier_policy().is_err());
    }

    #[test]
    fn test_ledger_settings_floor() {
        let mut config = Config::with_overrides("/tmp/loyalty-test", 4000);
        config.ledger_max_attempts = 0;
        config.sweep_concurrency = 0;
        let settings = config.ledger_settings();
        assert_eq!(settings.max_attempts, 1);
        assert_eq!(settings.sweep_concurrency, 1);
    }
}
