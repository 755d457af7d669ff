//! Loyalty Ledger Server - 酒店集团会员积分账本
//!
//! # 架构概述
//!
//! - **账本核心** (`loyalty`): 赚取、兑换、调整、过期、等级计算、账户关联
//! - **账本存储** (`services`): 按会员加锁 + 乐观版本号的并发安全存储
//! - **数据库** (`db`): 嵌入式 SQLite (sqlx)
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! loyalty-server/src/
//! ├── core/          # 配置、状态、错误、服务器
//! ├── loyalty/       # 纯账本逻辑 (无 I/O)
//! ├── services/      # LedgerStore、会员锁
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 时钟、日志、校验
//! └── db/            # 数据库层
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod loyalty;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use loyalty::{LedgerError, LedgerResult};
pub use services::{LedgerSettings, LedgerStore};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

/// 设置运行环境
///
/// 1. 加载 `.env` (不存在时忽略)
/// 2. 从环境变量构建 [`Config`]
/// 3. 按配置中的日志级别、格式与目录初始化日志
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    __                    ____
   / /   ____  __  ______/ / /___  __
  / /   / __ \/ / / / __ `/ / __ \/ /
 / /___/ /_/ / /_/ / /_/ / / /_/ / /
/_____/\____/\__, /\__,_/_/\__, /_/
            /____/        /____/
    Loyalty Ledger v{}
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
