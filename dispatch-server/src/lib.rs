//! Dispatch Server - 实时配送订单调度节点
//!
//! # 架构概述
//!
//! 一笔订单的完整流程：
//!
//! 1. **地理召回** (`geo`): H3 六边形索引逐环扩张检索附近骑手
//! 2. **状态水合与过滤** (`fleet`, `dispatch::filters`): 车型/状态/疲劳度筛选
//! 3. **评分** (`scoring`): 批量调用外部接受率模型，冷启动贝叶斯平滑
//! 4. **排序与报价** (`dispatch`): 按概率贪心遍历，分布式锁预订骑手
//! 5. **状态回写** (`dispatch::updater`): 异步消费接/拒单与行程事件
//!
//! # 模块结构
//!
//! ```text
//! dispatch-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── store/         # 共享存储抽象 (Redis / 内存)
//! ├── geo/           # H3 地理索引
//! ├── demand/        # 按 cell 的需求计数
//! ├── fleet/         # 骑手档案/状态仓储
//! ├── scoring/       # 评分边界与冷启动平滑
//! ├── dispatch/      # 编排器、锁、序列、过滤器、更新器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod core;
pub mod demand;
pub mod dispatch;
pub mod fleet;
pub mod geo;
pub mod metrics;
pub mod scoring;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    utils::logger::init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
    ____  _                  __       __
   / __ \(_)________  ____ _/ /______/ /_
  / / / / / ___/ __ \/ __ `/ __/ ___/ __ \
 / /_/ / (__  ) /_/ / /_/ / /_/ /__/ / / /
/_____/_/____/ .___/\__,_/\__/\___/_/ /_/
            /_/
    "#
    );
}
