use std::time::Duration;

use crate::dispatch::DispatchConfig;

/// 服务器配置 - 调度节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | REDIS_URL | (无，使用内存存储) | Redis 连接串 |
/// | MODEL_API_URL | http://localhost:8000 | 评分服务地址 |
/// | SCORE_TIMEOUT_MS | 800 | 单次评分请求超时(毫秒) |
/// | SCORE_ATTEMPTS | 3 | 评分总尝试次数 |
/// | LOCK_TTL_SECS | 30 | 骑手预订锁 TTL(秒) |
/// | MATCH_DEADLINE_MS | 5000 | 单笔订单撮合时限(毫秒) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// REDIS_URL=redis://localhost:6379 HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// Redis 连接串；缺省时使用内嵌内存存储（单实例/测试）
    pub redis_url: Option<String>,
    /// 评分服务根地址
    pub model_api_url: String,
    /// 单次评分请求超时(毫秒)
    pub score_timeout_ms: u64,
    /// 评分总尝试次数（含首次）
    pub score_attempts: u32,
    /// 骑手预订锁 TTL(秒)
    pub lock_ttl_secs: u64,
    /// 单笔订单撮合时限(毫秒)
    pub match_deadline_ms: u64,
    /// 待决 offer 方案的存活时间(秒)
    pub plan_ttl_secs: u64,

    // === 候选召回配置 ===
    /// 召回满足该数量即停止扩环
    pub min_candidates: usize,
    /// 单笔订单候选上限
    pub max_candidates: usize,
    /// 最大扩环半径（环数）
    pub max_ring: u32,

    // === 特征与冷启动配置 ===
    /// 需求统计滑动窗口(秒)
    pub demand_window_secs: u64,
    /// 全局平均接单率（冷启动先验均值）
    pub global_mean_accept_rate: f64,
    /// 先验强度（虚拟观测次数）
    pub prior_strength: f64,
    /// 疲劳度过滤阈值
    pub fatigue_cap: f64,

    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: env_parsed("HTTP_PORT", 3000),
            redis_url: std::env::var("REDIS_URL").ok(),
            model_api_url: std::env::var("MODEL_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            score_timeout_ms: env_parsed("SCORE_TIMEOUT_MS", 800),
            score_attempts: env_parsed("SCORE_ATTEMPTS", 3),
            lock_ttl_secs: env_parsed("LOCK_TTL_SECS", 30),
            match_deadline_ms: env_parsed("MATCH_DEADLINE_MS", 5000),
            plan_ttl_secs: env_parsed("PLAN_TTL_SECS", 600),
            min_candidates: env_parsed("MIN_CANDIDATES", 5),
            max_candidates: env_parsed("MAX_CANDIDATES", 100),
            max_ring: env_parsed("MAX_RING", 5),
            demand_window_secs: env_parsed("DEMAND_WINDOW_SECS", 3600),
            global_mean_accept_rate: env_parsed("GLOBAL_MEAN_ACCEPT_RATE", 0.60),
            prior_strength: env_parsed("PRIOR_STRENGTH", 20.0),
            fatigue_cap: env_parsed("FATIGUE_CAP", 0.95),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 调度编排器的配置子集
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            min_candidates: self.min_candidates,
            max_candidates: self.max_candidates,
            score_attempts: self.score_attempts,
            match_deadline: Duration::from_millis(self.match_deadline_ms),
            plan_ttl: Duration::from_secs(self.plan_ttl_secs),
            global_mean_accept_rate: self.global_mean_accept_rate,
            prior_strength: self.prior_strength,
            fatigue_cap: self.fatigue_cap,
        }
    }

    pub fn score_timeout(&self) -> Duration {
        Duration::from_millis(self.score_timeout_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn demand_window(&self) -> Duration {
        Duration::from_secs(self.demand_window_secs)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
