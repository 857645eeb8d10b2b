use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::tasks::BackgroundTasks;
use crate::core::Config;
use crate::demand::DemandCounter;
use crate::dispatch::{filters, CourierEvent, LockManager, Orchestrator, StateUpdater};
use crate::fleet::FleetRepository;
use crate::geo::GeoIndex;
use crate::scoring::HttpScorer;
use crate::store::{MemoryStore, RedisStore, StoreBackend};

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。调度节点本身无共享可变状态，
/// 跨订单协调全部经由存储层的原子操作完成。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc\<dyn StoreBackend\> | 共享存储 (Redis 或内嵌内存) |
/// | geo | Arc\<GeoIndex\> | 骑手地理索引 |
/// | fleet | Arc\<FleetRepository\> | 骑手档案/状态仓储 |
/// | orchestrator | Arc\<Orchestrator\> | 调度编排器 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 共享存储
    pub store: Arc<dyn StoreBackend>,
    /// 骑手地理索引
    pub geo: Arc<GeoIndex>,
    /// 骑手仓储
    pub fleet: Arc<FleetRepository>,
    /// 调度编排器
    pub orchestrator: Arc<Orchestrator>,
    /// 待启动的状态更新 worker（start_background_tasks 时取走）
    updater: Arc<Mutex<Option<(StateUpdater, UnboundedReceiver<CourierEvent>)>>>,
    /// 运行中的后台任务
    tasks: Arc<tokio::sync::Mutex<Option<BackgroundTasks>>>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：存储（REDIS_URL 缺省时为内嵌内存存储）、地理索引、
    /// 需求计数器、骑手仓储、评分客户端、锁管理器、编排器。
    ///
    /// # Panics
    ///
    /// Redis 连接或 HTTP 客户端构建失败时 panic（启动期依赖，无法降级）
    pub async fn initialize(config: &Config) -> Self {
        let store: Arc<dyn StoreBackend> = match &config.redis_url {
            Some(url) => {
                tracing::info!(url = %url, "connecting to redis");
                Arc::new(RedisStore::connect(url).expect("Failed to connect to Redis"))
            }
            None => {
                tracing::warn!("REDIS_URL not set, using embedded in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let geo = Arc::new(GeoIndex::new(store.clone(), config.max_ring));
        let demand = Arc::new(DemandCounter::new(store.clone(), config.demand_window()));
        let fleet = Arc::new(FleetRepository::new(
            store.clone(),
            config.global_mean_accept_rate,
        ));
        let scorer = Arc::new(
            HttpScorer::new(&config.model_api_url, config.score_timeout())
                .expect("Failed to build scoring client"),
        );
        let locks = Arc::new(LockManager::new(store.clone(), config.lock_ttl()));

        let (events, receiver) = StateUpdater::channel();
        let updater = StateUpdater::new(
            fleet.clone(),
            config.global_mean_accept_rate,
            config.prior_strength,
        );

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            geo.clone(),
            demand,
            fleet.clone(),
            scorer,
            locks,
            filters::default_filters(config.fatigue_cap),
            events,
            config.dispatch(),
        ));

        Self {
            config: config.clone(),
            store,
            geo,
            fleet,
            orchestrator,
            updater: Arc::new(Mutex::new(Some((updater, receiver)))),
            tasks: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// 启动后台任务（状态更新 worker）
    ///
    /// 幂等：重复调用时第二次为空操作。
    pub async fn start_background_tasks(&self) {
        let Some((updater, receiver)) = self.updater.lock().take() else {
            return;
        };

        let mut tasks = BackgroundTasks::new();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("state_updater", async move {
            updater.run(receiver, shutdown).await;
        });
        tracing::info!("Background tasks started: {}", tasks.len());

        *self.tasks.lock().await = Some(tasks);
    }

    /// 停止后台任务
    pub async fn shutdown_background_tasks(&self) {
        if let Some(tasks) = self.tasks.lock().await.take() {
            tasks.shutdown().await;
        }
    }
}
