// ==========================================
// 定制水槽订单系统 - 订单业务接口
// ==========================================
// 职责: 订单创建/订单项添加/阶段迁移/历史查询
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{OrderItem, OrderStatusHistory, SalesOrder, TransitionResult};
use crate::domain::types::{Actor, OrderPhase, ProductionStatus};
use crate::engine::lifecycle::OrderLifecycleManager;
use crate::repository::{ActionLogRepository, OrderRepository};
use std::sync::Arc;
use tracing::info;

// ==========================================
// OrderApi - 订单业务接口
// ==========================================
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    lifecycle: Arc<OrderLifecycleManager>,
}

impl OrderApi {
    /// 创建新的OrderApi实例
    pub fn new(
        order_repo: Arc<OrderRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        lifecycle: Arc<OrderLifecycleManager>,
    ) -> Self {
        Self {
            order_repo,
            action_log_repo,
            lifecycle,
        }
    }

    /// 创建订单 (初始阶段 DRAFT)
    pub fn create_order(&self, order_no: &str, actor: &Actor) -> ApiResult<String> {
        let now = chrono::Utc::now().naive_utc();
        let order = SalesOrder {
            order_id: uuid::Uuid::new_v4().to_string(),
            order_no: order_no.to_string(),
            current_phase: OrderPhase::Draft,
            held_from_phase: None,
            phase_entered_at: now,
            actual_delivery_date: None,
            revision: 0,
            created_by: actor.name.clone(),
            created_at: now,
            updated_at: now,
        };

        self.order_repo.create_order(&order)?;

        let log = ActionLog::new(ActionType::CreateOrder, "Order", &order.order_id, &actor.name)
            .with_detail(format!("order_no={}", order_no));
        self.action_log_repo.insert(&log)?;

        info!(order_id = %order.order_id, order_no = %order_no, "订单已创建");
        Ok(order.order_id)
    }

    /// 为订单添加订单项
    ///
    /// 仅 DRAFT/CONFIGURATION 阶段允许
    pub fn add_order_item(&self, order_id: &str, assembly_id: &str) -> ApiResult<String> {
        let order = self
            .order_repo
            .find_order(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("SalesOrder(id={})不存在", order_id)))?;

        if !order.current_phase.allows_reconfiguration() {
            return Err(ApiError::Conflict(format!(
                "订单处于 {} 阶段, 不能再添加订单项",
                order.current_phase
            )));
        }

        let item = OrderItem {
            order_item_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            assembly_id: assembly_id.to_string(),
            configuration_id: None,
            active_bom_id: None,
            production_status: ProductionStatus::NotStarted,
        };
        self.order_repo.create_item(&item)?;

        info!(order_id = %order_id, order_item_id = %item.order_item_id, "订单项已添加");
        Ok(item.order_item_id)
    }

    /// 执行阶段迁移
    pub fn transition_phase(
        &self,
        order_id: &str,
        target: OrderPhase,
        actor: &Actor,
        reason: Option<String>,
    ) -> ApiResult<TransitionResult> {
        Ok(self.lifecycle.transition(order_id, target, actor, reason)?)
    }

    /// 查询订单
    pub fn get_order(&self, order_id: &str) -> ApiResult<SalesOrder> {
        self.order_repo
            .find_order(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("SalesOrder(id={})不存在", order_id)))
    }

    /// 查询订单项
    pub fn get_order_item(&self, order_item_id: &str) -> ApiResult<OrderItem> {
        self.order_repo
            .find_item(order_item_id)?
            .ok_or_else(|| ApiError::NotFound(format!("OrderItem(id={})不存在", order_item_id)))
    }

    /// 查询订单的阶段历史
    pub fn list_status_history(&self, order_id: &str) -> ApiResult<Vec<OrderStatusHistory>> {
        Ok(self.order_repo.find_history(order_id)?)
    }
}
