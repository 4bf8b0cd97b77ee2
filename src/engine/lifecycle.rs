// ==========================================
// 定制水槽订单系统 - 订单生命周期引擎
// ==========================================
// 职责: 阶段迁移表 + 角色权限表 + 同步副作用 + 追加历史
// 红线: 被拒绝的迁移不留任何状态变化与历史行
// 红线: 副作用 (生产任务/质检清单事件) 与迁移同事务, 绝不重复触发
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{OrderStatusHistory, SalesOrder, TransitionResult};
use crate::domain::types::{Actor, ActorRole, OrderPhase, ProductionStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{OrderEvent, OrderEventSink, OrderEventType};
use crate::repository::{ActionLogRepository, OrderRepository, RepositoryError};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// 迁移表与权限表
// ==========================================

/// 正向迁移表: 当前阶段 → 允许的下一阶段
///
/// 质检有两条出边: 合格进包装, 返工退回生产
fn forward_targets(from: OrderPhase) -> &'static [OrderPhase] {
    match from {
        OrderPhase::Draft => &[OrderPhase::Configuration],
        OrderPhase::Configuration => &[OrderPhase::Approval],
        OrderPhase::Approval => &[OrderPhase::Production],
        OrderPhase::Production => &[OrderPhase::QualityControl],
        OrderPhase::QualityControl => &[OrderPhase::Packaging, OrderPhase::Production],
        OrderPhase::Packaging => &[OrderPhase::Shipping],
        OrderPhase::Shipping => &[OrderPhase::Delivered],
        _ => &[],
    }
}

/// 角色权限表: 哪些角色可以把订单迁入目标阶段
fn authorized_roles(target: OrderPhase) -> &'static [ActorRole] {
    match target {
        OrderPhase::Draft => &[ActorRole::Sales, ActorRole::Admin],
        OrderPhase::Configuration => &[ActorRole::Sales, ActorRole::Admin],
        OrderPhase::Approval => &[ActorRole::Sales, ActorRole::Engineering, ActorRole::Admin],
        OrderPhase::Production => &[ActorRole::Planner, ActorRole::Quality, ActorRole::Admin],
        OrderPhase::QualityControl => &[
            ActorRole::Production,
            ActorRole::Quality,
            ActorRole::Admin,
        ],
        OrderPhase::Packaging => &[ActorRole::Quality, ActorRole::Admin],
        OrderPhase::Shipping => &[ActorRole::Logistics, ActorRole::Admin],
        OrderPhase::Delivered => &[ActorRole::Logistics, ActorRole::Admin],
        OrderPhase::OnHold => &[ActorRole::Sales, ActorRole::Planner, ActorRole::Admin],
        OrderPhase::Cancelled => &[ActorRole::Sales, ActorRole::Admin],
    }
}

// ==========================================
// OrderLifecycleManager - 生命周期引擎
// ==========================================
pub struct OrderLifecycleManager {
    conn: Arc<Mutex<Connection>>,
    event_sink: Arc<dyn OrderEventSink>,
}

impl OrderLifecycleManager {
    /// 创建新的生命周期引擎实例
    pub fn new(conn: Arc<Mutex<Connection>>, event_sink: Arc<dyn OrderEventSink>) -> Self {
        Self { conn, event_sink }
    }

    /// 迁移表检查 (纯函数)
    ///
    /// 全局边: 任何非终态可进 Cancelled / OnHold; OnHold 只能恢复到挂起前阶段或取消
    pub fn is_transition_allowed(order: &SalesOrder, target: OrderPhase) -> bool {
        let from = order.current_phase;
        if from == target || from.is_terminal() {
            return false;
        }
        match from {
            OrderPhase::OnHold => {
                order.held_from_phase == Some(target) || target == OrderPhase::Cancelled
            }
            _ => {
                target == OrderPhase::Cancelled
                    || target == OrderPhase::OnHold
                    || forward_targets(from).contains(&target)
            }
        }
    }

    /// 权限表检查 (纯函数)
    pub fn role_may_enter(role: ActorRole, target: OrderPhase) -> bool {
        authorized_roles(target).contains(&role)
    }

    /// 配置/BOM 可变更性检查
    ///
    /// Draft/Configuration 直接放行; 之后的阶段仅管理员显式覆盖可重新生成,
    /// 覆盖由调用方落单独的 AdminOverrideRegenerate 审计事件
    pub fn ensure_mutable(order: &SalesOrder, actor: &Actor, admin_override: bool) -> EngineResult<()> {
        if order.current_phase.allows_reconfiguration() {
            return Ok(());
        }
        if admin_override {
            if actor.role == ActorRole::Admin {
                return Ok(());
            }
            return Err(EngineError::Unauthorized {
                actor: actor.name.clone(),
                role: actor.role,
                target: order.current_phase,
            });
        }
        Err(EngineError::ConfigurationFrozen {
            phase: order.current_phase,
        })
    }

    /// 执行阶段迁移
    ///
    /// # 流程 (单事务)
    /// 1. 迁移表检查 → InvalidTransition
    /// 2. 权限表检查 → Unauthorized
    /// 3. 同步副作用: 进生产发生产任务事件 / 进质检发清单事件 / 交付盖章
    /// 4. 乐观锁更新订单阶段 (并发迁移由此序列化)
    /// 5. 追加不可变历史行 (含上一阶段停留时长) 与审计事件
    ///
    /// 任一步失败整体回滚: 状态/历史/副作用互相一致
    pub fn transition(
        &self,
        order_id: &str,
        target: OrderPhase,
        actor: &Actor,
        reason: Option<String>,
    ) -> EngineResult<TransitionResult> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let order = OrderRepository::find_order_tx(&tx, order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "SalesOrder".to_string(),
                id: order_id.to_string(),
            }
        })?;
        let from = order.current_phase;

        // ==========================================
        // 步骤1: 迁移表检查
        // ==========================================
        if !Self::is_transition_allowed(&order, target) {
            debug!(order_id = %order_id, %from, %target, "迁移不在迁移表中, 拒绝");
            return Err(EngineError::InvalidTransition { from, to: target });
        }

        // ==========================================
        // 步骤2: 权限表检查
        // ==========================================
        if !Self::role_may_enter(actor.role, target) {
            debug!(
                order_id = %order_id,
                actor = %actor.name,
                role = %actor.role,
                %target,
                "角色无权迁入目标阶段, 拒绝"
            );
            return Err(EngineError::Unauthorized {
                actor: actor.name.clone(),
                role: actor.role,
                target,
            });
        }

        let now = chrono::Utc::now().naive_utc();

        // ==========================================
        // 步骤3: 同步副作用
        // ==========================================
        let mut updated = order.clone();
        updated.current_phase = target;
        updated.held_from_phase = if target == OrderPhase::OnHold {
            Some(from)
        } else {
            None
        };
        updated.phase_entered_at = now;
        updated.updated_at = now;

        match target {
            OrderPhase::Production => {
                // 按订单项的激活 BOM 发生产任务事件, 并把项置为已下达
                let items = OrderRepository::find_items_by_order_tx(&tx, order_id)?;
                for item in &items {
                    self.publish(OrderEvent {
                        event_type: OrderEventType::EnteredProduction,
                        order_id: order_id.to_string(),
                        order_item_id: item.order_item_id.clone(),
                        active_bom_id: item.active_bom_id.clone(),
                    })?;
                    OrderRepository::set_item_production_status_tx(
                        &tx,
                        &item.order_item_id,
                        ProductionStatus::Released,
                    )?;
                }
            }
            OrderPhase::QualityControl => {
                let items = OrderRepository::find_items_by_order_tx(&tx, order_id)?;
                for item in &items {
                    self.publish(OrderEvent {
                        event_type: OrderEventType::EnteredQualityControl,
                        order_id: order_id.to_string(),
                        order_item_id: item.order_item_id.clone(),
                        active_bom_id: item.active_bom_id.clone(),
                    })?;
                }
            }
            OrderPhase::Delivered => {
                updated.actual_delivery_date = Some(now);
            }
            _ => {}
        }

        // ==========================================
        // 步骤4: 乐观锁更新阶段
        // ==========================================
        OrderRepository::update_phase_tx(&tx, &updated, order.revision)?;

        // ==========================================
        // 步骤5: 历史行 + 审计事件
        // ==========================================
        let history = OrderStatusHistory {
            history_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            from_phase: from,
            to_phase: target,
            actor: actor.name.clone(),
            transitioned_at: now,
            reason: reason.clone(),
            duration_in_prior_phase_s: (now - order.phase_entered_at).num_seconds().max(0),
        };
        OrderRepository::insert_history_tx(&tx, &history)?;

        let log = ActionLog::new(ActionType::PhaseTransition, "Order", order_id, &actor.name)
            .with_before(&serde_json::json!({ "phase": from.to_db_str() }))
            .with_after(&serde_json::json!({ "phase": target.to_db_str() }))
            .with_detail(reason.unwrap_or_default());
        ActionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            order_id = %order_id,
            %from,
            %target,
            actor = %actor.name,
            "阶段迁移完成"
        );

        Ok(TransitionResult {
            order_id: order_id.to_string(),
            from_phase: from,
            to_phase: target,
            transitioned_at: now,
            history_id: history.history_id,
        })
    }

    /// 事件投递 (失败即中止迁移事务)
    fn publish(&self, event: OrderEvent) -> EngineResult<()> {
        self.event_sink
            .publish(event)
            .map_err(|e| EngineError::EventSinkFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_in(phase: OrderPhase, held_from: Option<OrderPhase>) -> SalesOrder {
        let t = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        SalesOrder {
            order_id: "O-001".to_string(),
            order_no: "SO-20260101-001".to_string(),
            current_phase: phase,
            held_from_phase: held_from,
            phase_entered_at: t,
            actual_delivery_date: None,
            revision: 0,
            created_by: "tester".to_string(),
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn test_forward_chain_is_allowed() {
        let chain = [
            (OrderPhase::Draft, OrderPhase::Configuration),
            (OrderPhase::Configuration, OrderPhase::Approval),
            (OrderPhase::Approval, OrderPhase::Production),
            (OrderPhase::Production, OrderPhase::QualityControl),
            (OrderPhase::QualityControl, OrderPhase::Packaging),
            (OrderPhase::Packaging, OrderPhase::Shipping),
            (OrderPhase::Shipping, OrderPhase::Delivered),
        ];
        for (from, to) in chain {
            assert!(
                OrderLifecycleManager::is_transition_allowed(&order_in(from, None), to),
                "{} → {} 应该允许",
                from,
                to
            );
        }
    }

    #[test]
    fn test_skipping_phases_is_rejected() {
        // Draft 直接到 Production 必须被拒绝
        assert!(!OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Draft, None),
            OrderPhase::Production
        ));
        assert!(!OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Configuration, None),
            OrderPhase::Shipping
        ));
    }

    #[test]
    fn test_rework_edge() {
        assert!(OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::QualityControl, None),
            OrderPhase::Production
        ));
    }

    #[test]
    fn test_global_edges() {
        // 非终态 → Cancelled / OnHold
        assert!(OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Production, None),
            OrderPhase::Cancelled
        ));
        assert!(OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Shipping, None),
            OrderPhase::OnHold
        ));
        // 终态无出边
        assert!(!OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Cancelled, None),
            OrderPhase::Draft
        ));
        assert!(!OrderLifecycleManager::is_transition_allowed(
            &order_in(OrderPhase::Delivered, None),
            OrderPhase::Cancelled
        ));
    }

    #[test]
    fn test_on_hold_resumes_to_suspended_phase() {
        let held = order_in(OrderPhase::OnHold, Some(OrderPhase::Production));
        assert!(OrderLifecycleManager::is_transition_allowed(
            &held,
            OrderPhase::Production
        ));
        // 不能恢复到其他阶段
        assert!(!OrderLifecycleManager::is_transition_allowed(
            &held,
            OrderPhase::Packaging
        ));
        // 挂起中仍可取消
        assert!(OrderLifecycleManager::is_transition_allowed(
            &held,
            OrderPhase::Cancelled
        ));
    }

    #[test]
    fn test_role_permission_map() {
        // 进包装需要质检角色
        assert!(OrderLifecycleManager::role_may_enter(
            ActorRole::Quality,
            OrderPhase::Packaging
        ));
        assert!(!OrderLifecycleManager::role_may_enter(
            ActorRole::Logistics,
            OrderPhase::Packaging
        ));
        // 进生产需要计划员/质检(返工)/管理员
        assert!(OrderLifecycleManager::role_may_enter(
            ActorRole::Planner,
            OrderPhase::Production
        ));
        assert!(!OrderLifecycleManager::role_may_enter(
            ActorRole::Sales,
            OrderPhase::Production
        ));
        // 管理员全阶段可进
        for target in [
            OrderPhase::Configuration,
            OrderPhase::Approval,
            OrderPhase::Production,
            OrderPhase::QualityControl,
            OrderPhase::Packaging,
            OrderPhase::Shipping,
            OrderPhase::Delivered,
            OrderPhase::OnHold,
            OrderPhase::Cancelled,
        ] {
            assert!(OrderLifecycleManager::role_may_enter(ActorRole::Admin, target));
        }
    }

    #[test]
    fn test_ensure_mutable() {
        let sales = Actor::new("u1", ActorRole::Sales);
        let admin = Actor::new("root", ActorRole::Admin);

        // 可变更阶段直接放行
        assert!(OrderLifecycleManager::ensure_mutable(
            &order_in(OrderPhase::Configuration, None),
            &sales,
            false
        )
        .is_ok());

        // 冻结阶段: 普通角色被拒
        let frozen = order_in(OrderPhase::Production, None);
        assert!(matches!(
            OrderLifecycleManager::ensure_mutable(&frozen, &sales, false),
            Err(EngineError::ConfigurationFrozen { .. })
        ));

        // 冻结阶段: 非管理员请求覆盖被拒
        assert!(matches!(
            OrderLifecycleManager::ensure_mutable(&frozen, &sales, true),
            Err(EngineError::Unauthorized { .. })
        ));

        // 冻结阶段: 管理员覆盖放行
        assert!(OrderLifecycleManager::ensure_mutable(&frozen, &admin, true).is_ok());
    }
}
