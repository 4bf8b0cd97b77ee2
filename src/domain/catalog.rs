// ==========================================
// 定制水槽订单系统 - 产品目录领域模型
// ==========================================
// 层级: Category → Assembly → SubAssembly → Part
// 红线: assembly_component 图在传递闭包下必须无环
// ==========================================

use crate::domain::types::ComponentType;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Category - 产品品类
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub category_code: String, // 品类代码
    pub category_name: String, // 品类名称
    pub created_at: NaiveDateTime,
}

// ==========================================
// Assembly - 装配件
// ==========================================
// 既是可售卖的配置目标,也可作为其他装配的子装配出现
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assembly {
    pub assembly_id: String,   // 装配件ID
    pub assembly_name: String, // 装配件名称
    pub category_code: String, // 所属品类
    pub unit_cost: Decimal,    // 单件成本 (作为子装配整行计价时使用)
    pub unit_weight: Decimal,  // 单件重量 (kg)
    pub created_at: NaiveDateTime,
}

// ==========================================
// Part - 零件
// ==========================================
// is_custom=true 的零件由编号服务按需铸造,其余来自标准目录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub part_no: String,       // 零件号 (定制件形如 700-1025)
    pub part_name: String,     // 零件名称
    pub category_code: String, // 所属品类
    pub spec_code: String,     // 规格代码 (选件匹配键, 如 PEG-24X18)
    pub unit_cost: Decimal,    // 单件成本
    pub unit_weight: Decimal,  // 单件重量 (kg)
    pub is_custom: bool,       // 是否定制件
    pub created_at: NaiveDateTime,
}

// ==========================================
// AssemblyComponent - 装配组成边
// ==========================================
// 一条边 = 装配对某零件/子装配的一项用量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyComponent {
    pub assembly_id: String,            // 父装配
    pub component_id: String,           // 组件引用 (零件号或装配件ID)
    pub component_type: ComponentType,  // PART / ASSEMBLY
    pub base_quantity: Decimal,         // 基础用量
    pub waste_factor: Decimal,          // 损耗系数 (0.05 = 5%)
    pub is_optional: bool,              // 是否选配
    pub option_code: Option<String>,    // 选配开关的选项代码 (is_optional 时有效)
    pub substitute_group: Option<String>, // 替代组标识
    pub effective_from: NaiveDate,      // 生效起始
    pub effective_to: Option<NaiveDate>, // 生效截止 (含当日; None 表示开放)
    pub sort_no: i32,                   // 目录内排序 (BOM 行号的稳定来源)
}

impl AssemblyComponent {
    /// 判断指定日期是否落在生效窗口内
    pub fn is_effective_on(&self, as_of: NaiveDate) -> bool {
        if as_of < self.effective_from {
            return false;
        }
        match self.effective_to {
            Some(to) => as_of <= to,
            None => true,
        }
    }

    /// 含损耗的调整用量: base_quantity * (1 + waste_factor)
    pub fn adjusted_quantity(&self) -> Decimal {
        self.base_quantity * (Decimal::ONE + self.waste_factor)
    }
}

// ==========================================
// UnitCost - 组件单价/单重
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCost {
    pub cost: Decimal,   // 单件成本
    pub weight: Decimal, // 单件重量 (kg)
}
