// ==========================================
// 定制水槽订单系统 - 入口
// ==========================================
// 职责: 初始化日志与数据库, 打印就绪信息
// 业务调用全部走库内 API 层, 本入口不承载网络服务
// ==========================================

use sink_cto::{db, logging, APP_NAME, VERSION};

fn main() -> anyhow::Result<()> {
    logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sink_cto.db".to_string());

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    let schema_version = db::read_schema_version(&conn)?;
    tracing::info!(
        app = APP_NAME,
        version = VERSION,
        db_path = %db_path,
        schema_version = ?schema_version,
        "数据库就绪"
    );

    Ok(())
}
