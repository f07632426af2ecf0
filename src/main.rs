// ==========================================
// PCB产线排产系统 - 服务主入口
// ==========================================
// 运行模型: 两个长生命周期任务汇入共享编排器
// - 操作员通道轮询 (approve/reject/revise/恢复动作)
// - 工厂失败事件 HTTP 监听
// ==========================================

use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use pcb_line_aps::channel::{NoOpChannel, OperatorChannel, OperatorCommand};
use pcb_line_aps::config::AppConfig;
use pcb_line_aps::gateway::HttpGateway;
use pcb_line_aps::notify::NoOpNotifier;
use pcb_line_aps::orchestrator::{Orchestrator, OrchestratorParts};
use pcb_line_aps::render::NoOpRenderer;
use pcb_line_aps::repository::{ActionLogRepository, StateRepository};
use pcb_line_aps::{advisor::GeminiAdvisor, engine::ShiftClock, intake, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 单线排产核心", pcb_line_aps::APP_NAME);
    tracing::info!("系统版本: {}", pcb_line_aps::VERSION);
    tracing::info!("==================================================");

    // 配置错误立即终止启动
    let config = AppConfig::from_env().context("配置加载失败")?;
    info!("使用状态库: {}", config.db_path);

    // 本地持久化
    let state_repo =
        Arc::new(StateRepository::new(&config.db_path).context("状态库初始化失败")?);
    let action_log = Arc::new(
        ActionLogRepository::from_connection(state_repo.connection())
            .context("操作日志初始化失败")?,
    );

    // 外部协作方
    let gateway = Arc::new(
        HttpGateway::new(
            &config.gateway.base_url,
            &config.gateway.username,
            &config.gateway.password,
        )
        .context("网关初始化失败")?,
    );
    let advisor = match &config.advisor {
        Some(settings) => {
            info!("AI 顾问已启用: model={}", settings.model);
            Some(Arc::new(GeminiAdvisor::new(&settings.api_key, &settings.model)?)
                as Arc<dyn pcb_line_aps::advisor::ScheduleAdvisor>)
        }
        None => {
            info!("AI 顾问未配置, revise 将直接使用 EDF");
            None
        }
    };

    // 聊天/邮件/渲染适配器由部署方注入; 缺省为空操作实现
    let channel: Arc<dyn OperatorChannel> = Arc::new(NoOpChannel);
    let notifier = Arc::new(NoOpNotifier);
    let renderer = Arc::new(NoOpRenderer);

    let clock = ShiftClock::from_hours(config.shift.start_hour, config.shift.end_hour);
    let orchestrator = Arc::new(Orchestrator::new(OrchestratorParts {
        gateway,
        advisor,
        channel: channel.clone(),
        notifier,
        renderer,
        state_repo,
        action_log,
        clock,
    })?);

    // 任务a: 操作员通道轮询
    let poller = tokio::spawn(run_command_poller(orchestrator.clone(), channel.clone()));

    // 任务b: 工厂失败事件监听
    let app = intake::router(orchestrator.clone());
    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听端口绑定失败: {addr}"))?;
    info!("工厂事件端点已监听: http://{addr}/factory/failure");
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        result = server => {
            result.context("HTTP 服务任务崩溃")?
                .context("HTTP 服务异常退出")?;
        }
        _ = poller => {
            error!("操作员通道轮询退出");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到退出信号, 关闭服务");
        }
    }

    Ok(())
}

/// 操作员通道轮询: 指令 → 编排器调用
async fn run_command_poller(
    orchestrator: Arc<Orchestrator>,
    channel: Arc<dyn OperatorChannel>,
) {
    loop {
        let command = match channel.next_command().await {
            Ok(command) => command,
            Err(e) => {
                warn!("通道指令接收失败: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        let now = Utc::now();
        let outcome = match command {
            OperatorCommand::RequestNewSchedule(policy) => orchestrator
                .compute_proposal(policy, now)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            OperatorCommand::Approve => match orchestrator.proposed_schedule() {
                Some(schedule) => orchestrator
                    .approve(schedule.id, now)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                None => Err("no proposal awaiting approval".to_string()),
            },
            OperatorCommand::Reject => match orchestrator.proposed_schedule() {
                Some(schedule) => orchestrator
                    .reject(schedule.id, now)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("no proposal awaiting approval".to_string()),
            },
            OperatorCommand::Revise(text) => match orchestrator.proposed_schedule() {
                Some(schedule) => orchestrator
                    .revise(schedule.id, &text, now)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                None => Err("no proposal awaiting approval".to_string()),
            },
            OperatorCommand::CancelOrder {
                sales_order_id,
                production_order_id,
            } => orchestrator
                .cancel_order(&sales_order_id, &production_order_id, now)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            OperatorCommand::RestartOrder {
                sales_order_id,
                production_order_id,
            } => orchestrator
                .restart_order(&sales_order_id, &production_order_id, now)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };

        // 操作员永远得到答复, 不允许静默失败
        if let Err(message) = outcome {
            warn!("操作员指令处理失败: {message}");
            if let Err(e) = channel.send_text(&format!("Request failed: {message}")).await {
                warn!("失败答复推送失败: {e}");
            }
        }
    }
}
