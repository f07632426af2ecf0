// ==========================================
// 仓储层集成测试
// ==========================================
// 职责: 方案快照 / SO↔PO 映射 / 操作日志的持久化,
//       以及编排器跨进程重启的状态恢复
// ==========================================

mod test_helpers;

use std::sync::Arc;
use tempfile::NamedTempFile;

use pcb_line_aps::domain::schedule::Schedule;
use pcb_line_aps::domain::types::{Policy, ScheduleStatus};
use pcb_line_aps::repository::{ActionLogRepository, ActionType, StateRepository};

use test_helpers::{build_orchestrator_at, ref_now, InMemoryGateway};

fn empty_schedule(policy: Policy) -> Schedule {
    Schedule {
        id: 0,
        generated_at: ref_now(),
        policy,
        entries: Vec::new(),
        conflicts: Vec::new(),
        status: ScheduleStatus::Proposed,
        notes: String::new(),
    }
}

fn temp_repo() -> (NamedTempFile, StateRepository) {
    let file = NamedTempFile::new().unwrap();
    let repo = StateRepository::new(file.path().to_str().unwrap()).unwrap();
    (file, repo)
}

#[test]
fn test_schedule_ids_are_monotonic() {
    let (_file, repo) = temp_repo();

    let first = repo.insert_schedule(&empty_schedule(Policy::Edf)).unwrap();
    let second = repo.insert_schedule(&empty_schedule(Policy::Sjf)).unwrap();
    assert!(second > first);
}

#[test]
fn test_schedule_status_transitions_persist() {
    let (_file, repo) = temp_repo();

    let id = repo.insert_schedule(&empty_schedule(Policy::Edf)).unwrap();
    assert!(repo
        .load_latest_by_status(ScheduleStatus::Proposed)
        .unwrap()
        .is_some());

    repo.update_schedule_status(id, ScheduleStatus::Approved).unwrap();
    assert!(repo
        .load_latest_by_status(ScheduleStatus::Proposed)
        .unwrap()
        .is_none());
    let approved = repo
        .load_latest_by_status(ScheduleStatus::Approved)
        .unwrap()
        .unwrap();
    assert_eq!(approved.id, id);
    assert_eq!(approved.policy, Policy::Edf);

    // 不存在的 id 报 NotFound
    assert!(repo
        .update_schedule_status(id + 50, ScheduleStatus::Rejected)
        .is_err());
}

#[test]
fn test_so_po_map_roundtrip() {
    let (_file, repo) = temp_repo();

    repo.upsert_so_po("so-1", "po-1").unwrap();
    repo.upsert_so_po("so-2", "po-2").unwrap();
    // 同一 SO 的映射被覆盖
    repo.upsert_so_po("so-1", "po-9").unwrap();

    let map = repo.load_so_po_map().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("so-1").map(String::as_str), Some("po-9"));

    repo.remove_so_po("so-1").unwrap();
    assert_eq!(repo.load_so_po_map().unwrap().len(), 1);

    repo.clear_so_po_map().unwrap();
    assert!(repo.load_so_po_map().unwrap().is_empty());
}

#[test]
fn test_action_log_records_in_reverse_order() {
    let (_file, repo) = temp_repo();
    let log = ActionLogRepository::from_connection(repo.connection()).unwrap();

    log.log(ActionType::ProposalCreated, Some(1), None, None, "run=a").unwrap();
    log.log(
        ActionType::FactoryFailure,
        None,
        Some("so-1"),
        Some("po-1"),
        "solder bridge",
    )
    .unwrap();

    let recent = log.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action_type, ActionType::FactoryFailure);
    assert_eq!(recent[0].sales_order_id.as_deref(), Some("so-1"));
    assert_eq!(recent[1].action_type, ActionType::ProposalCreated);
    assert_eq!(recent[1].schedule_id, Some(1));
}

#[tokio::test]
async fn test_orchestrator_state_survives_restart() {
    let gateway = Arc::new(InMemoryGateway::with_reference_data());
    let db_file = NamedTempFile::new().unwrap();
    let db_path = db_file.path().to_str().unwrap().to_string();
    let now = ref_now();

    let approved_id = {
        let (orchestrator, _channel, _log) =
            build_orchestrator_at(gateway.clone(), None, &db_path);
        let artifacts = orchestrator.compute_proposal(Policy::Edf, now).await.unwrap();
        orchestrator.approve(artifacts.schedule.id, now).await.unwrap().id
    };

    // 进程重启: 同一状态库上重建编排器
    let (orchestrator, _channel, _log) = build_orchestrator_at(gateway, None, &db_path);

    let approved = orchestrator.approved_schedule().unwrap();
    assert_eq!(approved.id, approved_id);
    assert_eq!(approved.entries.len(), 12);
    assert_eq!(orchestrator.tracked_orders().len(), 12);
    assert!(orchestrator.proposed_schedule().is_none());
}

#[tokio::test]
async fn test_dangling_proposal_is_rejected_on_restart() {
    let gateway = Arc::new(InMemoryGateway::with_reference_data());
    let db_file = NamedTempFile::new().unwrap();
    let db_path = db_file.path().to_str().unwrap().to_string();
    let now = ref_now();

    {
        let (orchestrator, _channel, _log) =
            build_orchestrator_at(gateway.clone(), None, &db_path);
        // 生成后未审批即退出
        orchestrator.compute_proposal(Policy::Edf, now).await.unwrap();
    }

    let (orchestrator, _channel, _log) = build_orchestrator_at(gateway, None, &db_path);
    // 遗留 proposed 快照被标记为 rejected, 槽位为空
    assert!(orchestrator.proposed_schedule().is_none());

    let repo = StateRepository::new(&db_path).unwrap();
    assert!(repo
        .load_latest_by_status(ScheduleStatus::Proposed)
        .unwrap()
        .is_none());
    assert!(repo
        .load_latest_by_status(ScheduleStatus::Rejected)
        .unwrap()
        .is_some());
}
