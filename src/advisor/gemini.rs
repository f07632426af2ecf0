// ==========================================
// PCB产线排产系统 - Gemini 顾问客户端
// ==========================================
// 职责: ScheduleAdvisor 的 Gemini REST 实现
// 策略: 60 秒超时; 传输/解析失败由编排器回退 EDF
// ==========================================

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::advisor::{
    sanitize_reply, AdvisorError, AdvisorReply, AdvisorRequest, ScheduleAdvisor,
    ADVISOR_TIMEOUT_SECS,
};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 默认模型
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const SYSTEM_PROMPT: &str = "\
You are a production scheduling advisor for a single-line PCB contract manufacturer.

FACTORY CONSTRAINTS:
- Single production line: orders run sequentially, never in parallel
- Working hours 08:00-16:00 UTC (480 min/day), 7 days/week
- Phase time = duration_per_unit x quantity; each order follows its product's BOM phase sequence

SCHEDULING POLICY (Earliest Deadline First):
- Primary sort: deadline (earliest first); tie-break: priority (1 = critical, 4 = low)
- A tighter deadline ALWAYS takes precedence over a higher priority.

YOUR TASK:
Given the current schedule, the pending orders, the EDF baseline and the user's feedback,
produce a JSON object with:
1. reordered_so_ids  - ALL pending order IDs in your recommended sequence
2. priority_updates  - any priority changes you recommend (may be empty, new_priority 1-4)
3. ai_comment        - 2-4 sentence explanation addressing the user's concerns
4. conflicts         - list of detected scheduling risks

OUTPUT FORMAT (strict JSON, no markdown fences):
{\"reordered_so_ids\": [\"id1\", ...],
 \"priority_updates\": [{\"sales_order_id\": \"...\", \"new_priority\": 1, \"reason\": \"...\"}],
 \"ai_comment\": \"...\",
 \"conflicts\": [\"...\"]}

RULES:
- reordered_so_ids MUST contain exactly the IDs from pending_orders, reordered
- Do NOT reorder items listed in current_schedule (they are already in production)";

// ==========================================
// GeminiAdvisor
// ==========================================
pub struct GeminiAdvisor {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiAdvisor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AdvisorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(ADVISOR_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdvisorError::Transport(format!("HTTP 客户端构造失败: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn user_prompt(request: &AdvisorRequest) -> Result<String, AdvisorError> {
        let current = serde_json::to_string_pretty(&request.current_schedule)
            .map_err(|e| AdvisorError::Decode(e.to_string()))?;
        let pending = serde_json::to_string_pretty(&request.pending_orders)
            .map_err(|e| AdvisorError::Decode(e.to_string()))?;
        Ok(format!(
            "Current time: {}\n\n\
             CURRENTLY IN PRODUCTION (cannot be reordered):\n{}\n\n\
             PENDING ORDERS TO SCHEDULE (these need ordering):\n{}\n\n\
             EDF BASELINE ORDER: {:?}\n\n\
             USER FEEDBACK: {}\n\n\
             Respond with the JSON schedule adjustment.",
            request.now, current, pending, request.edf_baseline, request.operator_feedback,
        ))
    }
}

#[async_trait]
impl ScheduleAdvisor for GeminiAdvisor {
    async fn propose_revision(
        &self,
        request: &AdvisorRequest,
    ) -> Result<AdvisorReply, AdvisorError> {
        info!(
            model = %self.model,
            pending = request.pending_orders.len(),
            existing = request.current_schedule.len(),
            "调用排程顾问"
        );

        let url = format!(
            "{GEMINI_ENDPOINT}/{}:generateContent?key={}",
            self.model, self.api_key,
        );
        let body = json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": Self::user_prompt(request)? }] }],
            "generationConfig": {
                "temperature": 0.1,
                "responseMimeType": "application/json",
            },
        });

        let resp = self.http.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                AdvisorError::Timeout
            } else {
                AdvisorError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdvisorError::Transport(format!("status={status}: {text}")));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| AdvisorError::Decode(e.to_string()))?;
        let raw_text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| AdvisorError::Decode("响应缺少候选文本".to_string()))?;

        debug!("顾问原始回复 {} 字符", raw_text.len());

        let pending_ids: HashSet<String> = request
            .pending_orders
            .iter()
            .map(|o| o.sales_order_id.clone())
            .collect();
        Ok(sanitize_reply(raw_text, &pending_ids))
    }
}
