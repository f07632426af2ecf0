// ==========================================
// PCB产线排产系统 - 配置层
// ==========================================
// 职责: 环境变量 → 强类型配置; 启动期校验
// 红线: 配置错误在启动时失败, 不允许带病运行
// ==========================================

use thiserror::Error;

/// 配置错误 (启动期致命)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("缺少环境变量: {0}")]
    MissingVar(&'static str),

    #[error("环境变量取值非法: {name}: {message}")]
    InvalidVar { name: &'static str, message: String },
}

/// 制造平台网关配置
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// AI 顾问配置 (可选)
#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub api_key: String,
    pub model: String,
}

/// SMTP 配置块 (可选)
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

/// 班次窗口配置
#[derive(Debug, Clone, Copy)]
pub struct ShiftSettings {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ShiftSettings {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 16,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewaySettings,
    /// 操作员通道令牌 (聊天机器人)
    pub channel_token: String,
    pub advisor: Option<AdvisorSettings>,
    /// 工厂事件监听端口
    pub listen_port: u16,
    pub shift: ShiftSettings,
    pub smtp: Option<SmtpSettings>,
    /// 本地状态库路径
    pub db_path: String,
}

impl AppConfig {
    /// 从进程环境读取配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意查找函数读取配置 (便于测试)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let gateway = GatewaySettings {
            base_url: required("MES_API_BASE_URL")?,
            username: required("MES_API_USERNAME")?,
            password: required("MES_API_PASSWORD")?,
        };

        let channel_token = required("TELEGRAM_BOT_TOKEN")?;

        let advisor = match lookup("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            Some(api_key) => Some(AdvisorSettings {
                api_key,
                model: lookup("GEMINI_MODEL")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| crate::advisor::gemini::DEFAULT_MODEL.to_string()),
            }),
            None => None,
        };

        let listen_port = parse_or("FACTORY_EVENT_PORT", &lookup, 8080u16)?;

        let shift = ShiftSettings {
            start_hour: parse_or("SHIFT_START_HOUR", &lookup, 8u32)?,
            end_hour: parse_or("SHIFT_END_HOUR", &lookup, 16u32)?,
        };
        if shift.start_hour >= shift.end_hour || shift.end_hour > 24 {
            return Err(ConfigError::InvalidVar {
                name: "SHIFT_START_HOUR",
                message: format!(
                    "班次窗口非法: {}..{}",
                    shift.start_hour, shift.end_hour
                ),
            });
        }

        let smtp = match lookup("SMTP_HOST").filter(|v| !v.is_empty()) {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or("SMTP_PORT", &lookup, 587u16)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from: required("SMTP_FROM")?,
                to: required("SMTP_TO")?,
            }),
            None => None,
        };

        let db_path = lookup("APS_DB_PATH")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "pcb_line_aps.db".to_string());

        Ok(Self {
            gateway,
            channel_token,
            advisor,
            listen_port,
            shift,
            smtp,
            db_path,
        })
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            message: e.to_string(),
        }),
    }
}
