//! Конфигурация pero, загружаемая из `pero.toml`.
//!
//! Структура [`PeroConfig`] содержит все настраиваемые параметры.
//! Отсутствующие в файле значения получают разумные значения по умолчанию.
//! Секреты из переменных окружения имеют приоритет над файлом; `.env`
//! подхватывается автоматически через dotenvy.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::assistant::AssistantsConfig;
use crate::error::PeroError;
use crate::image::ImageGeneratorConfig;
use crate::retry::RetryPolicy;
use crate::revision::{RevisionPolicy, default_approval_tokens};

/// Конфигурация ассистентов для отдельной вкладки таблицы.
#[derive(Debug, Clone, Deserialize)]
pub struct TabAssistants {
    pub tab: String,
    #[serde(default)]
    pub writer_assistant_id: String,
    #[serde(default)]
    pub moderator_assistant_id: String,
}

impl TabAssistants {
    /// Вкладка без писателя или модератора не может обрабатываться.
    pub fn ensure_complete(&self) -> Result<(), PeroError> {
        if self.writer_assistant_id.is_empty() || self.moderator_assistant_id.is_empty() {
            return Err(PeroError::Config(format!(
                "tab {} must configure both writer_assistant_id and moderator_assistant_id",
                self.tab
            )));
        }
        Ok(())
    }
}

/// Настройки генерации и размещения иллюстраций.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Полное отключение шага иллюстрации.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_image_quality")]
    pub quality: String,
    /// Ключ API хостинга изображений (необязательный).
    #[serde(default)]
    pub host_api_key: Option<String>,
    /// Отдельный ключ OpenAI для генерации изображений; по умолчанию
    /// используется основной ключ.
    #[serde(default)]
    pub openai_api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1536x1024".to_string()
}

fn default_image_quality() -> String {
    "high".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            model: default_image_model(),
            size: default_image_size(),
            quality: default_image_quality(),
            host_api_key: None,
            openai_api_key: None,
        }
    }
}

/// Конфигурация верхнего уровня, загружаемая из `pero.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PeroConfig {
    /// Ключ API OpenAI.
    #[serde(default)]
    pub openai_api_key: String,

    #[serde(default)]
    pub openai_org_id: Option<String>,

    #[serde(default)]
    pub openai_project_id: Option<String>,

    /// Идентификатор обрабатываемой таблицы.
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Bearer-токен доступа к таблице; получение и обновление токена —
    /// забота окружения развёртывания.
    #[serde(default)]
    pub sheets_access_token: String,

    /// Вкладки с их ассистентами. Пустой список означает «нечего делать».
    #[serde(default)]
    pub sheets: Vec<TabAssistants>,

    /// Ассистент художественного брифа, общий для всех вкладок.
    #[serde(default)]
    pub brief_assistant_id: Option<String>,

    /// Сколько строк обрабатывать за один запуск.
    #[serde(default = "default_per_run_rows")]
    pub per_run_rows: u32,

    /// Максимум раундов доработки до статуса «не промодерировано».
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Срок жизни блокировки строки в минутах.
    #[serde(default = "default_lock_ttl_minutes")]
    pub lock_ttl_minutes: i64,

    /// Ответы модератора, засчитываемые как одобрение.
    #[serde(default = "default_approval_tokens")]
    pub approval_tokens: Vec<String>,

    /// Пауза между опросами статуса запуска ассистента, мс.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Общий бюджет ожидания одного запуска ассистента, сек.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub image: ImageConfig,
}

fn default_per_run_rows() -> u32 {
    1
}

fn default_max_revisions() -> u32 {
    5
}

fn default_lock_ttl_minutes() -> i64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for PeroConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_org_id: None,
            openai_project_id: None,
            spreadsheet_id: String::new(),
            sheets_access_token: String::new(),
            sheets: Vec::new(),
            brief_assistant_id: None,
            per_run_rows: default_per_run_rows(),
            max_revisions: default_max_revisions(),
            lock_ttl_minutes: default_lock_ttl_minutes(),
            approval_tokens: default_approval_tokens(),
            poll_interval_ms: default_poll_interval_ms(),
            run_timeout_secs: None,
            retry: RetryPolicy::default(),
            image: ImageConfig::default(),
        }
    }
}

impl PeroConfig {
    /// Загрузить конфигурацию из `pero.toml` в текущем каталоге.
    /// При отсутствии файла используются значения по умолчанию.
    pub fn load() -> Result<Self, PeroError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::from_path(Path::new("pero.toml"))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Прочитать конфигурацию из указанного файла.
    pub fn from_path(path: &Path) -> Result<Self, PeroError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<PeroConfig>(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Переменные окружения имеют приоритет над файлом для секретов.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.openai_api_key = key;
        }
        if let Some(token) = lookup("SHEETS_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.sheets_access_token = token;
        }
        if let Some(key) = lookup("FREEIMAGE_API_KEY").filter(|v| !v.is_empty()) {
            self.image.host_api_key = Some(key);
        }
        if let Some(key) = lookup("IMAGE_OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.image.openai_api_key = Some(key);
        }
    }

    /// Проверка полноты конфигурации. Неполные учётные данные — ошибка
    /// запуска, а не обработки строки.
    pub fn validate(&self) -> Result<(), PeroError> {
        if self.spreadsheet_id.is_empty() {
            return Err(PeroError::Config("spreadsheet_id is required".into()));
        }
        if self.sheets_access_token.is_empty() {
            return Err(PeroError::Config("sheets_access_token is required".into()));
        }
        if self.openai_api_key.is_empty() {
            return Err(PeroError::Config("openai_api_key is required".into()));
        }
        for tab in &self.sheets {
            tab.ensure_complete()?;
        }
        if self.image.enabled
            && self
                .brief_assistant_id
                .as_deref()
                .unwrap_or_default()
                .is_empty()
        {
            return Err(PeroError::Config(
                "brief_assistant_id is required while image generation is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn assistants_config(&self) -> AssistantsConfig {
        AssistantsConfig {
            api_key: self.openai_api_key.clone(),
            org_id: self.openai_org_id.clone(),
            project_id: self.openai_project_id.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            run_timeout: self.run_timeout_secs.map(Duration::from_secs),
            retry: self.retry.clone(),
        }
    }

    pub fn image_generator_config(&self) -> ImageGeneratorConfig {
        ImageGeneratorConfig {
            api_key: self
                .image
                .openai_api_key
                .clone()
                .unwrap_or_else(|| self.openai_api_key.clone()),
            org_id: self.openai_org_id.clone(),
            project_id: self.openai_project_id.clone(),
            model: self.image.model.clone(),
            size: self.image.size.clone(),
            quality: self.image.quality.clone(),
            retry: self.retry.clone(),
        }
    }

    pub fn revision_policy(&self) -> RevisionPolicy {
        RevisionPolicy::new(self.max_revisions, self.approval_tokens.clone())
    }
}
