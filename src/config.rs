use std::env;

/// Process configuration, read once in `main` and passed through application
/// state. Nothing else reads the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: String,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub github_token: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()),
            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com/v1/chat/completions".to_string()),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
            github_token: env::var("GITHUB_TOKEN").ok(),
            cert_path: env::var("CERT_PATH").ok(),
            key_path: env::var("KEY_PATH").ok(),
        }
    }
}
