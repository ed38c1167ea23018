#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid {kind} handle: {raw:#x}")]
    InvalidHandle { kind: &'static str, raw: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CoreError {
    fn from(e: toml::de::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
