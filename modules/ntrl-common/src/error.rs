use thiserror::Error;

#[derive(Error, Debug)]
pub enum NtrlError {
    #[error("Detection error: {0}")]
    Detection(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM transport error: {0}")]
    Llm(String),

    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    #[error("Budget exhausted")]
    BudgetExhausted,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
