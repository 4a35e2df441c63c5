use thiserror::Error;

/// Control-flow recovery errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("memory error: {0}")]
    Memory(#[from] cfr_mem::MemoryError),
    #[error("IR error: {0}")]
    Ir(#[from] cfr_ir::IrError),
    #[error("classification error: {0}")]
    Classify(#[from] cfr_cfg::ClassifyError),
    #[error("entry point 0x{0:x} is not in executable memory")]
    UnmappedEntry(u64),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
