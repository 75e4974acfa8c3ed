//! Zakat levy: policy and batch generation of deduction transactions

pub mod batch;

pub use batch::{
    ZakatBatchProcessor, ZakatBatchReport, ZakatDeduction, ZakatFailure, ZakatPolicy,
    DEFAULT_ZAKAT_RATE_BPS, ZAKAT_POOL_WALLET_ID,
};
