//! `fleetreport-rules`: business rules for ride-dispatch reports.
//!
//! Pure crate: text heuristics, the row transformation pipeline, partner
//! attribution, the upload gate and the export plan. No file IO beyond
//! loading the TOML rules file.

pub mod city;
pub mod columns;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod fees;
pub mod partner;
pub mod phone;
pub mod pipeline;
pub mod upload;

pub use city::{detect_city, minimum_fare, moscow_minimum_fare, City};
pub use config::RulesConfig;
pub use error::{RulesError, UploadError};
pub use executor::infer_executor;
pub use fees::{find_toll_and_parking_fees, has_unconfirmed_fee_mention, Fee, FeeKind};
pub use partner::PartnerMapping;
pub use phone::strip_phone_numbers;
pub use pipeline::{detect_sapsan_cash, run, PipelineOutput, PipelineReport};
