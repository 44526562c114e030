pub mod config;
pub mod enrichment;
pub mod export;
pub mod http_client;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod position_rules;
pub mod qualify;
pub mod record_source;
