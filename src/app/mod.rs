pub mod collect_use_case;
pub mod normalize_use_case;
pub mod ports;
