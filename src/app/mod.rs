pub mod batch_use_case;
pub mod invoke_use_case;
pub mod ports;
