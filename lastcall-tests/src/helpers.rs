pub mod fakes;
pub mod scenario_harness;
pub mod timing_builder;
