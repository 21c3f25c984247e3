// tests/property/main.rs
//
// Property tests over plan construction and the scheduling decision.

mod decisions;
mod plan_order;
