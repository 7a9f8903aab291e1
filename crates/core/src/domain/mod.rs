pub mod contract;
pub mod order;
pub mod portfolio;
pub mod recommendation;
