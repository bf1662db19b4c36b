pub mod acta;
pub mod chat;
pub mod clearance;
pub mod delegation;
pub mod role;
pub mod ticket;
