pub mod admin;
pub mod buyers;
pub mod payments;
pub mod sellers;
