pub mod load;
pub mod statements;
pub mod warehouse;
