pub mod cell_lookup;
pub mod finite_difference;
pub mod statistics;
