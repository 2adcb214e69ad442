pub mod mrp;
pub mod projections;
