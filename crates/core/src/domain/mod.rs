pub mod adjustment;
pub mod material;
pub mod part;
