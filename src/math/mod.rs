pub mod triple;
pub mod svd;
pub mod fast_svd;
pub mod fitting;
