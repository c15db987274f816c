pub mod browse;
pub mod edit;
pub mod favorite;
pub mod review;
pub mod share;
pub mod show;

pub use browse::*;
pub use edit::*;
pub use favorite::*;
pub use review::*;
pub use share::*;
pub use show::*;
