//! Game state: the save store, read-only content, tunables and errors

mod bag;
mod content;
pub mod errors;
pub mod factors;
mod session;
mod store;

pub use bag::Bag;
pub use content::Content;
pub use errors::{CoreError, CoreResult};
pub use factors::{Factors, ShopSite};
pub use session::Session;
pub use store::GameData;
