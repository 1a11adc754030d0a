pub mod ids;
pub mod setting;
pub mod title;
pub mod user_rating;

pub use ids::{TitleId, UserId};
pub use setting::{Setting, SettingKey};
pub use title::{ChildEdge, Title, SERIES_TYPES};
pub use user_rating::UserRating;
