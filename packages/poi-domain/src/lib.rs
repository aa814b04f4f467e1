pub mod place;
pub mod query;
pub mod ranking;

pub use place::{PlaceId, PlaceInfo, PlaceResult, Review, ReviewId};
pub use query::StructuredQuery;
pub use ranking::{Neighbor, RankingPolicy, ReviewMatch};
