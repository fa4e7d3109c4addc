mod model;
mod repository;

pub use model::CandleDB;
pub use repository::CandleRepository;
