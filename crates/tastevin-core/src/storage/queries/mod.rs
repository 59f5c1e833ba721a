mod recap;

pub use recap::EventRecapQuery;
