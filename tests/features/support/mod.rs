mod world;

pub use world::TestWorld;
