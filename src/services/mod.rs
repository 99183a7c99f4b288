pub mod classifier;
pub mod inspect;
pub mod pipeline;
pub mod resolver;
pub mod stripper;
pub mod synchronizer;
