mod random;

pub use random::RandParamGen;
