mod fixture;
mod merge;
mod properties;
mod resolve;
