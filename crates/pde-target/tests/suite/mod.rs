mod fixture;
mod load;
mod weave;
