mod fixture;
mod listener;
mod passes;
