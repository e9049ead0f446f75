//! Engine tests against an in-memory SQLite store and scripted
//! collaborators.

mod cascade;
mod fakes;
