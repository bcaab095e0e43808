pub mod explore;
pub mod leaderboard;
pub mod references;
pub mod status;
pub mod submit;
