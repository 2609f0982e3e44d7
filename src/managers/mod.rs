// Managers Module
//
// Focused managers that own long-lived state shared across async tasks:
// - MatchingSession: one pitch-matching run with trial playback and progress

pub mod matching_session;

pub use matching_session::MatchingSession;
