//! Playback engine contract.
//!
//! An engine turns an audio URL into a live [`Session`]. Creation is
//! asynchronous: `create_session` returns at once and the outcome arrives
//! later as an [`EngineEvent`] on the channel the engine was built with.
//! Every event carries the [`SessionId`] the player minted for the request,
//! which is how late events from replaced sessions are recognised.

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;


/// Identity of one session request, unique per player.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct SessionId( pub u64 );


impl fmt::Display for SessionId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// Errors that can occur while creating a session.
#[derive( Debug, Clone, Error, PartialEq )]
pub enum EngineError {
    #[error( "Failed to fetch audio: {0}" )]
    Fetch( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),
}


/// Notifications sent from the engine back to the player.
#[derive( Debug )]
pub enum EngineEvent {
    /// Outcome of a `create_session` request.
    Loaded {
        session: SessionId,
        result: Result<Box<dyn Session>, EngineError>,
    },

    /// The session reached the natural end of its audio. Sent at most once.
    Completed { session: SessionId },
}


impl EngineEvent {
    /// Session the event belongs to.
    pub fn session( &self ) -> SessionId {
        match self {
            EngineEvent::Loaded { session, .. } | EngineEvent::Completed { session } => *session,
        }
    }
}


pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;


/// Creates the channel an engine reports on.
pub fn engine_channel() -> ( EngineEventSender, EngineEventReceiver ) {
    mpsc::unbounded_channel()
}


/// Native audio capability.
pub trait PlaybackEngine: Send {
    /// Starts creating a session for `audio_url`.
    ///
    /// The result must be reported as `EngineEvent::Loaded` tagged with `id`.
    /// A successful session starts paused.
    fn create_session( &mut self, id: SessionId, audio_url: &str );
}


/// Live handle to one track's audio.
///
/// All calls are fire-and-forget; the player never waits on them.
pub trait Session: Send + fmt::Debug {
    fn play( &mut self );

    fn pause( &mut self );

    fn seek_to( &mut self, position_secs: f64 );

    fn position_secs( &self ) -> f64;

    /// Volume in 0.0..=1.0.
    fn set_volume( &mut self, volume: f32 );

    /// Stops the audio and frees its resources. No events follow a release.
    fn release( &mut self );
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_event_session() {
        let loaded = EngineEvent::Loaded { session: SessionId( 4 ), result: Err( EngineError::Fetch( "timeout".into() ) ) };
        assert_eq!( loaded.session(), SessionId( 4 ) );
        assert_eq!( EngineEvent::Completed { session: SessionId( 9 ) }.session(), SessionId( 9 ) );
    }


    #[test]
    fn test_engine_channel_delivers_in_order() {
        let ( tx, mut rx ) = engine_channel();
        tx.send( EngineEvent::Completed { session: SessionId( 1 ) } ).unwrap();
        tx.send( EngineEvent::Completed { session: SessionId( 2 ) } ).unwrap();
        assert_eq!( rx.try_recv().unwrap().session(), SessionId( 1 ) );
        assert_eq!( rx.try_recv().unwrap().session(), SessionId( 2 ) );
    }
}
